use axum::{
	body::Bytes,
	extract::{FromRequest, FromRequestParts, State},
	http::StatusCode,
	routing::{get, post, put},
	Json, Router,
};
use serde_json::{json, Value};

use crate::error::Error;
use crate::types::{
	Book, BookId, Caller, IssueWithBook, IssueWithParties, NewBookForm, RejectForm, RequestId,
	RequestWithBook, RequestWithParties, Role, UpdateBookForm,
};
use crate::{books, lifecycle, queries, AppState};

/// `axum::Json` that answers a bad body with our error format.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
struct JsonBody<T>(T);

/// `axum::extract::Path` that answers a bad id with our error format.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(Error))]
struct Path<T>(T);

pub fn routes() -> Router<AppState> {
	Router::new()
		.route("/books", get(list_books))
		.route("/books/add", post(add_book))
		.route("/books/:id", put(update_book).delete(delete_book))
		.route("/requests/request/:book_id", post(request_book))
		.route("/requests/approve/:request_id", post(approve_request))
		.route("/requests/reject/:request_id", post(reject_request))
		.route("/requests/my-requests", get(my_requests))
		.route("/requests/requests", get(all_requests))
		.route("/issues/issue/:book_id", post(issue_book))
		.route("/issues/return/:book_id", post(return_book))
		.route("/issues/my", get(my_issues))
		.route("/issues/all", get(all_issues))
}

async fn list_books(State(state): State<AppState>) -> Result<Json<Vec<Book>>, Error> {
	Ok(Json(books::list(&state.db).await?))
}

async fn add_book(
	State(state): State<AppState>,
	caller: Caller,
	JsonBody(form): JsonBody<NewBookForm>,
) -> Result<(StatusCode, Json<Value>), Error> {
	caller.require(Role::Admin)?;
	let book = books::create(&state.db, form).await?;
	Ok((
		StatusCode::CREATED,
		Json(json!({ "message": "Book added successfully", "book": book })),
	))
}

async fn update_book(
	State(state): State<AppState>,
	caller: Caller,
	Path(id): Path<BookId>,
	JsonBody(form): JsonBody<UpdateBookForm>,
) -> Result<Json<Book>, Error> {
	caller.require(Role::Admin)?;
	Ok(Json(books::update(&state.db, id, form).await?))
}

async fn delete_book(
	State(state): State<AppState>,
	caller: Caller,
	Path(id): Path<BookId>,
) -> Result<Json<Value>, Error> {
	caller.require(Role::Admin)?;
	books::delete(&state.db, id).await?;
	Ok(Json(json!({ "message": "Book deleted" })))
}

async fn request_book(
	State(state): State<AppState>,
	caller: Caller,
	Path(book_id): Path<BookId>,
) -> Result<(StatusCode, Json<Value>), Error> {
	caller.require(Role::Student)?;
	let request = lifecycle::request(&state.db, book_id, caller.uid).await?;
	Ok((
		StatusCode::CREATED,
		Json(json!({
			"success": true,
			"message": "Book request submitted successfully",
			"request": request,
		})),
	))
}

async fn approve_request(
	State(state): State<AppState>,
	caller: Caller,
	Path(request_id): Path<RequestId>,
) -> Result<Json<Value>, Error> {
	caller.require(Role::Admin)?;
	let request = lifecycle::approve(&state.db, request_id).await?;
	Ok(Json(json!({
		"success": true,
		"message": "Request approved and book issued successfully",
		"request": request,
	})))
}

async fn reject_request(
	State(state): State<AppState>,
	caller: Caller,
	Path(request_id): Path<RequestId>,
	body: Bytes,
) -> Result<Json<Value>, Error> {
	caller.require(Role::Admin)?;
	// the message is optional, and so is the whole body
	let form: RejectForm = if body.iter().all(u8::is_ascii_whitespace) {
		RejectForm::default()
	} else {
		serde_json::from_slice(&body).map_err(|err| Error::BadInput(format!("Invalid request body: {err}")))?
	};
	let request = lifecycle::reject(&state.db, request_id, form.message).await?;
	Ok(Json(json!({
		"success": true,
		"message": "Request rejected successfully",
		"request": request,
	})))
}

async fn my_requests(
	State(state): State<AppState>,
	caller: Caller,
) -> Result<Json<Vec<RequestWithBook>>, Error> {
	caller.require(Role::Student)?;
	Ok(Json(queries::my_requests(&state.db, caller.uid).await?))
}

async fn all_requests(
	State(state): State<AppState>,
	caller: Caller,
) -> Result<Json<Vec<RequestWithParties>>, Error> {
	caller.require(Role::Admin)?;
	Ok(Json(queries::all_requests(&state.db).await?))
}

async fn issue_book(
	State(state): State<AppState>,
	caller: Caller,
	Path(book_id): Path<BookId>,
) -> Result<Json<Value>, Error> {
	let issue = lifecycle::issue(&state.db, book_id, caller.uid).await?;
	Ok(Json(json!({
		"success": true,
		"message": "Book issued successfully",
		"issue": issue,
	})))
}

async fn return_book(
	State(state): State<AppState>,
	caller: Caller,
	Path(book_id): Path<BookId>,
) -> Result<Json<Value>, Error> {
	let returned = lifecycle::return_book(&state.db, book_id, caller.uid).await?;
	let mut body = json!({
		"success": true,
		"message": "Book returned successfully",
		"issue": returned.issue,
	});
	if let Some(warning) = returned.warning {
		body["warning"] = Value::String(warning);
	}
	Ok(Json(body))
}

async fn my_issues(
	State(state): State<AppState>,
	caller: Caller,
) -> Result<Json<Vec<IssueWithBook>>, Error> {
	Ok(Json(queries::my_issues(&state.db, caller.uid).await?))
}

async fn all_issues(
	State(state): State<AppState>,
	caller: Caller,
) -> Result<Json<Vec<IssueWithParties>>, Error> {
	caller.require(Role::Admin)?;
	Ok(Json(queries::all_issues(&state.db).await?))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::users::{USER_ID_HEADER, USER_NAME_HEADER, USER_ROLE_HEADER};
	use axum::body::Body;
	use axum::http::Request;
	use tower::ServiceExt;

	async fn call(app: &Router, method: &str, uri: &str, who: Option<(i64, &str)>, body: Option<Value>) -> (StatusCode, Value) {
		let mut req = Request::builder().method(method).uri(uri);
		if let Some((uid, role)) = who {
			req = req
				.header(USER_ID_HEADER, uid.to_string())
				.header(USER_ROLE_HEADER, role)
				.header(USER_NAME_HEADER, format!("user-{uid}"));
		}
		let req = match body {
			Some(body) => req
				.header("content-type", "application/json")
				.body(Body::from(body.to_string()))
				.unwrap(),
			None => req.body(Body::empty()).unwrap(),
		};

		let response = app.clone().oneshot(req).await.unwrap();
		let status = response.status();
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
		let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
		(status, value)
	}

	const ADMIN: Option<(i64, &str)> = Some((100, "admin"));
	const ADA: Option<(i64, &str)> = Some((1, "student"));
	const BOB: Option<(i64, &str)> = Some((2, "student"));

	async fn app() -> Router {
		crate::app(AppState { db: crate::sql::scratch().await })
	}

	async fn add(app: &Router, copies: i64) -> i64 {
		let (status, body) = call(app, "POST", "/api/books/add", ADMIN, Some(json!({
			"title": "Snow Crash",
			"author": "Neal Stephenson",
			"totalCopies": copies,
		})))
		.await;
		assert_eq!(status, StatusCode::CREATED);
		body["book"]["id"].as_i64().unwrap()
	}

	#[tokio::test]
	async fn catalog_is_public_but_writes_need_admin() {
		let app = app().await;
		let (status, body) = call(&app, "GET", "/api/books", None, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!([]));

		let new_book = json!({ "title": "Snow Crash", "author": "Neal Stephenson" });
		let (status, _) = call(&app, "POST", "/api/books/add", None, Some(new_book.clone())).await;
		assert_eq!(status, StatusCode::UNAUTHORIZED);
		let (status, body) = call(&app, "POST", "/api/books/add", ADA, Some(new_book)).await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(body["code"], "FORBIDDEN");
	}

	#[tokio::test]
	async fn book_crud() {
		let app = app().await;
		let (status, body) = call(&app, "POST", "/api/books/add", ADMIN, Some(json!({ "title": "Snow Crash" }))).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["message"], "author is required");

		let id = add(&app, 2).await;
		let (status, body) = call(&app, "PUT", &format!("/api/books/{id}"), ADMIN, Some(json!({ "description": "Cyberpunk" }))).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["description"], "Cyberpunk");
		assert_eq!(body["availableCopies"], 2);

		let (status, _) = call(&app, "PUT", "/api/books/999", ADMIN, Some(json!({ "title": "X" }))).await;
		assert_eq!(status, StatusCode::NOT_FOUND);

		let (status, body) = call(&app, "DELETE", &format!("/api/books/{id}"), ADMIN, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["message"], "Book deleted");
		let (_, body) = call(&app, "GET", "/api/books", None, None).await;
		assert_eq!(body, json!([]));
	}

	#[tokio::test]
	async fn request_approve_flow() {
		let app = app().await;
		let book = add(&app, 1).await;

		let (status, body) = call(&app, "POST", &format!("/api/requests/request/{book}"), ADA, None).await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(body["request"]["status"], "pending");
		let request = body["request"]["id"].as_i64().unwrap();

		let (status, _) = call(&app, "POST", &format!("/api/requests/request/{book}"), ADMIN, None).await;
		assert_eq!(status, StatusCode::FORBIDDEN);

		let (status, body) = call(&app, "POST", &format!("/api/requests/approve/{request}"), ADMIN, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["request"]["status"], "approved");

		let (status, body) = call(&app, "POST", &format!("/api/requests/approve/{request}"), ADMIN, None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["message"], "Request is already approved");

		let (status, body) = call(&app, "POST", &format!("/api/requests/request/{book}"), BOB, None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["code"], "UNAVAILABLE");

		let (status, body) = call(&app, "GET", "/api/issues/all", ADMIN, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body[0]["user"]["name"], "user-1");
		assert_eq!(body[0]["book"]["title"], "Snow Crash");
		assert_eq!(body[0]["isReturned"], false);
	}

	#[tokio::test]
	async fn reject_with_and_without_message() {
		let app = app().await;
		let book = add(&app, 1).await;
		let (_, body) = call(&app, "POST", &format!("/api/requests/request/{book}"), ADA, None).await;
		let request = body["request"]["id"].as_i64().unwrap();

		let (status, body) = call(&app, "POST", &format!("/api/requests/reject/{request}"), ADMIN, Some(json!({ "message": "Lost copy" }))).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["request"]["status"], "rejected");
		assert_eq!(body["request"]["responseMessage"], "Lost copy");

		let (status, body) = call(&app, "POST", &format!("/api/requests/reject/{request}"), ADMIN, None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["code"], "CONFLICT");
		let (status, _) = call(&app, "POST", "/api/requests/reject/77", ADMIN, None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);

		let (status, body) = call(&app, "GET", "/api/requests/my-requests", ADA, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body[0]["book"]["title"], "Snow Crash");
		assert_eq!(body[0]["status"], "rejected");
	}

	#[tokio::test]
	async fn issue_and_return() {
		let app = app().await;
		let book = add(&app, 1).await;

		let (status, body) = call(&app, "POST", &format!("/api/issues/issue/{book}"), ADA, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["issue"]["bookId"], book);

		let (status, _) = call(&app, "POST", &format!("/api/issues/issue/{book}"), BOB, None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		let (status, _) = call(&app, "POST", &format!("/api/issues/return/{book}"), BOB, None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);

		let (status, body) = call(&app, "GET", "/api/issues/my", ADA, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body.as_array().map(Vec::len), Some(1));
		assert_eq!(body[0]["book"]["author"], "Neal Stephenson");

		let (status, body) = call(&app, "POST", &format!("/api/issues/return/{book}"), ADA, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["issue"]["isReturned"], true);
		assert!(body.get("warning").is_none());

		let (_, body) = call(&app, "GET", "/api/books", None, None).await;
		assert_eq!(body[0]["availableCopies"], 1);

		let (status, _) = call(&app, "GET", "/api/issues/all", ADA, None).await;
		assert_eq!(status, StatusCode::FORBIDDEN);
	}

	#[tokio::test]
	async fn bad_input_uses_the_error_format() {
		let app = app().await;
		let book = add(&app, 1).await;

		let (status, body) = call(&app, "PUT", "/api/books/abc", ADMIN, Some(json!({ "title": "X" }))).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["code"], "VALIDATION_ERROR");
		assert!(body["message"].is_string());

		let (status, body) = call(&app, "POST", "/api/requests/approve/first", ADMIN, None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["code"], "VALIDATION_ERROR");

		let (status, body) = call(&app, "POST", "/api/books/add", ADMIN, Some(json!({
			"title": "Snow Crash",
			"author": "Neal Stephenson",
			"totalCopies": "two",
		})))
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["code"], "VALIDATION_ERROR");

		let (status, body) = call(&app, "PUT", &format!("/api/books/{book}"), ADMIN, Some(json!({ "totalCopies": [3] }))).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["code"], "VALIDATION_ERROR");

		let (_, body) = call(&app, "GET", "/api/books", None, None).await;
		assert_eq!(body.as_array().map(Vec::len), Some(1));
		assert_eq!(body[0]["totalCopies"], 1);
	}

	#[tokio::test]
	async fn reject_refuses_a_malformed_body() {
		let app = app().await;
		let book = add(&app, 1).await;
		let (_, body) = call(&app, "POST", &format!("/api/requests/request/{book}"), ADA, None).await;
		let request = body["request"]["id"].as_i64().unwrap();

		let (status, body) = call(&app, "POST", &format!("/api/requests/reject/{request}"), ADMIN, Some(json!({ "message": 5 }))).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["code"], "VALIDATION_ERROR");

		let (_, body) = call(&app, "GET", "/api/requests/my-requests", ADA, None).await;
		assert_eq!(body[0]["status"], "pending");

		let (status, body) = call(&app, "POST", &format!("/api/requests/reject/{request}"), ADMIN, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["request"]["status"], "rejected");
		assert_eq!(body["request"]["responseMessage"], Value::Null);
	}

	#[tokio::test]
	async fn shortages_name_the_step() {
		let app = app().await;
		let book = add(&app, 1).await;
		let (_, body) = call(&app, "POST", &format!("/api/requests/request/{book}"), ADA, None).await;
		let request = body["request"]["id"].as_i64().unwrap();
		call(&app, "POST", &format!("/api/issues/issue/{book}"), BOB, None).await;

		let (status, body) = call(&app, "POST", &format!("/api/requests/approve/{request}"), ADMIN, None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["message"], "No available copies left");

		let (_, body) = call(&app, "POST", &format!("/api/requests/request/{book}"), Some((3, "student")), None).await;
		assert_eq!(body["message"], "Book is not available right now");

		let (_, body) = call(&app, "POST", &format!("/api/issues/issue/{book}"), ADA, None).await;
		assert_eq!(body["message"], "No copies available");
	}
}
