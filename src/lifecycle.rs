//! Loan lifecycle: requests, approvals, direct issues and returns.
//!
//! Each operation is a single transaction that opens with a write. SQLite
//! then queues concurrent writers on its lock (bounded by the busy timeout)
//! rather than letting two of them decide from the same stale read. Copy
//! counters only move through conditional UPDATEs, and the partial unique
//! indexes on `issues` and `requests` reject duplicates at insert time.

use chrono::Utc;
use sqlx::{Sqlite, Transaction};

use crate::error::{is_unique_violation, Error};
use crate::sql::Db;
use crate::types::{BookId, Issue, Request, RequestId, RequestStatus, Returned, UserId};

/// Takes one copy off the shelf; false when none is left.
async fn take_copy(tx: &mut Transaction<'_, Sqlite>, book: BookId) -> Result<bool, Error> {
	let taken = sqlx::query(
		"UPDATE books SET available_copies = available_copies - 1 WHERE id = ? AND available_copies > 0",
	)
	.bind(book)
	.execute(&mut **tx)
	.await?
	.rows_affected();
	Ok(taken == 1)
}

async fn book_exists(tx: &mut Transaction<'_, Sqlite>, book: BookId) -> Result<bool, Error> {
	let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM books WHERE id = ?)")
		.bind(book)
		.fetch_one(&mut **tx)
		.await?;
	Ok(exists)
}

/// Opens a loan of an existing book. Runs before the copy is taken, so a
/// borrower who already holds the book hears that rather than "no copies".
async fn open_issue(tx: &mut Transaction<'_, Sqlite>, book: BookId, user: UserId) -> Result<Issue, Error> {
	let issue = sqlx::query_as::<_, Issue>(
		r#"
INSERT INTO issues
	(user_id, book_id, issue_date, is_returned)
SELECT ?, id, ?, false
FROM books
WHERE id = ?
RETURNING *"#,
	)
	.bind(user)
	.bind(Utc::now())
	.bind(book)
	.fetch_optional(&mut **tx)
	.await;

	match issue {
		Ok(Some(issue)) => Ok(issue),
		Ok(None) => Err(Error::BookNotFound),
		Err(err) if is_unique_violation(&err) => Err(Error::AlreadyIssued),
		Err(err) => Err(err.into()),
	}
}

async fn request_status(tx: &mut Transaction<'_, Sqlite>, id: RequestId) -> Result<RequestStatus, Error> {
	let status: Option<(String,)> = sqlx::query_as("SELECT status FROM requests WHERE id = ?")
		.bind(id)
		.fetch_optional(&mut **tx)
		.await?;
	let (status,) = status.ok_or(Error::RequestNotFound)?;
	RequestStatus::try_from(status).map_err(|err| Error::Database(sqlx::Error::Decode(Box::new(err))))
}

/// Lends a copy straight to `user`, bypassing the request queue.
pub async fn issue(db: &Db, book: BookId, user: UserId) -> Result<Issue, Error> {
	let mut tx = db.begin().await?;
	let issue = open_issue(&mut tx, book, user).await?;
	if !take_copy(&mut tx, book).await? {
		return Err(Error::NoCopiesAvailable);
	}
	tx.commit().await?;

	tracing::info!(issue = issue.id, book, user, "book issued");
	Ok(issue)
}

/// Files a pending request for `book` on behalf of `user`.
pub async fn request(db: &Db, book: BookId, user: UserId) -> Result<Request, Error> {
	let mut tx = db.begin().await?;

	let inserted = sqlx::query_as::<_, Request>(
		r#"
INSERT INTO requests
	(user_id, book_id, request_date, status)
SELECT ?, id, ?, 'pending'
FROM books
WHERE id = ? AND available_copies > 0
RETURNING *"#,
	)
	.bind(user)
	.bind(Utc::now())
	.bind(book)
	.fetch_optional(&mut *tx)
	.await;

	let request = match inserted {
		Ok(Some(request)) => request,
		Ok(None) => {
			let exists = book_exists(&mut tx, book).await?;
			return Err(if exists { Error::NotAvailable } else { Error::BookNotFound });
		}
		Err(err) if is_unique_violation(&err) => return Err(Error::DuplicatePending),
		Err(err) => return Err(err.into()),
	};

	let (borrowed,): (bool,) = sqlx::query_as(
		"SELECT EXISTS(SELECT 1 FROM issues WHERE user_id = ? AND book_id = ? AND is_returned = false)",
	)
	.bind(user)
	.bind(book)
	.fetch_one(&mut *tx)
	.await?;
	if borrowed {
		return Err(Error::AlreadyBorrowed);
	}

	tx.commit().await?;
	tracing::info!(request = request.id, book, user, "book requested");
	Ok(request)
}

/// Approves a pending request and lends the copy. Either every step lands
/// or the request stays pending and the counters are untouched.
pub async fn approve(db: &Db, id: RequestId) -> Result<Request, Error> {
	let mut tx = db.begin().await?;

	let approved = sqlx::query_as::<_, Request>(
		r#"
UPDATE requests SET
	status = 'approved',
	response_date = ?
WHERE id = ? AND status = 'pending'
RETURNING *"#,
	)
	.bind(Utc::now())
	.bind(id)
	.fetch_optional(&mut *tx)
	.await?;

	let request = match approved {
		Some(request) => request,
		None => return Err(Error::NotPending(request_status(&mut tx, id).await?)),
	};

	let issue = open_issue(&mut tx, request.book_id, request.user_id).await?;
	if !take_copy(&mut tx, request.book_id).await? {
		return Err(Error::NoCopiesLeft);
	}
	tx.commit().await?;

	tracing::info!(
		request = request.id,
		issue = issue.id,
		book = request.book_id,
		user = request.user_id,
		"request approved"
	);
	Ok(request)
}

pub async fn reject(db: &Db, id: RequestId, message: Option<String>) -> Result<Request, Error> {
	let mut tx = db.begin().await?;

	let rejected = sqlx::query_as::<_, Request>(
		r#"
UPDATE requests SET
	status = 'rejected',
	response_date = ?,
	response_message = ?
WHERE id = ? AND status = 'pending'
RETURNING *"#,
	)
	.bind(Utc::now())
	.bind(message)
	.bind(id)
	.fetch_optional(&mut *tx)
	.await?;

	let request = match rejected {
		Some(request) => request,
		None => return Err(Error::NotPending(request_status(&mut tx, id).await?)),
	};
	tx.commit().await?;

	tracing::info!(request = request.id, book = request.book_id, user = request.user_id, "request rejected");
	Ok(request)
}

/// Closes the open loan of `book` held by `user` and puts the copy back.
///
/// The loan closes even if the copy can't be shelved (book deleted, or
/// already at its full count); the caller gets a warning instead of an error.
pub async fn return_book(db: &Db, book: BookId, user: UserId) -> Result<Returned, Error> {
	let mut tx = db.begin().await?;

	let issue = sqlx::query_as::<_, Issue>(
		r#"
UPDATE issues SET
	is_returned = true,
	return_date = ?
WHERE user_id = ? AND book_id = ? AND is_returned = false
RETURNING *"#,
	)
	.bind(Utc::now())
	.bind(user)
	.bind(book)
	.fetch_optional(&mut *tx)
	.await?
	.ok_or(Error::NoActiveIssue)?;

	let shelved = sqlx::query(
		"UPDATE books SET available_copies = available_copies + 1 WHERE id = ? AND available_copies < total_copies",
	)
	.bind(book)
	.execute(&mut *tx)
	.await?
	.rows_affected();

	let warning = if shelved == 1 {
		None
	} else if book_exists(&mut tx, book).await? {
		Some("All copies of this book are already on the shelf; availability was not changed".to_string())
	} else {
		Some("Book no longer exists in the catalog; availability was not changed".to_string())
	};
	tx.commit().await?;

	match &warning {
		None => tracing::info!(issue = issue.id, book, user, "book returned"),
		Some(warning) => tracing::warn!(issue = issue.id, book, user, %warning, "book returned without restocking"),
	}
	Ok(Returned { issue, warning })
}
