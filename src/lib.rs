//! Library lending service: catalog, borrow requests and loans over a JSON API.

pub mod api;
pub mod books;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod queries;
pub mod sql;
pub mod types;
pub mod users;

use axum::{http::Request, Router};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub use error::{Error, ErrorKind};

#[derive(Clone)]
pub struct AppState {
	pub db: sql::Db,
}

pub fn app(state: AppState) -> Router {
	let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<_>| {
		tracing::info_span!(
			"request",
			id = %Uuid::new_v4(),
			method = %req.method(),
			uri = %req.uri(),
		)
	});

	Router::new()
		.nest("/api", api::routes())
		.layer(trace)
		.with_state(state)
}
