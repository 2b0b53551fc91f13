use axum::{
	extract::rejection::{JsonRejection, PathRejection},
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use serde::Serialize;

use crate::types::{RequestStatus, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	NotFound,
	Validation,
	Conflict,
	Unavailable,
	Unauthorized,
	Forbidden,
	Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Book not found")]
	BookNotFound,
	#[error("Request not found")]
	RequestNotFound,
	#[error("No active issue found for this book")]
	NoActiveIssue,

	#[error("{0} is required")]
	MissingField(&'static str),
	#[error("{0}")]
	InvalidCopies(String),
	#[error("{0}")]
	BadInput(String),

	#[error("No copies available")]
	NoCopiesAvailable,
	#[error("Book is not available right now")]
	NotAvailable,
	#[error("No available copies left")]
	NoCopiesLeft,
	#[error("You already issued this book")]
	AlreadyIssued,
	#[error("You have already borrowed this book")]
	AlreadyBorrowed,
	#[error("You already have a pending request for this book")]
	DuplicatePending,
	#[error("Request is already {0}")]
	NotPending(RequestStatus),
	#[error("Book has copies on loan and cannot be deleted")]
	BookOnLoan,

	#[error("{0}")]
	Unauthenticated(&'static str),
	#[error("Only {} users may do this", .0.as_str())]
	Forbidden(Role),

	#[error("storage error: {0}")]
	Database(#[from] sqlx::Error),
}

impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::BookNotFound | Error::RequestNotFound | Error::NoActiveIssue => ErrorKind::NotFound,
			Error::MissingField(_) | Error::InvalidCopies(_) | Error::BadInput(_) => ErrorKind::Validation,
			Error::NoCopiesAvailable | Error::NotAvailable | Error::NoCopiesLeft => ErrorKind::Unavailable,
			Error::AlreadyIssued
			| Error::AlreadyBorrowed
			| Error::DuplicatePending
			| Error::NotPending(_)
			| Error::BookOnLoan => ErrorKind::Conflict,
			Error::Unauthenticated(_) => ErrorKind::Unauthorized,
			Error::Forbidden(_) => ErrorKind::Forbidden,
			Error::Database(_) => ErrorKind::Internal,
		}
	}

	pub fn status(&self) -> StatusCode {
		match self.kind() {
			ErrorKind::NotFound => StatusCode::NOT_FOUND,
			ErrorKind::Validation | ErrorKind::Conflict | ErrorKind::Unavailable => StatusCode::BAD_REQUEST,
			ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
			ErrorKind::Forbidden => StatusCode::FORBIDDEN,
			ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	fn code(&self) -> &'static str {
		match self.kind() {
			ErrorKind::NotFound => "NOT_FOUND",
			ErrorKind::Validation => "VALIDATION_ERROR",
			ErrorKind::Conflict => "CONFLICT",
			ErrorKind::Unavailable => "UNAVAILABLE",
			ErrorKind::Unauthorized => "UNAUTHORIZED",
			ErrorKind::Forbidden => "FORBIDDEN",
			ErrorKind::Internal => "INTERNAL_SERVER_ERROR",
		}
	}
}

impl From<JsonRejection> for Error {
	fn from(rejection: JsonRejection) -> Self {
		Error::BadInput(rejection.body_text())
	}
}

impl From<PathRejection> for Error {
	fn from(rejection: PathRejection) -> Self {
		Error::BadInput(rejection.body_text())
	}
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
	matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub(crate) fn is_check_violation(err: &sqlx::Error) -> bool {
	matches!(err, sqlx::Error::Database(db) if db.is_check_violation())
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	code: &'static str,
	message: String,
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let status = self.status();
		let message = if let Error::Database(err) = &self {
			tracing::error!(error = %err, "storage failure");
			"Server error".to_string()
		} else {
			self.to_string()
		};

		let body = ErrorBody { code: self.code(), message };
		(status, Json(body)).into_response()
	}
}
