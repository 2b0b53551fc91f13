use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub type BookId = i64;
pub type IssueId = i64;
pub type RequestId = i64;
pub type UserId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Book {
	pub id: BookId,
	pub title: String,
	pub author: String,
	pub description: Option<String>,
	pub total_copies: i64,
	pub available_copies: i64,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// A copy lent to a user. Open while `is_returned` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
	pub id: IssueId,
	pub user_id: UserId,
	pub book_id: BookId,
	pub issue_date: DateTime<Utc>,
	pub is_returned: bool,
	pub return_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Request {
	pub id: RequestId,
	pub user_id: UserId,
	pub book_id: BookId,
	pub request_date: DateTime<Utc>,
	#[sqlx(try_from = "String")]
	pub status: RequestStatus,
	pub response_date: Option<DateTime<Utc>>,
	pub response_message: Option<String>,
}

/// `Pending` is the only state a request ever leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
	Pending,
	Approved,
	Rejected,
}

impl RequestStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			RequestStatus::Pending => "pending",
			RequestStatus::Approved => "approved",
			RequestStatus::Rejected => "rejected",
		}
	}
}

impl std::fmt::Display for RequestStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, thiserror::Error)]
#[error("unknown request status {0:?}")]
pub struct UnknownStatus(String);

impl TryFrom<String> for RequestStatus {
	type Error = UnknownStatus;

	fn try_from(status: String) -> Result<Self, Self::Error> {
		match status.as_str() {
			"pending" => Ok(RequestStatus::Pending),
			"approved" => Ok(RequestStatus::Approved),
			"rejected" => Ok(RequestStatus::Rejected),
			_ => Err(UnknownStatus(status)),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
	Admin,
	Student,
}

impl Role {
	pub fn as_str(self) -> &'static str {
		match self {
			Role::Admin => "admin",
			Role::Student => "student",
		}
	}
}

impl std::str::FromStr for Role {
	type Err = ();

	fn from_str(role: &str) -> Result<Self, Self::Err> {
		match role.trim().to_ascii_lowercase().as_str() {
			"admin" => Ok(Role::Admin),
			"student" => Ok(Role::Student),
			_ => Err(()),
		}
	}
}

/// Verified identity handed over by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
	pub uid: UserId,
	pub role: Role,
	pub name: Option<String>,
	pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
	pub id: UserId,
	pub name: Option<String>,
	pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookSummary {
	pub id: BookId,
	pub title: String,
	pub author: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueWithBook {
	#[serde(flatten)]
	pub issue: Issue,
	pub book: Option<BookSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueWithParties {
	#[serde(flatten)]
	pub issue: Issue,
	pub user: Option<UserSummary>,
	pub book: Option<BookSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestWithBook {
	#[serde(flatten)]
	pub request: Request,
	pub book: Option<Book>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestWithParties {
	#[serde(flatten)]
	pub request: Request,
	pub user: Option<UserSummary>,
	pub book: Option<Book>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBookForm {
	pub title: Option<String>,
	pub author: Option<String>,
	pub description: Option<String>,
	pub total_copies: Option<i64>,
	pub available_copies: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookForm {
	pub title: Option<String>,
	pub author: Option<String>,
	pub description: Option<String>,
	pub total_copies: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectForm {
	pub message: Option<String>,
}

/// Outcome of closing a loan. The loan is closed even when the copy could
/// not be put back on the shelf; `warning` says why.
#[derive(Debug, Clone)]
pub struct Returned {
	pub issue: Issue,
	pub warning: Option<String>,
}
