//! Read side: loans and requests with their book and borrower resolved.
//! References that no longer resolve come back as `None`.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::error::Error;
use crate::sql::Db;
use crate::types::{
	Book, BookSummary, Issue, IssueWithBook, IssueWithParties, Request, RequestWithBook,
	RequestWithParties, UserId, UserSummary,
};

#[derive(FromRow)]
struct IssueRow {
	#[sqlx(flatten)]
	issue: Issue,
	book_title: Option<String>,
	book_author: Option<String>,
	user_known: bool,
	user_name: Option<String>,
	user_email: Option<String>,
}

#[derive(FromRow)]
struct RequestRow {
	#[sqlx(flatten)]
	request: Request,
	book_title: Option<String>,
	book_author: Option<String>,
	book_description: Option<String>,
	book_total_copies: Option<i64>,
	book_available_copies: Option<i64>,
	book_created_at: Option<DateTime<Utc>>,
	book_updated_at: Option<DateTime<Utc>>,
	user_known: bool,
	user_name: Option<String>,
	user_email: Option<String>,
}

impl IssueRow {
	fn book(&self) -> Option<BookSummary> {
		Some(BookSummary {
			id: self.issue.book_id,
			title: self.book_title.clone()?,
			author: self.book_author.clone()?,
		})
	}

	fn user(&self) -> Option<UserSummary> {
		self.user_known.then(|| UserSummary {
			id: self.issue.user_id,
			name: self.user_name.clone(),
			email: self.user_email.clone(),
		})
	}
}

impl RequestRow {
	fn book(&self) -> Option<Book> {
		Some(Book {
			id: self.request.book_id,
			title: self.book_title.clone()?,
			author: self.book_author.clone()?,
			description: self.book_description.clone(),
			total_copies: self.book_total_copies?,
			available_copies: self.book_available_copies?,
			created_at: self.book_created_at?,
			updated_at: self.book_updated_at?,
		})
	}

	fn user(&self) -> Option<UserSummary> {
		self.user_known.then(|| UserSummary {
			id: self.request.user_id,
			name: self.user_name.clone(),
			email: self.user_email.clone(),
		})
	}
}

const ISSUES: &str = r#"
SELECT
	i.*,
	b.title AS book_title,
	b.author AS book_author,
	u.id IS NOT NULL AS user_known,
	u.name AS user_name,
	u.email AS user_email
FROM issues i
LEFT JOIN books b ON b.id = i.book_id
LEFT JOIN users u ON u.id = i.user_id"#;

const REQUESTS: &str = r#"
SELECT
	r.*,
	b.title AS book_title,
	b.author AS book_author,
	b.description AS book_description,
	b.total_copies AS book_total_copies,
	b.available_copies AS book_available_copies,
	b.created_at AS book_created_at,
	b.updated_at AS book_updated_at,
	u.id IS NOT NULL AS user_known,
	u.name AS user_name,
	u.email AS user_email
FROM requests r
LEFT JOIN books b ON b.id = r.book_id
LEFT JOIN users u ON u.id = r.user_id"#;

pub async fn my_issues(db: &Db, user: UserId) -> Result<Vec<IssueWithBook>, Error> {
	let rows: Vec<IssueRow> = sqlx::query_as(&format!("{ISSUES} WHERE i.user_id = ? ORDER BY i.id"))
		.bind(user)
		.fetch_all(db)
		.await?;

	Ok(rows
		.into_iter()
		.map(|row| IssueWithBook { book: row.book(), issue: row.issue })
		.collect())
}

pub async fn all_issues(db: &Db) -> Result<Vec<IssueWithParties>, Error> {
	let rows: Vec<IssueRow> = sqlx::query_as(&format!("{ISSUES} ORDER BY i.id"))
		.fetch_all(db)
		.await?;

	Ok(rows
		.into_iter()
		.map(|row| IssueWithParties { user: row.user(), book: row.book(), issue: row.issue })
		.collect())
}

/// Newest first.
pub async fn my_requests(db: &Db, user: UserId) -> Result<Vec<RequestWithBook>, Error> {
	let rows: Vec<RequestRow> = sqlx::query_as(&format!(
		"{REQUESTS} WHERE r.user_id = ? ORDER BY r.request_date DESC, r.id DESC"
	))
	.bind(user)
	.fetch_all(db)
	.await?;

	Ok(rows
		.into_iter()
		.map(|row| RequestWithBook { book: row.book(), request: row.request })
		.collect())
}

pub async fn all_requests(db: &Db) -> Result<Vec<RequestWithParties>, Error> {
	let rows: Vec<RequestRow> = sqlx::query_as(&format!("{REQUESTS} ORDER BY r.id"))
		.fetch_all(db)
		.await?;

	Ok(rows
		.into_iter()
		.map(|row| RequestWithParties { user: row.user(), book: row.book(), request: row.request })
		.collect())
}
