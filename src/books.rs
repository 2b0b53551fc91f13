//! Catalog of books and their copy counters.
//!
//! Copy counts only move through the lending lifecycle. Admins may change
//! how many copies the library owns; the available count follows by the
//! same delta so copies out on loan stay accounted for.

use chrono::Utc;

use crate::error::{is_check_violation, Error};
use crate::sql::Db;
use crate::types::{Book, BookId, NewBookForm, UpdateBookForm};

fn required(value: Option<String>, field: &'static str) -> Result<String, Error> {
	match value.map(|v| v.trim().to_owned()) {
		Some(v) if !v.is_empty() => Ok(v),
		_ => Err(Error::MissingField(field)),
	}
}

pub async fn create(db: &Db, form: NewBookForm) -> Result<Book, Error> {
	let title = required(form.title, "title")?;
	let author = required(form.author, "author")?;
	let total = form.total_copies.unwrap_or(1);
	let available = form.available_copies.unwrap_or(total);

	if total < 0 || available < 0 {
		return Err(Error::InvalidCopies("Copy counts cannot be negative".into()));
	}
	if available > total {
		return Err(Error::InvalidCopies("availableCopies cannot exceed totalCopies".into()));
	}

	let now = Utc::now();
	let book = sqlx::query_as::<_, Book>(
		r#"
INSERT INTO books
	(title, author, description, total_copies, available_copies, created_at, updated_at)
VALUES
	(?, ?, ?, ?, ?, ?, ?)
RETURNING *"#,
	)
	.bind(title)
	.bind(author)
	.bind(form.description)
	.bind(total)
	.bind(available)
	.bind(now)
	.bind(now)
	.fetch_one(db)
	.await?;

	tracing::info!(book = book.id, title = %book.title, copies = total, "book added");
	Ok(book)
}

pub async fn list(db: &Db) -> Result<Vec<Book>, Error> {
	let books = sqlx::query_as("SELECT * FROM books ORDER BY id")
		.fetch_all(db)
		.await?;
	Ok(books)
}

pub async fn get(db: &Db, id: BookId) -> Result<Book, Error> {
	sqlx::query_as("SELECT * FROM books WHERE id = ?")
		.bind(id)
		.fetch_optional(db)
		.await?
		.ok_or(Error::BookNotFound)
}

pub async fn update(db: &Db, id: BookId, form: UpdateBookForm) -> Result<Book, Error> {
	let title = form.title.map(|t| required(Some(t), "title")).transpose()?;
	let author = form.author.map(|a| required(Some(a), "author")).transpose()?;
	if form.total_copies.is_some_and(|n| n < 0) {
		return Err(Error::InvalidCopies("Copy counts cannot be negative".into()));
	}

	// SET expressions see the pre-update row, so the delta uses the old total.
	let updated = sqlx::query_as::<_, Book>(
		r#"
UPDATE books SET
	title = COALESCE(?1, title),
	author = COALESCE(?2, author),
	description = COALESCE(?3, description),
	available_copies = available_copies + (COALESCE(?4, total_copies) - total_copies),
	total_copies = COALESCE(?4, total_copies),
	updated_at = ?5
WHERE id = ?6
RETURNING *"#,
	)
	.bind(title)
	.bind(author)
	.bind(form.description)
	.bind(form.total_copies)
	.bind(Utc::now())
	.bind(id)
	.fetch_optional(db)
	.await;

	match updated {
		Ok(Some(book)) => Ok(book),
		Ok(None) => Err(Error::BookNotFound),
		Err(err) if is_check_violation(&err) => Err(Error::InvalidCopies(
			"totalCopies cannot drop below the number of copies on loan".into(),
		)),
		Err(err) => Err(err.into()),
	}
}

/// Deletes a book. Unknown ids are not an error. A book with copies out on
/// loan stays; pending requests for a deleted book are rejected.
pub async fn delete(db: &Db, id: BookId) -> Result<bool, Error> {
	let mut tx = db.begin().await?;

	let withdrawn = sqlx::query(
		r#"
UPDATE requests SET
	status = 'rejected',
	response_date = ?,
	response_message = 'Book withdrawn from the catalog'
WHERE book_id = ? AND status = 'pending'"#,
	)
	.bind(Utc::now())
	.bind(id)
	.execute(&mut *tx)
	.await?
	.rows_affected();

	let (on_loan,): (bool,) =
		sqlx::query_as("SELECT EXISTS(SELECT 1 FROM issues WHERE book_id = ? AND is_returned = false)")
			.bind(id)
			.fetch_one(&mut *tx)
			.await?;
	if on_loan {
		return Err(Error::BookOnLoan);
	}

	let deleted = sqlx::query("DELETE FROM books WHERE id = ?")
		.bind(id)
		.execute(&mut *tx)
		.await?
		.rows_affected();
	tx.commit().await?;

	if deleted > 0 {
		tracing::info!(book = id, withdrawn, "book deleted");
	}
	Ok(deleted > 0)
}
