use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::config::DatabaseConfig;

pub type Db = SqlitePool;

/*
[student] request book
INSERT INTO requests SELECT ... FROM books WHERE id = ? AND available_copies > 0;

[admin] approve request -- as one transaction
UPDATE requests SET status = 'approved' WHERE id = ? AND status = 'pending';
UPDATE books SET available_copies = available_copies - 1 WHERE id = ? AND available_copies > 0;
INSERT INTO issues ...;

[any] return book
UPDATE issues SET is_returned = true WHERE user_id = ? AND book_id = ? AND is_returned = false;
UPDATE books SET available_copies = available_copies + 1 WHERE id = ? AND available_copies < total_copies;
*/

// Uniqueness of open issues and pending requests lives in the partial
// indexes; the lifecycle relies on them instead of reading first.
pub const TABLE_SCHEMA: &[&str] = &[
	r#"
CREATE TABLE IF NOT EXISTS users (
	id INTEGER NOT NULL PRIMARY KEY,
	name TEXT,
	email TEXT,
	role TEXT NOT NULL
)"#,
	r#"
CREATE TABLE IF NOT EXISTS books (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	title TEXT NOT NULL,
	author TEXT NOT NULL,
	description TEXT,
	total_copies INTEGER NOT NULL DEFAULT 1,
	available_copies INTEGER NOT NULL DEFAULT 1,
	created_at TEXT NOT NULL,
	updated_at TEXT NOT NULL,
	CHECK(total_copies >= 0),
	CHECK(available_copies >= 0 AND available_copies <= total_copies)
)"#,
	r#"
CREATE TABLE IF NOT EXISTS issues (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	user_id INTEGER NOT NULL,
	book_id INTEGER NOT NULL,
	issue_date TEXT NOT NULL,
	is_returned BOOL NOT NULL DEFAULT false,
	return_date TEXT DEFAULT NULL,
	CHECK(is_returned == (return_date IS NOT NULL))
)"#,
	r#"
CREATE UNIQUE INDEX IF NOT EXISTS issues_one_open
	ON issues (user_id, book_id) WHERE is_returned = false"#,
	r#"
CREATE TABLE IF NOT EXISTS requests (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	user_id INTEGER NOT NULL,
	book_id INTEGER NOT NULL,
	request_date TEXT NOT NULL,
	status TEXT NOT NULL DEFAULT 'pending',
	response_date TEXT DEFAULT NULL,
	response_message TEXT DEFAULT NULL,
	CHECK(status IN ('pending', 'approved', 'rejected')),
	CHECK((status == 'pending') == (response_date IS NULL))
)"#,
	r#"
CREATE UNIQUE INDEX IF NOT EXISTS requests_one_pending
	ON requests (user_id, book_id) WHERE status = 'pending'"#,
	r#"
CREATE INDEX IF NOT EXISTS requests_by_user
	ON requests (user_id, request_date)"#,
];

pub async fn connect(config: &DatabaseConfig) -> Result<Db, sqlx::Error> {
	let options = SqliteConnectOptions::from_str(&config.url)?
		.create_if_missing(true)
		.journal_mode(SqliteJournalMode::Wal)
		.busy_timeout(config.busy_timeout);

	let pool = SqlitePoolOptions::new()
		.max_connections(config.max_connections)
		.acquire_timeout(config.acquire_timeout)
		.connect_with(options)
		.await?;

	schema(&pool).await?;
	Ok(pool)
}

pub async fn schema(db: &Db) -> Result<(), sqlx::Error> {
	for statement in TABLE_SCHEMA {
		sqlx::query(statement).execute(db).await?;
	}
	Ok(())
}

/// Fresh database file under the system temp dir. An in-memory database
/// would give every pooled connection its own empty copy.
#[cfg(test)]
pub(crate) async fn scratch() -> Db {
	let path = std::env::temp_dir().join(format!("lms-test-{}.db", uuid::Uuid::new_v4()));
	let config = DatabaseConfig {
		url: format!("sqlite://{}", path.display()),
		..DatabaseConfig::default()
	};
	connect(&config).await.expect("can't open scratch database")
}
