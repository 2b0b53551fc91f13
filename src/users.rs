//! Caller identity and the user directory.
//!
//! Authentication happens upstream. The gateway forwards the verified
//! identity as `X-User-*` headers; this module turns them into a [`Caller`]
//! and remembers the caller's display profile for listings.

use axum::{extract::FromRequestParts, http::request::Parts, http::HeaderMap};

use crate::error::Error;
use crate::sql::Db;
use crate::types::{Caller, Role};
use crate::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

impl Caller {
	pub fn from_headers(headers: &HeaderMap) -> Result<Caller, Error> {
		let text = |name: &str| {
			headers
				.get(name)
				.and_then(|v| v.to_str().ok())
				.map(str::trim)
				.filter(|v| !v.is_empty())
				.map(str::to_owned)
		};

		let uid = text(USER_ID_HEADER)
			.ok_or(Error::Unauthenticated("Missing caller identity"))?
			.parse()
			.map_err(|_| Error::Unauthenticated("Malformed caller identity"))?;
		let role = text(USER_ROLE_HEADER)
			.ok_or(Error::Unauthenticated("Missing caller role"))?
			.parse()
			.map_err(|_| Error::Unauthenticated("Unknown caller role"))?;

		Ok(Caller {
			uid,
			role,
			name: text(USER_NAME_HEADER),
			email: text(USER_EMAIL_HEADER),
		})
	}

	pub fn require(&self, role: Role) -> Result<(), Error> {
		if self.role == role {
			Ok(())
		} else {
			Err(Error::Forbidden(role))
		}
	}
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Caller {
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
		let caller = Caller::from_headers(&parts.headers)?;
		if caller.name.is_some() || caller.email.is_some() {
			remember(&state.db, &caller).await?;
		}
		Ok(caller)
	}
}

/// Upserts the caller's profile. Fields the gateway left out keep their
/// previous value.
pub async fn remember(db: &Db, caller: &Caller) -> Result<(), Error> {
	sqlx::query(
		r#"
INSERT INTO users (id, name, email, role)
VALUES (?, ?, ?, ?)
ON CONFLICT (id) DO UPDATE SET
	name = COALESCE(excluded.name, users.name),
	email = COALESCE(excluded.email, users.email),
	role = excluded.role"#,
	)
	.bind(caller.uid)
	.bind(&caller.name)
	.bind(&caller.email)
	.bind(caller.role.as_str())
	.execute(db)
	.await?;
	Ok(())
}
