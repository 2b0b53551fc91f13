use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("{var} has an invalid value {value:?}")]
	Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
	pub bind: SocketAddr,
	pub database: DatabaseConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
	pub url: String,
	pub max_connections: u32,
	pub acquire_timeout: Duration,
	/// How long a writer waits on SQLite's lock before giving up.
	pub busy_timeout: Duration,
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		DatabaseConfig {
			url: "sqlite://lms.db".to_string(),
			max_connections: 5,
			acquire_timeout: Duration::from_secs(3),
			busy_timeout: Duration::from_secs(5),
		}
	}
}

impl Config {
	/// Reads the process environment. Call `dotenvy::dotenv()` first to pick
	/// up a `.env` file.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|var| std::env::var(var).ok())
	}

	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
		let defaults = DatabaseConfig::default();
		let database = DatabaseConfig {
			url: lookup("DATABASE_URL").unwrap_or(defaults.url),
			max_connections: parse(&lookup, "LMS_MAX_CONNECTIONS")?.unwrap_or(defaults.max_connections),
			acquire_timeout: parse(&lookup, "LMS_ACQUIRE_TIMEOUT_SECS")?
				.map(Duration::from_secs)
				.unwrap_or(defaults.acquire_timeout),
			busy_timeout: parse(&lookup, "LMS_BUSY_TIMEOUT_SECS")?
				.map(Duration::from_secs)
				.unwrap_or(defaults.busy_timeout),
		};

		let bind = parse(&lookup, "LMS_BIND")?
			.unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)));

		Ok(Config { bind, database })
	}
}

fn parse<T: FromStr>(
	lookup: &impl Fn(&str) -> Option<String>,
	var: &'static str,
) -> Result<Option<T>, ConfigError> {
	match lookup(var) {
		None => Ok(None),
		Some(value) => value
			.trim()
			.parse()
			.map(Some)
			.map_err(|_| ConfigError::Invalid { var, value }),
	}
}
