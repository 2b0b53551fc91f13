// library lending service

use lms::{config::Config, sql, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	// a missing .env is fine, the environment may already be set
	dotenvy::dotenv().ok();

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| "lms=info,tower_http=info".into()),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	let config = Config::from_env()?;

	// set up connection pool
	let db = sql::connect(&config.database).await?;
	tracing::info!(url = %config.database.url, "database ready");

	let app = lms::app(AppState { db: db.clone() });

	let listener = tokio::net::TcpListener::bind(config.bind).await?;
	tracing::info!(addr = %config.bind, "listening");
	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown())
		.await?;

	db.close().await;
	tracing::info!("shut down");
	Ok(())
}

async fn shutdown() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %err, "can't listen for ctrl-c");
		std::future::pending::<()>().await;
	}
}
