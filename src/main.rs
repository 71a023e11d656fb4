mod auth;
mod comments;
mod config;
mod db;
mod entities;
mod error;
mod extract;
mod models;
mod movies;
mod ratings;
mod routes;
#[cfg(test)]
mod testing;
mod users;

use std::sync::Arc;

use jiff::SignedDuration;
use sea_orm::DatabaseConnection;

use crate::{
    auth::TokenIssuer, comments::CommentService, config::Config, movies::MovieService,
    ratings::RatingService, users::UserService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: DatabaseConnection,
    pub tokens: Arc<TokenIssuer>,
    pub users: UserService,
    pub movies: MovieService,
    pub ratings: RatingService,
    pub comments: CommentService,
}

impl AppState {
    pub fn new(config: Config, db: DatabaseConnection) -> Self {
        let token_ttl = SignedDuration::from_mins(config.access_token_expire_minutes);
        let tokens = Arc::new(TokenIssuer::new(config.jwt_secret.as_bytes(), token_ttl));

        Self {
            config: Arc::new(config),
            users: UserService::new(db.clone(), tokens.clone()),
            movies: MovieService::new(db.clone()),
            ratings: RatingService::new(db.clone()),
            comments: CommentService::new(db.clone()),
            tokens,
            db,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,moviedex=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Config::from_env()?;
    let addr = config.addr;

    let db = db::connect_and_migrate(&config.database_url).await?;
    let state = Arc::new(AppState::new(config, db));

    let app = routes::router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutting down");
        })
        .await?;

    state.db.clone().close().await?;
    Ok(())
}
