//! Fixtures shared by the in-crate tests.

use std::sync::Arc;

use crate::{
    AppState,
    config::Config,
    db,
    entities::{movie, user},
    models::{MovieInput, RegisterRequest},
};

pub const SECRET: &str = "test-secret";

pub fn config() -> Config {
    Config {
        addr: "127.0.0.1:0".parse().unwrap(),
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: SECRET.to_string(),
        access_token_expire_minutes: 30,
        default_page_limit: 10,
        max_page_limit: 100,
    }
}

pub async fn state() -> Arc<AppState> {
    let config = config();
    let db = db::connect_and_migrate(&config.database_url).await.expect("in-memory database");
    Arc::new(AppState::new(config, db))
}

pub async fn user(state: &AppState, name: &str) -> user::Model {
    state
        .users
        .register(RegisterRequest {
            username: name.to_string(),
            email: format!("{name}@x.com"),
            password: format!("{name}-pw"),
            full_name: None,
        })
        .await
        .expect("register")
}

pub async fn movie(state: &AppState, owner: &user::Model, title: &str) -> movie::Model {
    state
        .movies
        .create(
            MovieInput {
                title: title.to_string(),
                description: format!("{title} description"),
                release_year: 2009,
            },
            owner,
        )
        .await
        .expect("create movie")
}
