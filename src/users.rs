use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use tracing::{info, warn};

use crate::{
    auth::{TokenIssuer, hash_password, verify_password},
    entities::user,
    error::{AppError, AppResult},
    models::{RegisterRequest, UserUpdate},
};

#[derive(Clone)]
pub struct UserService {
    db: DatabaseConnection,
    tokens: Arc<TokenIssuer>,
}

impl UserService {
    pub fn new(db: DatabaseConnection, tokens: Arc<TokenIssuer>) -> Self {
        Self { db, tokens }
    }

    pub async fn register(&self, req: RegisterRequest) -> AppResult<user::Model> {
        info!(username = %req.username, email = %req.email, "registration request");

        if self.find_by_username(&req.username).await?.is_some() {
            warn!(username = %req.username, "username already registered");
            return Err(AppError::Conflict("Username already registered".to_string()));
        }
        if self.find_by_email(&req.email).await?.is_some() {
            warn!(email = %req.email, "email already registered");
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password = req.password;
        let hashed_password = blocking(move || hash_password(&password)).await??;

        // The unique indexes still decide races between concurrent registrations.
        let created = user::ActiveModel {
            id: Default::default(),
            username: Set(req.username),
            email: Set(req.email),
            full_name: Set(req.full_name),
            hashed_password: Set(hashed_password),
            disabled: Set(false),
        }
        .insert(&self.db)
        .await?;

        info!(user_id = created.id, username = %created.username, "user registered");
        Ok(created)
    }

    /// Verifies credentials and returns a fresh access token.
    pub async fn login(&self, username: &str, password: &str) -> AppResult<String> {
        let user = self.find_by_username(username).await?;

        let valid = match &user {
            Some(u) => {
                let (password, stored) = (password.to_string(), u.hashed_password.clone());
                blocking(move || verify_password(&password, &stored)).await??
            },
            None => false,
        };
        let Some(user) = user.filter(|_| valid) else {
            warn!(username = %username, "invalid login attempt");
            return Err(AppError::Unauthorized("Invalid username or password".to_string()));
        };

        let token = self.tokens.issue(&user.username, user.id)?;
        info!(user_id = user.id, "login succeeded");
        Ok(token)
    }

    pub async fn find(&self, id: i32) -> AppResult<Option<user::Model>> {
        Ok(user::Entity::find_by_id(id).one(&self.db).await?)
    }

    pub async fn get(&self, id: i32) -> AppResult<user::Model> {
        self.find(id).await?.ok_or_else(|| {
            warn!(user_id = id, "user not found");
            AppError::not_found("User")
        })
    }

    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<user::Model>> {
        Ok(user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await?)
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<user::Model>> {
        Ok(user::Entity::find().filter(user::Column::Email.eq(email)).one(&self.db).await?)
    }

    /// Overwrites the caller's username and email, keeping both unique among users.
    pub async fn update_self(
        &self,
        current: user::Model,
        update: UserUpdate,
    ) -> AppResult<user::Model> {
        let taken_username = user::Entity::find()
            .filter(user::Column::Username.eq(update.username.as_str()))
            .filter(user::Column::Id.ne(current.id))
            .one(&self.db)
            .await?;
        if taken_username.is_some() {
            warn!(user_id = current.id, username = %update.username, "username taken");
            return Err(AppError::Conflict("Username already registered".to_string()));
        }

        let taken_email = user::Entity::find()
            .filter(user::Column::Email.eq(update.email.as_str()))
            .filter(user::Column::Id.ne(current.id))
            .one(&self.db)
            .await?;
        if taken_email.is_some() {
            warn!(user_id = current.id, email = %update.email, "email taken");
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let id = current.id;
        let mut active: user::ActiveModel = current.into();
        active.username = Set(update.username);
        active.email = Set(update.email);
        if update.full_name.is_some() {
            active.full_name = Set(update.full_name);
        }
        let updated = active.update(&self.db).await?;

        info!(user_id = id, "user updated");
        Ok(updated)
    }
}

/// Runs Argon2 work off the async workers.
async fn blocking<T, F>(work: F) -> AppResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(anyhow::Error::new(e).context("password task")))
}
