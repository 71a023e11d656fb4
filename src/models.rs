use serde::{Deserialize, Serialize};

use crate::entities::{comment, user};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self { access_token, token_type: "bearer".to_string() }
    }
}

/// Public view of a user; the password hash never leaves the service.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub disabled: bool,
}

impl From<user::Model> for UserProfile {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            full_name: u.full_name,
            disabled: u.disabled,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UserUpdate {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MovieInput {
    pub title: String,
    pub description: String,
    pub release_year: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RatingCreate {
    pub movie_id: i32,
    pub rating: i32,
}

#[derive(Debug, Deserialize)]
pub struct MovieRatingCreate {
    pub rating: i32,
}

#[derive(Debug, Deserialize)]
pub struct CommentCreate {
    pub movie_id: i32,
    pub text: String,
    #[serde(default)]
    pub parent_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct MovieCommentCreate {
    pub text: String,
    #[serde(default)]
    pub parent_id: Option<i32>,
}

/// A comment with its replies linked in.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: comment::Model,
    pub replies: Vec<CommentThread>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Detail {
    pub detail: String,
}

impl Detail {
    pub fn new(detail: impl Into<String>) -> Self {
        Self { detail: detail.into() }
    }
}
