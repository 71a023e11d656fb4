use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    routing::{delete, get, post},
};
use serde_json::{Value, json};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    AppState,
    auth::CurrentUser,
    entities::{comment, movie, rating},
    error::AppResult,
    extract::{Json, Path, Query},
    models::{
        CommentCreate, CommentThread, Detail, LoginRequest, MovieCommentCreate, MovieInput,
        MovieRatingCreate, Pagination, RatingCreate, RegisterRequest, RegisterResponse,
        TokenResponse, UserProfile, UserUpdate,
    },
};

type AppStateRef = State<Arc<AppState>>;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/movies", get(list_movies).post(create_movie))
        .route("/movies/{id}", get(get_movie).put(update_movie).delete(delete_movie))
        .route("/movies/{id}/ratings", get(list_ratings).post(rate_movie))
        .route("/movies/{id}/comments", get(list_comments).post(comment_on_movie))
        .route("/movies/{id}/comments/tree", get(comment_threads))
        .route("/ratings", post(create_rating))
        .route("/comments", post(create_comment))
        .route("/comments/{id}", delete(delete_comment))
        .route("/users/me", get(read_me).put(update_me))
        .route("/users/{id}", get(read_user))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any).allow_methods(Any))
        .layer(TraceLayer::new_for_http())
}

pub async fn index() -> Json<Value> {
    Json(json!({ "message": "Welcome to the movie catalog API." }))
}

pub async fn register(
    State(state): AppStateRef,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<RegisterResponse>> {
    let user = state.users.register(req).await?;
    Ok(Json(RegisterResponse { username: user.username, email: user.email }))
}

pub async fn login(
    State(state): AppStateRef,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let token = state.users.login(&req.username, &req.password).await?;
    Ok(Json(TokenResponse::bearer(token)))
}

pub async fn list_movies(
    State(state): AppStateRef,
    Query(page): Query<Pagination>,
) -> AppResult<Json<Vec<movie::Model>>> {
    let skip = page.skip.unwrap_or(0);
    let limit = page
        .limit
        .unwrap_or(state.config.default_page_limit)
        .min(state.config.max_page_limit);
    Ok(Json(state.movies.list(skip, limit).await?))
}

pub async fn get_movie(
    State(state): AppStateRef,
    Path(id): Path<i32>,
) -> AppResult<Json<movie::Model>> {
    Ok(Json(state.movies.get(id).await?))
}

pub async fn create_movie(
    State(state): AppStateRef,
    CurrentUser(user): CurrentUser,
    Json(input): Json<MovieInput>,
) -> AppResult<Json<movie::Model>> {
    Ok(Json(state.movies.create(input, &user).await?))
}

pub async fn update_movie(
    State(state): AppStateRef,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
    Json(input): Json<MovieInput>,
) -> AppResult<Json<movie::Model>> {
    Ok(Json(state.movies.update(id, input, &user).await?))
}

pub async fn delete_movie(
    State(state): AppStateRef,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Detail>> {
    state.movies.delete(id, &user).await?;
    Ok(Json(Detail::new("Movie deleted")))
}

pub async fn create_rating(
    State(state): AppStateRef,
    CurrentUser(user): CurrentUser,
    Json(req): Json<RatingCreate>,
) -> AppResult<Json<rating::Model>> {
    Ok(Json(state.ratings.create(req.movie_id, req.rating, &user).await?))
}

pub async fn rate_movie(
    State(state): AppStateRef,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
    Json(req): Json<MovieRatingCreate>,
) -> AppResult<Json<rating::Model>> {
    Ok(Json(state.ratings.create(id, req.rating, &user).await?))
}

pub async fn list_ratings(
    State(state): AppStateRef,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<rating::Model>>> {
    Ok(Json(state.ratings.list_for_movie(id).await?))
}

pub async fn create_comment(
    State(state): AppStateRef,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CommentCreate>,
) -> AppResult<Json<comment::Model>> {
    Ok(Json(state.comments.create(req.movie_id, req.text, req.parent_id, &user).await?))
}

pub async fn comment_on_movie(
    State(state): AppStateRef,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
    Json(req): Json<MovieCommentCreate>,
) -> AppResult<Json<comment::Model>> {
    Ok(Json(state.comments.create(id, req.text, req.parent_id, &user).await?))
}

pub async fn list_comments(
    State(state): AppStateRef,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<comment::Model>>> {
    Ok(Json(state.comments.list_for_movie(id).await?))
}

pub async fn comment_threads(
    State(state): AppStateRef,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<CommentThread>>> {
    Ok(Json(state.comments.threads_for_movie(id).await?))
}

pub async fn delete_comment(
    State(state): AppStateRef,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Detail>> {
    state.comments.delete(id, &user).await?;
    Ok(Json(Detail::new("Comment deleted")))
}

pub async fn read_me(CurrentUser(user): CurrentUser) -> Json<UserProfile> {
    tracing::info!(user_id = user.id, "fetched current user");
    Json(user.into())
}

pub async fn update_me(
    State(state): AppStateRef,
    CurrentUser(user): CurrentUser,
    Json(update): Json<UserUpdate>,
) -> AppResult<Json<UserProfile>> {
    Ok(Json(state.users.update_self(user, update).await?.into()))
}

pub async fn read_user(
    State(state): AppStateRef,
    Path(id): Path<i32>,
) -> AppResult<Json<UserProfile>> {
    Ok(Json(state.users.get(id).await?.into()))
}
