use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{info, warn};

use crate::{
    entities::{movie, rating, user},
    error::{AppError, AppResult},
};

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

#[derive(Clone)]
pub struct RatingService {
    db: DatabaseConnection,
}

impl RatingService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        movie_id: i32,
        value: i32,
        author: &user::Model,
    ) -> AppResult<rating::Model> {
        if !(MIN_RATING..=MAX_RATING).contains(&value) {
            warn!(movie_id, rating = value, "rating out of range");
            return Err(AppError::Invalid(format!(
                "Rating must be between {MIN_RATING} and {MAX_RATING}"
            )));
        }
        self.ensure_movie(movie_id).await?;

        let created = rating::ActiveModel {
            id: Default::default(),
            movie_id: Set(movie_id),
            rating: Set(value),
            user_id: Set(author.id),
        }
        .insert(&self.db)
        .await?;

        info!(movie_id, user_id = author.id, rating = value, "rating added");
        Ok(created)
    }

    pub async fn list_for_movie(&self, movie_id: i32) -> AppResult<Vec<rating::Model>> {
        self.ensure_movie(movie_id).await?;

        let ratings = rating::Entity::find()
            .filter(rating::Column::MovieId.eq(movie_id))
            .order_by_asc(rating::Column::Id)
            .all(&self.db)
            .await?;

        info!(movie_id, count = ratings.len(), "fetched ratings");
        Ok(ratings)
    }

    async fn ensure_movie(&self, movie_id: i32) -> AppResult<()> {
        if movie::Entity::find_by_id(movie_id).one(&self.db).await?.is_none() {
            warn!(movie_id, "movie not found");
            return Err(AppError::not_found("Movie"));
        }
        Ok(())
    }
}
