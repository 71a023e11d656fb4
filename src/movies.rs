use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::{info, warn};

use crate::{
    auth::ensure_owner,
    entities::{comment, movie, rating, user},
    error::{AppError, AppResult},
    models::MovieInput,
};

const SQL_INT_MAX: u64 = i64::MAX as u64;

#[derive(Clone)]
pub struct MovieService {
    db: DatabaseConnection,
}

impl MovieService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(&self, input: MovieInput, owner: &user::Model) -> AppResult<movie::Model> {
        let created = movie::ActiveModel {
            id: Default::default(),
            title: Set(input.title),
            description: Set(input.description),
            release_year: Set(input.release_year),
            owner_id: Set(owner.id),
        }
        .insert(&self.db)
        .await?;

        info!(movie_id = created.id, user_id = owner.id, title = %created.title, "movie created");
        Ok(created)
    }

    pub async fn get(&self, id: i32) -> AppResult<movie::Model> {
        movie::Entity::find_by_id(id).one(&self.db).await?.ok_or_else(|| {
            warn!(movie_id = id, "movie not found");
            AppError::not_found("Movie")
        })
    }

    /// Movies in insertion order.
    pub async fn list(&self, skip: u64, limit: u64) -> AppResult<Vec<movie::Model>> {
        // SQLite binds integers as i64.
        let (skip, limit) = (skip.min(SQL_INT_MAX), limit.min(SQL_INT_MAX));
        let movies = movie::Entity::find()
            .order_by_asc(movie::Column::Id)
            .offset(skip)
            .limit(limit)
            .all(&self.db)
            .await?;

        info!(count = movies.len(), skip, limit, "fetched movies");
        Ok(movies)
    }

    pub async fn update(
        &self,
        id: i32,
        input: MovieInput,
        requester: &user::Model,
    ) -> AppResult<movie::Model> {
        let existing = self.get(id).await?;
        ensure_owner(existing.owner_id, requester, "movie")?;

        let mut active: movie::ActiveModel = existing.into();
        active.title = Set(input.title);
        active.description = Set(input.description);
        active.release_year = Set(input.release_year);
        let updated = active.update(&self.db).await?;

        info!(movie_id = id, user_id = requester.id, "movie updated");
        Ok(updated)
    }

    /// Removes the movie along with its ratings and comments.
    pub async fn delete(&self, id: i32, requester: &user::Model) -> AppResult<()> {
        let existing = self.get(id).await?;
        ensure_owner(existing.owner_id, requester, "movie")?;

        let txn = self.db.begin().await?;

        let comments = comment::Entity::delete_many()
            .filter(comment::Column::MovieId.eq(id))
            .exec(&txn)
            .await?;
        let ratings = rating::Entity::delete_many()
            .filter(rating::Column::MovieId.eq(id))
            .exec(&txn)
            .await?;
        existing.delete(&txn).await?;

        txn.commit().await?;

        info!(
            movie_id = id,
            user_id = requester.id,
            comments = comments.rows_affected,
            ratings = ratings.rows_affected,
            "movie deleted"
        );
        Ok(())
    }
}
