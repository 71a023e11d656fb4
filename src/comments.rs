use std::collections::{HashMap, HashSet};

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::{info, warn};

use crate::{
    auth::ensure_owner,
    entities::{comment, movie, user},
    error::{AppError, AppResult},
    models::CommentThread,
};

#[derive(Clone)]
pub struct CommentService {
    db: DatabaseConnection,
}

impl CommentService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        movie_id: i32,
        text: String,
        parent_id: Option<i32>,
        author: &user::Model,
    ) -> AppResult<comment::Model> {
        self.ensure_movie(movie_id).await?;

        if let Some(parent_id) = parent_id {
            let parent =
                comment::Entity::find_by_id(parent_id).one(&self.db).await?.ok_or_else(|| {
                    warn!(movie_id, parent_id, "parent comment not found");
                    AppError::not_found("Parent comment")
                })?;
            if parent.movie_id != movie_id {
                warn!(movie_id, parent_id, other = parent.movie_id, "parent on another movie");
                return Err(AppError::Conflict(
                    "Parent comment belongs to a different movie".to_string(),
                ));
            }
        }

        let created = comment::ActiveModel {
            id: Default::default(),
            movie_id: Set(movie_id),
            text: Set(text),
            user_id: Set(author.id),
            parent_id: Set(parent_id),
        }
        .insert(&self.db)
        .await?;

        info!(comment_id = created.id, movie_id, user_id = author.id, "comment added");
        Ok(created)
    }

    pub async fn list_for_movie(&self, movie_id: i32) -> AppResult<Vec<comment::Model>> {
        self.ensure_movie(movie_id).await?;

        let comments = comment::Entity::find()
            .filter(comment::Column::MovieId.eq(movie_id))
            .order_by_asc(comment::Column::Id)
            .all(&self.db)
            .await?;

        info!(movie_id, count = comments.len(), "fetched comments");
        Ok(comments)
    }

    pub async fn threads_for_movie(&self, movie_id: i32) -> AppResult<Vec<CommentThread>> {
        Ok(build_threads(self.list_for_movie(movie_id).await?))
    }

    /// Deletes the comment and every reply beneath it.
    pub async fn delete(&self, id: i32, requester: &user::Model) -> AppResult<u64> {
        let target = comment::Entity::find_by_id(id).one(&self.db).await?.ok_or_else(|| {
            warn!(comment_id = id, "comment not found");
            AppError::not_found("Comment")
        })?;
        ensure_owner(target.user_id, requester, "comment")?;

        let txn = self.db.begin().await?;

        let siblings = comment::Entity::find()
            .filter(comment::Column::MovieId.eq(target.movie_id))
            .all(&txn)
            .await?;
        let doomed = subtree_ids(id, &siblings);

        let res = comment::Entity::delete_many()
            .filter(comment::Column::Id.is_in(doomed))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        info!(
            comment_id = id,
            user_id = requester.id,
            removed = res.rows_affected,
            "comment deleted"
        );
        Ok(res.rows_affected)
    }

    async fn ensure_movie(&self, movie_id: i32) -> AppResult<()> {
        if movie::Entity::find_by_id(movie_id).one(&self.db).await?.is_none() {
            warn!(movie_id, "movie not found");
            return Err(AppError::not_found("Movie"));
        }
        Ok(())
    }
}

fn children_index(comments: &[comment::Model]) -> HashMap<i32, Vec<usize>> {
    let mut children: HashMap<i32, Vec<usize>> = HashMap::new();
    for (idx, c) in comments.iter().enumerate() {
        if let Some(parent) = c.parent_id {
            children.entry(parent).or_default().push(idx);
        }
    }
    children
}

/// `root` plus the ids of all its descendants among `comments`.
fn subtree_ids(root: i32, comments: &[comment::Model]) -> Vec<i32> {
    let children = children_index(comments);
    let mut seen = HashSet::from([root]);
    let mut stack = vec![root];
    let mut out = Vec::new();

    while let Some(id) = stack.pop() {
        out.push(id);
        for &idx in children.get(&id).into_iter().flatten() {
            let child = comments[idx].id;
            if seen.insert(child) {
                stack.push(child);
            }
        }
    }
    out
}

/// Links a flat, id-ordered comment list into reply threads. Comments whose
/// parent is not in the list are treated as roots.
pub fn build_threads(comments: Vec<comment::Model>) -> Vec<CommentThread> {
    let ids: HashSet<i32> = comments.iter().map(|c| c.id).collect();
    let children = children_index(&comments);
    let roots: Vec<usize> = comments
        .iter()
        .enumerate()
        .filter(|(_, c)| c.parent_id.is_none_or(|p| !ids.contains(&p) || p == c.id))
        .map(|(idx, _)| idx)
        .collect();

    let mut slots: Vec<Option<comment::Model>> = comments.into_iter().map(Some).collect();
    roots.into_iter().filter_map(|idx| link(idx, &mut slots, &children)).collect()
}

fn link(
    idx: usize,
    slots: &mut [Option<comment::Model>],
    children: &HashMap<i32, Vec<usize>>,
) -> Option<CommentThread> {
    let comment = slots[idx].take()?;
    let replies = children
        .get(&comment.id)
        .map(|kids| kids.iter().filter_map(|&k| link(k, slots, children)).collect())
        .unwrap_or_default();
    Some(CommentThread { comment, replies })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn row(id: i32, parent_id: Option<i32>) -> comment::Model {
        comment::Model { id, movie_id: 1, text: format!("c{id}"), user_id: 1, parent_id }
    }

    #[test]
    fn threads_nest_replies_under_parents() {
        let threads =
            build_threads(vec![row(1, None), row(2, Some(1)), row(3, None), row(4, Some(2))]);

        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].comment.id, 1);
        assert_eq!(threads[0].replies[0].comment.id, 2);
        assert_eq!(threads[0].replies[0].replies[0].comment.id, 4);
        assert!(threads[1].replies.is_empty());
    }

    #[test]
    fn orphaned_replies_surface_as_roots() {
        let threads = build_threads(vec![row(5, Some(99)), row(6, Some(5))]);

        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].comment.id, 5);
        assert_eq!(threads[0].replies.len(), 1);
    }

    #[test]
    fn subtree_covers_all_descendants_only() {
        let rows =
            vec![row(1, None), row(2, Some(1)), row(3, Some(2)), row(4, None), row(5, Some(4))];

        let mut ids = subtree_ids(1, &rows);
        ids.sort();
        assert_eq!(ids, [1, 2, 3]);
        assert_eq!(subtree_ids(5, &rows), [5]);
    }

    #[tokio::test]
    async fn parent_must_exist_on_same_movie() {
        let state = testing::state().await;
        let alice = testing::user(&state, "alice").await;
        let up = testing::movie(&state, &alice, "Up").await;
        let cars = testing::movie(&state, &alice, "Cars").await;
        let on_cars = state.comments.create(cars.id, "vroom".into(), None, &alice).await.unwrap();

        let missing = state.comments.create(up.id, "hi".into(), Some(777), &alice).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        let cross = state.comments.create(up.id, "hi".into(), Some(on_cars.id), &alice).await;
        assert!(matches!(cross, Err(AppError::Conflict(_))));

        let no_movie = state.comments.create(404, "hi".into(), None, &alice).await;
        assert!(matches!(no_movie, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn deleting_a_comment_removes_its_replies() {
        let state = testing::state().await;
        let alice = testing::user(&state, "alice").await;
        let up = testing::movie(&state, &alice, "Up").await;
        let root = state.comments.create(up.id, "root".into(), None, &alice).await.unwrap();
        let reply =
            state.comments.create(up.id, "reply".into(), Some(root.id), &alice).await.unwrap();
        state.comments.create(up.id, "deep".into(), Some(reply.id), &alice).await.unwrap();
        let other = state.comments.create(up.id, "other".into(), None, &alice).await.unwrap();

        let removed = state.comments.delete(root.id, &alice).await.unwrap();
        assert_eq!(removed, 3);

        let left = state.comments.list_for_movie(up.id).await.unwrap();
        assert_eq!(left, vec![other]);
    }

    #[tokio::test]
    async fn only_author_may_delete() {
        let state = testing::state().await;
        let alice = testing::user(&state, "alice").await;
        let bob = testing::user(&state, "bob").await;
        let up = testing::movie(&state, &alice, "Up").await;
        let c = state.comments.create(up.id, "mine".into(), None, &alice).await.unwrap();

        assert!(matches!(state.comments.delete(c.id, &bob).await, Err(AppError::Forbidden(_))));
        assert!(matches!(state.comments.delete(c.id + 1, &bob).await, Err(AppError::NotFound(_))));
    }
}
