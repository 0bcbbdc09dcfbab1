use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{CommentsRepo, CreateCommentParams, RepoError};
use crate::domain::entities::CommentRecord;
use crate::domain::thread::{child_thread, next_ordinal};

use super::PostgresRepositories;
use super::types::{COMMENT_COLUMNS, CommentRow};
use super::util::map_sqlx_error;

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn list_for_article(&self, article_id: Uuid) -> Result<Vec<CommentRecord>, RepoError> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE article_id = $1 ORDER BY thread"
        );
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(article_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(CommentRecord::from).collect())
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1");
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(CommentRecord::from))
    }

    async fn create_comment(&self, params: CreateCommentParams) -> Result<CommentRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        // Locking the article row serialises thread assignment per article.
        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM articles WHERE id = $1 FOR UPDATE")
                .bind(params.article_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        if locked.is_none() {
            return Err(RepoError::NotFound);
        }

        let parent: Option<(Uuid, String)> = match params.parent_id {
            Some(parent_id) => sqlx::query_as(
                "SELECT id, thread FROM comments WHERE id = $1 AND article_id = $2",
            )
            .bind(parent_id)
            .bind(params.article_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?,
            None => None,
        };
        let parent_id = parent.as_ref().map(|(id, _)| *id);

        let siblings: Vec<String> = sqlx::query_scalar(
            "SELECT thread FROM comments WHERE article_id = $1 AND parent_id IS NOT DISTINCT FROM $2",
        )
        .bind(params.article_id)
        .bind(parent_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        let ordinal = next_ordinal(siblings.iter().map(String::as_str)).ok_or_else(|| {
            RepoError::InvalidInput {
                message: "comment thread has no room for another reply".to_string(),
            }
        })?;
        let thread = child_thread(parent.as_ref().map(|(_, thread)| thread.as_str()), ordinal);

        let sql = format!(
            "INSERT INTO comments (
                id, article_id, parent_id, name, email, homepage, title, body, thread, published
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {COMMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(params.article_id)
            .bind(parent_id)
            .bind(params.name)
            .bind(params.email)
            .bind(params.homepage)
            .bind(params.title)
            .bind(params.body)
            .bind(thread)
            .bind(params.published)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        sqlx::query("UPDATE articles SET num_comments = num_comments + 1 WHERE id = $1")
            .bind(params.article_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(CommentRecord::from(row))
    }

    async fn first_comment(&self) -> Result<Option<CommentRecord>, RepoError> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments ORDER BY published ASC LIMIT 1");
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(CommentRecord::from))
    }

    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let article_id: Uuid =
            sqlx::query_scalar("DELETE FROM comments WHERE id = $1 RETURNING article_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?
                .ok_or(RepoError::NotFound)?;

        sqlx::query(
            "UPDATE articles
            SET num_comments = (SELECT count(*) FROM comments WHERE article_id = $1)
            WHERE id = $1",
        )
        .bind(article_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}
