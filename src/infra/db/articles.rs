use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder, types::Json};
use uuid::Uuid;

use crate::application::repos::{
    ArticlePage, ArticleQuery, ArticlesRepo, ArticlesWriteRepo, CreateArticleParams, RepoError,
    UpdateArticleParams,
};
use crate::domain::entities::ArticleRecord;

use super::PostgresRepositories;
use super::types::{ARTICLE_COLUMNS, ArticleRow};
use super::util::{escape_like, map_sqlx_error};

impl PostgresRepositories {
    async fn fetch_article_where(
        &self,
        column: &'static str,
        value: &str,
    ) -> Result<Option<ArticleRecord>, RepoError> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE {column} = $1 LIMIT 1");
        sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(value)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .map(ArticleRecord::try_from)
            .transpose()
    }

    fn apply_article_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, query: &'q ArticleQuery) {
        if let Some(kind) = query.article_type {
            qb.push(" AND article_type = ");
            qb.push_bind(kind.as_str());
        }

        if let Some(tag) = query.tag.as_ref() {
            qb.push(" AND ");
            qb.push_bind(tag);
            qb.push(" = ANY(tags)");
        }

        if let Some(term) = query.search.as_ref() {
            qb.push(" AND (");
            qb.push_bind(term);
            qb.push(" = ANY(tags) OR title ILIKE ");
            qb.push_bind(format!("%{}%", escape_like(term)));
            qb.push(")");
        }

        if let Some(range) = query.published {
            qb.push(" AND published >= ");
            qb.push_bind(range.start);
            qb.push(" AND published < ");
            qb.push_bind(range.end);
        }
    }
}

#[async_trait]
impl ArticlesRepo for PostgresRepositories {
    async fn find_by_permalink(&self, permalink: &str) -> Result<Option<ArticleRecord>, RepoError> {
        self.fetch_article_where("permalink", permalink).await
    }

    async fn find_by_legacy_id(&self, legacy_id: &str) -> Result<Option<ArticleRecord>, RepoError> {
        self.fetch_article_where("legacy_id", legacy_id).await
    }

    async fn list_articles(&self, query: &ArticleQuery) -> Result<ArticlePage, RepoError> {
        let mut qb = QueryBuilder::new(format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE 1=1"));
        Self::apply_article_filter(&mut qb, query);
        qb.push(" ORDER BY published DESC, id");

        if query.limit > 0 {
            qb.push(" LIMIT ");
            qb.push_bind(i64::from(query.limit) + 1);
        }
        if query.offset > 0 {
            qb.push(" OFFSET ");
            qb.push_bind(i64::from(query.offset));
        }

        let rows = qb
            .build_query_as::<ArticleRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut items = rows
            .into_iter()
            .map(ArticleRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let has_more = query.limit > 0 && items.len() > query.limit as usize;
        if has_more {
            items.truncate(query.limit as usize);
        }

        Ok(ArticlePage { items, has_more })
    }

    async fn first_article(&self) -> Result<Option<ArticleRecord>, RepoError> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles ORDER BY published ASC, created_at ASC LIMIT 1"
        );
        sqlx::query_as::<_, ArticleRow>(&sql)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .map(ArticleRecord::try_from)
            .transpose()
    }
}

#[async_trait]
impl ArticlesWriteRepo for PostgresRepositories {
    async fn create_article(&self, params: CreateArticleParams) -> Result<ArticleRecord, RepoError> {
        let CreateArticleParams {
            permalink,
            article_type,
            title,
            body,
            html,
            format,
            tags,
            legacy_id,
            published,
            updated,
            associated,
        } = params;

        let sql = format!(
            "INSERT INTO articles (
                id, permalink, article_type, title, body, html, format,
                tags, legacy_id, published, updated, associated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {ARTICLE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(permalink)
            .bind(article_type.as_str())
            .bind(title)
            .bind(body)
            .bind(html)
            .bind(format.as_str())
            .bind(tags)
            .bind(legacy_id)
            .bind(published)
            .bind(updated)
            .bind(Json(associated))
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        ArticleRecord::try_from(row)
    }

    async fn update_article(&self, params: UpdateArticleParams) -> Result<ArticleRecord, RepoError> {
        let sql = format!(
            "UPDATE articles
            SET title = $2, body = $3, html = $4, format = $5, tags = $6, updated = $7
            WHERE id = $1
            RETURNING {ARTICLE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(params.id)
            .bind(params.title)
            .bind(params.body)
            .bind(params.html)
            .bind(params.format.as_str())
            .bind(params.tags)
            .bind(params.updated)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        ArticleRecord::try_from(row)
    }

    async fn delete_article(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
