use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::RepoError;
use crate::domain::entities::{ArticleRecord, AssociatedData, CommentRecord};
use crate::domain::types::{ArticleType, MarkupFormat};

pub(crate) const ARTICLE_COLUMNS: &str = "id, permalink, article_type, title, body, html, format, \
     tags, legacy_id, published, updated, num_comments, associated";

pub(crate) const COMMENT_COLUMNS: &str =
    "id, article_id, parent_id, name, email, homepage, title, body, thread, published";

#[derive(sqlx::FromRow)]
pub(crate) struct ArticleRow {
    pub(crate) id: Uuid,
    pub(crate) permalink: String,
    pub(crate) article_type: String,
    pub(crate) title: String,
    pub(crate) body: String,
    pub(crate) html: String,
    pub(crate) format: String,
    pub(crate) tags: Vec<String>,
    pub(crate) legacy_id: Option<String>,
    pub(crate) published: OffsetDateTime,
    pub(crate) updated: OffsetDateTime,
    pub(crate) num_comments: i32,
    pub(crate) associated: Json<AssociatedData>,
}

impl TryFrom<ArticleRow> for ArticleRecord {
    type Error = RepoError;

    fn try_from(row: ArticleRow) -> Result<Self, Self::Error> {
        let article_type =
            ArticleType::try_from(row.article_type.as_str()).map_err(|_| RepoError::Integrity {
                message: format!(
                    "article `{}` has unknown type `{}`",
                    row.permalink, row.article_type
                ),
            })?;

        Ok(Self {
            id: row.id,
            permalink: row.permalink,
            article_type,
            title: row.title,
            body: row.body,
            html: row.html,
            format: MarkupFormat::from_submitted(Some(&row.format)),
            tags: row.tags,
            legacy_id: row.legacy_id,
            published: row.published,
            updated: row.updated,
            num_comments: row.num_comments,
            associated: row.associated.0,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CommentRow {
    pub(crate) id: Uuid,
    pub(crate) article_id: Uuid,
    pub(crate) parent_id: Option<Uuid>,
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) homepage: Option<String>,
    pub(crate) title: Option<String>,
    pub(crate) body: String,
    pub(crate) thread: String,
    pub(crate) published: OffsetDateTime,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            article_id: row.article_id,
            parent_id: row.parent_id,
            name: row.name,
            email: row.email,
            homepage: row.homepage,
            title: row.title,
            body: row.body,
            thread: row.thread,
            published: row.published,
        }
    }
}
