#![allow(dead_code)]

use std::num::NonZeroUsize;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, header},
    response::Response,
};
use pagina::application::{
    articles::ArticleService,
    auth::{Authenticator, Credential, hash_token},
    comments::CommentService,
    markup::MarkupRenderer,
    resolver::{AliasTable, PathResolver, legacy_pattern_for},
    syndication::{FeedMetadata, SyndicationService},
};
use pagina::domain::types::{LegacySoftware, Role};
use pagina::infra::{
    cache::{CacheConfig, ResponseCache},
    http::{HttpState, build_router},
    memory::InMemoryRepositories,
};
use pagina::presentation::views::LayoutChrome;
use tower::ServiceExt;

pub const ADMIN_TOKEN: &str = "admin-token";
pub const USER_TOKEN: &str = "user-token";
pub const PUBLIC_SITE_URL: &str = "http://blog.example/";
pub const PAGE_SIZE: u32 = 2;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryRepositories>,
    pub cache: ResponseCache,
}

pub fn test_app() -> TestApp {
    test_app_with_aliases(AliasTable::default())
}

pub fn test_app_with_aliases(aliases: AliasTable) -> TestApp {
    let store = Arc::new(InMemoryRepositories::new());
    let markup = Arc::new(MarkupRenderer::new());
    let articles = ArticleService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        markup.clone(),
        PAGE_SIZE,
    );
    let comments = CommentService::new(store.clone(), markup);
    let syndication = SyndicationService::new(
        articles.clone(),
        FeedMetadata {
            title: "Test Blog".to_string(),
            author: "Tester".to_string(),
            public_site_url: PUBLIC_SITE_URL.to_string(),
            size: 10,
        },
    );
    let resolver = PathResolver::new(
        aliases,
        Some(legacy_pattern_for(LegacySoftware::Drupal)),
        store.clone(),
    );
    let credentials = vec![
        Credential::new(
            "editor",
            Some("editor@example.com".to_string()),
            Role::Admin,
            &hash_token(ADMIN_TOKEN),
        )
        .expect("admin credential"),
        Credential::new(
            "reader",
            Some("reader@example.com".to_string()),
            Role::User,
            &hash_token(USER_TOKEN),
        )
        .expect("user credential"),
    ];
    let cache = ResponseCache::new(CacheConfig {
        enabled: true,
        max_entries: NonZeroUsize::new(64).expect("non-zero"),
    });

    let state = HttpState {
        articles: Arc::new(articles),
        comments: Arc::new(comments),
        syndication: Arc::new(syndication),
        resolver: Arc::new(resolver),
        authenticator: Authenticator::new(credentials),
        health: store.clone(),
        cache: Some(cache.clone()),
        chrome: LayoutChrome::new("Test Blog", "Notes"),
    };

    TestApp {
        router: build_router(state),
        store,
        cache,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.send(get(uri, None)).await
    }

    pub async fn get_as(&self, uri: &str, token: &str) -> Response {
        self.send(get(uri, Some(token))).await
    }

    pub async fn post_form(
        &self,
        uri: &str,
        token: Option<&str>,
        fields: &[(&str, &str)],
    ) -> Response {
        self.send(form(Method::POST, uri, token, fields)).await
    }

    /// Create a blog entry as the admin and return its path.
    pub async fn create_entry(&self, title: &str, published: &str, tags: &str) -> String {
        let response = self
            .post_form(
                "/2008/5",
                Some(ADMIN_TOKEN),
                &[
                    ("title", title),
                    ("body", "Entry **body**"),
                    ("format", "markdown"),
                    ("published", published),
                    ("tags", tags),
                ],
            )
            .await;
        assert_eq!(response.status(), axum::http::StatusCode::SEE_OTHER);
        location(&response).to_string()
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request builds")
}

pub fn form(
    method: Method,
    uri: &str,
    token: Option<&str>,
    fields: &[(&str, &str)],
) -> Request<Body> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish();
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body)).expect("request builds")
}

pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body collects");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}
