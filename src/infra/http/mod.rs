mod auth;
mod middleware;
mod resources;

pub use auth::{Viewer, authenticate_viewer};
pub use middleware::RequestContext;

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::{any, get},
};

use crate::application::articles::ArticleService;
use crate::application::auth::Authenticator;
use crate::application::comments::CommentService;
use crate::application::error::ErrorReport;
use crate::application::repos::{HealthRepo, RepoError};
use crate::application::resolver::PathResolver;
use crate::application::syndication::SyndicationService;
use crate::infra::cache::{ResponseCache, response_cache_layer};
use crate::presentation::views::LayoutChrome;

use middleware::{log_responses, set_request_context};

/// Everything a request handler needs, shared across the router.
#[derive(Clone)]
pub struct HttpState {
    pub articles: Arc<ArticleService>,
    pub comments: Arc<CommentService>,
    pub syndication: Arc<SyndicationService>,
    pub resolver: Arc<PathResolver>,
    pub authenticator: Authenticator,
    pub health: Arc<dyn HealthRepo>,
    pub cache: Option<ResponseCache>,
    pub chrome: LayoutChrome,
}

impl HttpState {
    fn invalidate_cache(&self) {
        if let Some(cache) = self.cache.as_ref() {
            cache.invalidate_all();
        }
    }
}

/// Every path except the health probe is a resource dispatched by verb.
pub fn build_router(state: HttpState) -> Router {
    let resources = Router::new()
        .route("/", any(resources::dispatch_resource))
        .route("/{*path}", any(resources::dispatch_resource));

    let resources = match state.cache.clone() {
        Some(cache) if cache.is_enabled() => {
            resources.layer(from_fn_with_state(cache, response_cache_layer))
        }
        _ => resources,
    };

    let authenticator = state.authenticator.clone();

    Router::new()
        .route("/_health/db", get(db_health))
        .merge(resources)
        .with_state(state)
        .layer(from_fn_with_state(authenticator, authenticate_viewer))
        .layer(from_fn(log_responses))
        .layer(from_fn(set_request_context))
}

async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.health_check().await)
}

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
