//! The single resource handler: classify the path, settle the verb, check the
//! viewer's role, then run the action.

use axum::{
    Extension,
    body::{Body, to_bytes},
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, Uri, header},
    response::{IntoResponse, Redirect, Response},
};
use metrics::counter;
use tracing::{debug, warn};

use crate::application::articles::{Listing, MaintenanceTarget};
use crate::application::auth::{AccessDenied, authorize};
use crate::application::dispatch::{
    Action, METHOD_OVERRIDE_PARAM, Operation, Verb, action_for, allow_header_value,
    allowed_verbs, effective_verb,
};
use crate::application::error::{AppError, ErrorReport, HttpError};
use crate::application::properties::{SubmittedForm, page_number};
use crate::application::resolver::Resolution;
use crate::application::routing::{Resource, ResourceKind};
use crate::domain::entities::ArticleRecord;
use crate::domain::types::{ArticleType, Role};
use crate::presentation::views::{
    ArticleTemplate, ArticleView, ArticlesTemplate, LayoutChrome, LayoutContext, ListingView,
    render_not_found_response, render_template_response, render_unauthorized_response,
};

use super::HttpState;
use super::auth::Viewer;

const MAX_FORM_BYTES: usize = 1024 * 1024;
const ATOM_CONTENT_TYPE: &str = "application/atom+xml; charset=utf-8";
const SEARCH_PARAM: &str = "s";
const PAGE_PARAM: &str = "page";

pub(super) async fn dispatch_resource(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    request: Request<Body>,
) -> Response {
    let (parts, body) = request.into_parts();
    let resource = Resource::classify(parts.uri.path());
    let kind = resource.kind();

    let override_value = query_param(&parts.uri, METHOD_OVERRIDE_PARAM);
    let Some(verb) = effective_verb(&parts.method, override_value.as_deref(), kind) else {
        return method_not_allowed(kind, &parts.method, &allowed_verbs(kind));
    };

    counter!(
        "pagina_dispatch_total",
        "resource" => kind.to_string(),
        "verb" => verb.as_str()
    )
    .increment(1);
    debug!(
        target = "pagina::http::dispatch",
        resource = %kind,
        verb = %verb,
        path = %parts.uri.path(),
        "dispatching resource"
    );

    let action = match action_for(kind, verb) {
        Ok(action) => action,
        Err(err) => return method_not_allowed(kind, &parts.method, &err.allowed),
    };

    let chrome = state
        .chrome
        .clone()
        .with_can_edit(viewer.principal().is_some_and(|p| p.role.satisfies(Role::Admin)));

    if let Err(denied) = authorize(viewer.principal(), action.required_role) {
        return access_denied(chrome, denied);
    }

    let form = if action.mutates() {
        match to_bytes(body, MAX_FORM_BYTES).await {
            Ok(bytes) => SubmittedForm::parse(parts.uri.query(), &bytes),
            Err(err) => {
                return HttpError::new(
                    "infra::http::resources::dispatch_resource",
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "Request body too large",
                    err.to_string(),
                )
                .into_response();
            }
        }
    } else {
        SubmittedForm::default()
    };

    let outcome = perform(&state, &viewer, chrome.clone(), &resource, &parts.uri, action, &form).await;

    match outcome {
        Ok(response) => {
            if action.mutates() {
                state.invalidate_cache();
                counter!("pagina_mutations_total", "operation" => action.name()).increment(1);
            }
            response
        }
        Err(err) if err.is_not_found() => {
            let mut response = render_not_found_response(chrome);
            ErrorReport::from_error(
                "infra::http::resources::dispatch_resource",
                StatusCode::NOT_FOUND,
                &err,
            )
            .attach(&mut response);
            response
        }
        Err(err) => {
            warn!(
                target = "pagina::http::dispatch",
                operation = action.name(),
                error = %err,
                "action failed"
            );
            err.into_response()
        }
    }
}

async fn perform(
    state: &HttpState,
    viewer: &Viewer,
    chrome: LayoutChrome,
    resource: &Resource,
    uri: &Uri,
    action: Action,
    form: &SubmittedForm,
) -> Result<Response, AppError> {
    let page = page_number(query_param(uri, PAGE_PARAM).as_deref());

    match (action.operation, resource) {
        (Operation::ListBlogEntries, _) => list(state, chrome, Listing::Recent, page, uri).await,
        (Operation::ListYear, Resource::Year(year)) => {
            list(state, chrome, Listing::Year(*year), page, uri).await
        }
        (Operation::ListMonth, Resource::Month { year, month }) => {
            let listing = Listing::Month {
                year: *year,
                month: *month,
            };
            list(state, chrome, listing, page, uri).await
        }
        (Operation::ListTag, Resource::Tag(tag)) => {
            list(state, chrome, Listing::Tag(tag.clone()), page, uri).await
        }
        (Operation::Search, _) => {
            let term = query_param(uri, SEARCH_PARAM).unwrap_or_default();
            list(state, chrome, Listing::Search(term.trim().to_string()), page, uri).await
        }
        (Operation::AtomFeed, _) => {
            let feed = state.syndication.atom_feed().await?;
            Ok((
                [(header::CONTENT_TYPE, HeaderValue::from_static(ATOM_CONTENT_TYPE))],
                feed,
            )
                .into_response())
        }
        (Operation::ShowArticle, _) => match state.resolver.resolve(resource, Verb::Get).await? {
            Resolution::Redirect(target) => Ok(found(&target)),
            Resolution::NotFound => Err(AppError::NotFound),
            resolution @ Resolution::Found { .. } => {
                let article = resolution.into_article().ok_or(AppError::NotFound)?;
                let title = article.title.clone();
                let detail = state.articles.detail(article).await?;
                let view = LayoutContext::new(chrome.with_title(&title), ArticleView::from(&detail));
                Ok(render_template_response(ArticleTemplate { view }, StatusCode::OK))
            }
        },
        (Operation::ShowNotFoundPage, _) => Ok(render_not_found_response(chrome)),
        (Operation::ShowUnauthorizedPage, _) => Ok(render_unauthorized_response(
            chrome,
            StatusCode::FORBIDDEN,
            "unauthorized page requested",
        )),
        (Operation::CreateArticle, _) => {
            let article = state.articles.create(ArticleType::Article, form).await?;
            Ok(see_other(&article))
        }
        (Operation::CreateBlogEntry, _) => {
            let article = state.articles.create(ArticleType::BlogEntry, form).await?;
            Ok(see_other(&article))
        }
        (Operation::AddComment, _) => {
            let article = resolve_target(state, resource, Verb::Post).await?;
            state
                .comments
                .add(&article, form, viewer.principal())
                .await?;
            Ok(see_other(&article))
        }
        (Operation::EditArticle, _) => {
            let article = resolve_target(state, resource, Verb::Put).await?;
            let updated = state.articles.edit(article, form).await?;
            Ok(see_other(&updated))
        }
        (Operation::DeleteArticle, Resource::Article(path))
            if MaintenanceTarget::from_path(path).is_some() =>
        {
            let target = MaintenanceTarget::from_path(path).ok_or(AppError::NotFound)?;
            let deleted = state.articles.delete_first(target).await?;
            Ok((StatusCode::OK, format!("Deleted {deleted}")).into_response())
        }
        (Operation::DeleteArticle, _) => {
            let article = resolve_target(state, resource, Verb::Delete).await?;
            state.articles.delete(&article).await?;
            Ok(Redirect::to("/").into_response())
        }
        (operation, _) => Err(AppError::unexpected(format!(
            "{} cannot be performed on {}",
            operation.as_str(),
            resource.kind()
        ))),
    }
}

async fn list(
    state: &HttpState,
    chrome: LayoutChrome,
    listing: Listing,
    page: u32,
    uri: &Uri,
) -> Result<Response, AppError> {
    let listing = state.articles.list(listing, page).await?;
    let view = ListingView::from_listing(&listing, uri.path());
    let chrome = match listing.listing {
        Listing::Recent => chrome,
        _ => chrome.with_title(&listing.heading),
    };
    Ok(render_template_response(
        ArticlesTemplate {
            view: LayoutContext::new(chrome, view),
        },
        StatusCode::OK,
    ))
}

/// Writes address canonical permalinks only; aliases never apply.
async fn resolve_target(
    state: &HttpState,
    resource: &Resource,
    verb: Verb,
) -> Result<ArticleRecord, AppError> {
    state
        .resolver
        .resolve(resource, verb)
        .await?
        .into_article()
        .ok_or(AppError::NotFound)
}

fn see_other(article: &ArticleRecord) -> Response {
    Redirect::to(&article.path()).into_response()
}

fn found(target: &str) -> Response {
    match HeaderValue::from_str(target) {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(err) => HttpError::new(
            "infra::http::resources::found",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Invalid redirect target",
            err.to_string(),
        )
        .into_response(),
    }
}

fn method_not_allowed(kind: ResourceKind, method: &Method, allowed: &[Verb]) -> Response {
    let mut response = HttpError::new(
        "infra::http::resources::method_not_allowed",
        StatusCode::METHOD_NOT_ALLOWED,
        "Method not allowed",
        format!("{method} is not supported on {kind} resources"),
    )
    .into_response();
    if let Ok(value) = HeaderValue::from_str(&allow_header_value(allowed)) {
        response.headers_mut().insert(header::ALLOW, value);
    }
    response
}

fn access_denied(chrome: LayoutChrome, denied: AccessDenied) -> Response {
    match denied {
        AccessDenied::Unauthenticated { .. } => {
            let mut response =
                render_unauthorized_response(chrome, StatusCode::UNAUTHORIZED, denied.to_string());
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer"),
            );
            response
        }
        AccessDenied::Forbidden { .. } => {
            render_unauthorized_response(chrome, StatusCode::FORBIDDEN, denied.to_string())
        }
    }
}

fn query_param(uri: &Uri, name: &str) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
