use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::application::auth::{AuthError, Authenticator, Principal};
use crate::application::error::HttpError;

/// The authenticated principal of a request, `None` for anonymous viewers.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<Principal>);

impl Viewer {
    pub fn principal(&self) -> Option<&Principal> {
        self.0.as_ref()
    }
}

/// Resolve the bearer token, if any, into a [`Viewer`]. A token that does not
/// match any credential is rejected outright rather than treated as anonymous.
pub async fn authenticate_viewer(
    State(authenticator): State<Authenticator>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let principal = match request.headers().get(header::AUTHORIZATION) {
        None => None,
        Some(value) => {
            let outcome = value
                .to_str()
                .map_err(|_| AuthError::Malformed)
                .and_then(|header| authenticator.authenticate_header(header));
            match outcome {
                Ok(principal) => {
                    debug!(
                        target = "pagina::http::auth",
                        name = %principal.name,
                        role = %principal.role,
                        "authenticated request"
                    );
                    Some(principal)
                }
                Err(err) => return unauthorized(err),
            }
        }
    };

    let viewer = Viewer(principal);
    request.extensions_mut().insert(viewer.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(viewer);
    response
}

fn unauthorized(err: AuthError) -> Response {
    let mut response = HttpError::from_error(
        "infra::http::auth::authenticate_viewer",
        StatusCode::UNAUTHORIZED,
        "Invalid credentials",
        &err,
    )
    .into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Bearer"),
    );
    response
}
