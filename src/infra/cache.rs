//! Bounded response cache for anonymous page views.
//!
//! Only anonymous `GET` requests answered with `200 OK` are stored. Every
//! successful write clears the whole cache and bumps its epoch; a response
//! rendered under an older epoch is never stored.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_MAX_ENTRIES: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: NonZeroUsize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: NonZeroUsize::new(DEFAULT_MAX_ENTRIES).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

#[derive(Clone)]
pub struct ResponseCache {
    enabled: bool,
    entries: Arc<RwLock<LruCache<String, CachedResponse>>>,
    epoch: Arc<AtomicU64>,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            entries: Arc::new(RwLock::new(LruCache::new(config.max_entries))),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get(&self, key: &str) -> Option<Response<Body>> {
        let cached = self.write_guard("get").get(key).cloned();
        match cached {
            Some(cached) => {
                counter!("pagina_cache_hit_total").increment(1);
                Some(cached.into_response())
            }
            None => {
                counter!("pagina_cache_miss_total").increment(1);
                None
            }
        }
    }

    /// Current invalidation epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn put(&self, key: String, response: CachedResponse) {
        let mut guard = self.write_guard("put");
        Self::push(&mut guard, key, response);
    }

    /// Store `response` only if no invalidation happened since `epoch`.
    ///
    /// Returns whether the entry was stored.
    pub fn put_if_current(&self, epoch: u64, key: String, response: CachedResponse) -> bool {
        let mut guard = self.write_guard("put");
        if self.epoch() != epoch {
            counter!("pagina_cache_stale_skip_total").increment(1);
            debug!(target = "pagina::cache", key = %key, "skipping response rendered before invalidation");
            return false;
        }
        Self::push(&mut guard, key, response);
        true
    }

    fn push(guard: &mut LruCache<String, CachedResponse>, key: String, response: CachedResponse) {
        if let Some((evicted, _)) = guard.push(key.clone(), response)
            && evicted != key
        {
            counter!("pagina_cache_evict_total").increment(1);
        }
    }

    pub async fn store_response(
        &self,
        epoch: u64,
        key: &str,
        response: Response,
    ) -> Result<Response, (Response, CacheStoreError)> {
        let (rebuilt, cached) = buffer_response(response).await?;
        self.put_if_current(epoch, key.to_string(), cached);
        Ok(rebuilt)
    }

    pub fn invalidate_all(&self) {
        let mut guard = self.write_guard("invalidate_all");
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let dropped = guard.len();
        guard.clear();
        debug!(target = "pagina::cache", dropped, "response cache cleared");
    }

    pub fn len(&self) -> usize {
        self.write_guard("len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write_guard(&self, op: &'static str) -> RwLockWriteGuard<'_, LruCache<String, CachedResponse>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(
                    target = "pagina::cache",
                    op,
                    "recovered from poisoned response cache lock"
                );
                poisoned.into_inner()
            }
        }
    }
}

#[derive(Clone)]
pub struct CachedResponse {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: &axum::http::HeaderMap, body: Bytes) -> Self {
        let headers = headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Self {
            status,
            headers,
            body,
        }
    }

    fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        headers.clear();
        for (name, value) in self.headers {
            headers.append(name, value);
        }

        response
    }
}

#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("failed to buffer response body: {0}")]
    Buffer(String),
}

pub fn should_store_response(response: &Response) -> bool {
    response.status() == StatusCode::OK && !response.headers().contains_key(header::SET_COOKIE)
}

/// Whether a request may be answered from, or stored into, the cache.
pub fn is_cacheable_request<B>(request: &Request<B>) -> bool {
    request.method() == Method::GET
        && !request.headers().contains_key(header::AUTHORIZATION)
        && !request.uri().path().starts_with("/_health")
}

pub fn cache_key<B>(request: &Request<B>) -> String {
    match request.uri().query() {
        Some(query) => format!("{}?{}", request.uri().path(), query),
        None => request.uri().path().to_string(),
    }
}

pub async fn buffer_response(
    response: Response,
) -> Result<(Response, CachedResponse), (Response, CacheStoreError)> {
    let (parts, body) = response.into_parts();
    match BodyExt::collect(body).await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            let cached = CachedResponse::new(parts.status, &parts.headers, bytes.clone());
            let rebuilt = Response::from_parts(parts, Body::from(bytes));
            Ok((rebuilt, cached))
        }
        Err(error) => {
            let rebuilt = Response::from_parts(parts, Body::empty());
            Err((rebuilt, CacheStoreError::Buffer(error.to_string())))
        }
    }
}

/// Serve anonymous GETs from the cache and remember fresh `200 OK` answers.
pub async fn response_cache_layer(
    State(cache): State<ResponseCache>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.is_enabled() || !is_cacheable_request(&request) {
        return next.run(request).await;
    }

    let key = cache_key(&request);
    if let Some(cached) = cache.get(&key) {
        debug!(target = "pagina::cache", key = %key, outcome = "hit", "serving cached response");
        return cached;
    }

    let epoch = cache.epoch();
    let response = next.run(request).await;
    if !should_store_response(&response) {
        return response;
    }

    match cache.store_response(epoch, &key, response).await {
        Ok(response) => response,
        Err((_, error)) => {
            warn!(target = "pagina::cache", key = %key, error = %error, "failed to cache response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(max: usize) -> ResponseCache {
        ResponseCache::new(CacheConfig {
            enabled: true,
            max_entries: NonZeroUsize::new(max).unwrap(),
        })
    }

    fn cached(body: &'static str) -> CachedResponse {
        CachedResponse::new(
            StatusCode::OK,
            &axum::http::HeaderMap::new(),
            Bytes::from_static(body.as_bytes()),
        )
    }

    #[test]
    fn least_recently_used_entries_are_evicted() {
        let cache = cache(2);
        cache.put("/a".to_string(), cached("a"));
        cache.put("/b".to_string(), cached("b"));
        assert!(cache.get("/a").is_some());
        cache.put("/c".to_string(), cached("c"));

        assert!(cache.get("/b").is_none());
        assert!(cache.get("/a").is_some());
        assert!(cache.get("/c").is_some());
    }

    #[test]
    fn invalidate_all_empties_the_cache() {
        let cache = cache(4);
        cache.put("/a".to_string(), cached("a"));
        cache.put("/b?page=2".to_string(), cached("b"));
        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn responses_rendered_before_an_invalidation_are_not_stored() {
        let cache = cache(4);
        let epoch = cache.epoch();
        cache.invalidate_all();

        assert!(!cache.put_if_current(epoch, "/".to_string(), cached("old")));
        assert!(cache.get("/").is_none());

        assert!(cache.put_if_current(cache.epoch(), "/".to_string(), cached("new")));
        assert!(cache.get("/").is_some());
    }

    #[tokio::test]
    async fn layer_drops_a_page_whose_write_landed_mid_render() {
        use axum::{Router, middleware::from_fn_with_state, routing::get};
        use tower::ServiceExt;

        let cache = cache(4);
        let content = Arc::new(RwLock::new("old".to_string()));
        let handler_cache = cache.clone();
        let handler_content = content.clone();
        let router = Router::new()
            .route(
                "/",
                get(move || {
                    let cache = handler_cache.clone();
                    let content = handler_content.clone();
                    async move {
                        let snapshot = content.read().unwrap().clone();
                        if snapshot == "old" {
                            *content.write().unwrap() = "new".to_string();
                            cache.invalidate_all();
                        }
                        snapshot
                    }
                }),
            )
            .layer(from_fn_with_state(cache.clone(), response_cache_layer));

        let first = router
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let first = first.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&first[..], b"old");
        assert!(cache.is_empty());

        let second = router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let second = second.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&second[..], b"new");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn authenticated_and_non_get_requests_bypass_the_cache() {
        let anonymous = Request::get("/2008").body(()).unwrap();
        assert!(is_cacheable_request(&anonymous));
        assert_eq!(cache_key(&anonymous), "/2008");

        let paged = Request::get("/?page=2").body(()).unwrap();
        assert_eq!(cache_key(&paged), "/?page=2");

        let signed_in = Request::get("/2008")
            .header(header::AUTHORIZATION, "Bearer x")
            .body(())
            .unwrap();
        assert!(!is_cacheable_request(&signed_in));

        let post = Request::post("/About").body(()).unwrap();
        assert!(!is_cacheable_request(&post));
    }
}
