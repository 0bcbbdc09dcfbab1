mod common;

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
    middleware,
    routing::get,
};
use metrics_util::debugging::DebuggingRecorder;
use pagina::infra::cache::{CacheConfig, ResponseCache, response_cache_layer};
use tower::ServiceExt;

use common::test_app;

#[tokio::test]
async fn cache_and_dispatch_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let cache = ResponseCache::new(CacheConfig {
        enabled: true,
        max_entries: NonZeroUsize::new(1).expect("non-zero"),
    });
    let calls = Arc::new(AtomicUsize::new(0));
    let handler_calls = Arc::clone(&calls);
    let app = Router::new()
        .route(
            "/{page}",
            get(move || {
                let calls = Arc::clone(&handler_calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    "rendered"
                }
            }),
        )
        .layer(middleware::from_fn_with_state(cache, response_cache_layer));

    for uri in ["/one", "/one", "/two"] {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("request should build");
        let response = app
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let blog = test_app();
    blog.create_entry("Counted", "2008-05-04 10:00:00", "").await;
    assert_eq!(blog.get("/").await.status(), StatusCode::OK);

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "pagina_cache_hit_total",
        "pagina_cache_miss_total",
        "pagina_cache_evict_total",
        "pagina_dispatch_total",
        "pagina_mutations_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
