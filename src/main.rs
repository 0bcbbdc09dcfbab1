use std::{future::IntoFuture, process, sync::Arc};

use pagina::{
    application::{
        articles::ArticleService,
        auth::{Authenticator, hash_token},
        comments::CommentService,
        error::AppError,
        markup::MarkupRenderer,
        repos::{ArticlesRepo, ArticlesWriteRepo, CommentsRepo, HealthRepo},
        resolver::{PathResolver, legacy_pattern_for},
        syndication::{FeedMetadata, SyndicationService},
    },
    config,
    infra::{
        aliases::load_alias_table,
        cache::{CacheConfig, ResponseCache},
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        memory::InMemoryRepositories,
        telemetry,
    },
    presentation::views::LayoutChrome,
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    match command {
        config::Command::HashToken(args) => {
            println!("{}", hash_token(&args.token));
            Ok(())
        }
        config::Command::Serve(_) => {
            telemetry::init(&settings.logging).map_err(AppError::from)?;
            run_serve(settings).await
        }
    }
}

/// Storage behind the services, either Postgres or the in-process store.
struct Repositories {
    articles: Arc<dyn ArticlesRepo>,
    articles_write: Arc<dyn ArticlesWriteRepo>,
    comments: Arc<dyn CommentsRepo>,
    health: Arc<dyn HealthRepo>,
}

async fn init_repositories(settings: &config::Settings) -> Result<Repositories, AppError> {
    let Some(database_url) = settings.database.url.as_deref() else {
        warn!(
            target = "pagina::bootstrap",
            "database.url is not configured; using the in-memory store"
        );
        let store = Arc::new(InMemoryRepositories::new());
        return Ok(Repositories {
            articles: store.clone(),
            articles_write: store.clone(),
            comments: store.clone(),
            health: store,
        });
    };

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let store = Arc::new(PostgresRepositories::new(pool));
    Ok(Repositories {
        articles: store.clone(),
        articles_write: store.clone(),
        comments: store.clone(),
        health: store,
    })
}

async fn build_http_state(
    repositories: Repositories,
    settings: &config::Settings,
) -> Result<HttpState, AppError> {
    let blog = &settings.blog;
    let markup = Arc::new(MarkupRenderer::new());

    let articles = ArticleService::new(
        repositories.articles.clone(),
        repositories.articles_write,
        repositories.comments.clone(),
        markup.clone(),
        blog.page_size.get(),
    );
    let comments = CommentService::new(repositories.comments, markup);
    let syndication = SyndicationService::new(
        articles.clone(),
        FeedMetadata {
            title: blog.title.clone(),
            author: blog.author.clone(),
            public_site_url: blog.public_site_url.clone(),
            size: blog.feed_size.get(),
        },
    );

    let aliases = load_alias_table(&settings.aliases).await?;
    info!(
        target = "pagina::bootstrap",
        aliases = aliases.len(),
        legacy_software = ?blog.legacy_software,
        "path resolver ready"
    );
    let resolver = PathResolver::new(
        aliases,
        blog.legacy_software.map(legacy_pattern_for),
        repositories.articles,
    );

    let cache = settings.cache.enabled.then(|| {
        ResponseCache::new(CacheConfig {
            enabled: true,
            max_entries: settings.cache.max_entries,
        })
    });

    Ok(HttpState {
        articles: Arc::new(articles),
        comments: Arc::new(comments),
        syndication: Arc::new(syndication),
        resolver: Arc::new(resolver),
        authenticator: Authenticator::new(settings.auth.credentials.clone()),
        health: repositories.health,
        cache,
        chrome: LayoutChrome::new(&blog.title, &blog.description),
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let state = build_http_state(repositories, &settings).await?;
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "pagina::bootstrap",
        addr = %settings.server.addr,
        "listening"
    );

    let shutdown_started = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown({
            let shutdown_started = shutdown_started.clone();
            async move {
                shutdown_signal().await;
                shutdown_started.notify_one();
            }
        })
        .into_future();

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = async {
            shutdown_started.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                target = "pagina::bootstrap",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    info!(target = "pagina::bootstrap", "server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "pagina::bootstrap", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(target = "pagina::bootstrap", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!(target = "pagina::bootstrap", "shutdown signal received");
}
