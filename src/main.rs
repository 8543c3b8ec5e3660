//! Inkpost - serves markdown posts and comments from a directory tree

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inkpost::{
    api::{self, AppState, FeedRenderer},
    config::Config,
    content::loader::ContentPaths,
    services::{
        spawn_reconciler, AkismetChecker, Blog, CommentService, MarkdownRenderer, PostWatcher,
        RecaptchaVerifier,
    },
};

#[derive(Debug, Parser)]
#[command(name = "inkpost", version, about = "Markdown blogging engine")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "inkpost.yml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkpost=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Inkpost...");

    // Load configuration
    let config = Config::load_with_env(&cli.config)?;
    config.validate()?;
    tracing::info!(path = %cli.config.display(), "Configuration loaded");

    // Collaborators
    let renderer = MarkdownRenderer::new();
    let spam = AkismetChecker::new(
        config.spam.akismet_api_key.clone(),
        Duration::from_secs(config.spam.timeout_secs),
    )?;
    let verifier = RecaptchaVerifier::new(
        config.captcha.recaptcha_secret.clone(),
        Duration::from_secs(config.captcha.timeout_secs),
    )?;

    // Initial full scan; the server does not start without it
    let paths = ContentPaths::new(&config.content.post_path, &config.content.comment_path);
    let blog = Arc::new(
        Blog::open(paths, renderer, Arc::new(spam), config.blog.address.clone())
            .context("Initial scan of the post directory failed")?,
    );
    let snapshot = blog.snapshot();
    tracing::info!(
        "Serving {} posts and {} comments",
        snapshot.posts.len(),
        snapshot.posts.comment_count()
    );
    drop(snapshot);

    // Filesystem watcher feeding the reconciler
    let (watcher, events) = if config.content.watch {
        let (watcher, events) = PostWatcher::start(&config.content.post_path)?;
        (Some(watcher), events)
    } else {
        let (_, events) = mpsc::unbounded_channel();
        (None, events)
    };
    let reconciler = spawn_reconciler(
        Arc::clone(&blog),
        events,
        config.content.rescan_interval(),
    );

    // Build application state
    let comment_service = Arc::new(CommentService::new(
        Arc::clone(&blog),
        Arc::new(verifier),
        config.blog.comments_open_for_days,
    ));
    let state = AppState {
        blog,
        comment_service,
        site: Arc::new(config.blog.clone()),
        feed: Arc::new(FeedRenderer::new()?),
    };

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    reconciler.shutdown().await;
    drop(watcher);
    tracing::info!("Inkpost stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
