//! Image Service - upload, serve and edit images over HTTP.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_service::{
    config::{Cli, Command, ServeConfig, TokenConfig},
    edit::{EditEngine, EditService},
    server::{create_router, AuthClaims, RouterConfig, TokenValidator},
    storage::ImageStore,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Token(config) => run_token(config),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let store = match ImageStore::open(&config.upload_dir).await {
        Ok(store) => store,
        Err(e) => {
            error!(
                "Failed to open upload directory {}: {}",
                config.upload_dir.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    };

    info!("Configuration:");
    info!("  Upload dir: {}", store.root().display());
    info!("  JPEG quality: {}", config.jpeg_quality);
    info!("  Max upload: {} bytes", config.max_upload_bytes);

    if config.jwt_secret().is_some() {
        info!("  Auth: JWT bearer tokens");
    } else {
        warn!("  Auth: JWT_SECRET is not set");
        warn!("        Upload and edit requests will fail with 500 until it is configured");
    }

    let engine = EditEngine::with_jpeg_quality(config.jpeg_quality);
    let service = EditService::new(store, engine);

    let router = create_router(service, build_router_config(&config));

    let addr = config.bind_address();

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on: http://{}", addr);
    info!("  curl http://{}/health", addr);

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "image_service=debug,tower_http=debug"
    } else {
        "image_service=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new(config.jwt_secret().map(str::to_string))
        .with_max_upload_bytes(config.max_upload_bytes)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

// =============================================================================
// Token Command
// =============================================================================

fn run_token(config: TokenConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let extra = match config.parse_claims() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut claims = match config.subject {
        Some(ref subject) => AuthClaims::for_subject(subject.as_str()),
        None => AuthClaims::default(),
    };
    for (key, value) in extra {
        claims.insert(key, value);
    }

    let ttl = (config.ttl > 0).then(|| Duration::from_secs(config.ttl));
    let validator = TokenValidator::new(Some(&config.secret));

    match validator.issue(&claims, ttl) {
        Ok(token) => {
            println!("{}", token);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
