// src/main.rs
use anyhow::Context;
use axum::extract::Extension;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use dotenv::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::env;
use std::path::PathBuf;
use std::{net::SocketAddr, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod auth;
mod common;
mod services;

use auth::{OtpEngine, TokenService};
use common::{AppState, AuthConfig};
use services::{GoogleService, LogMailer, Mailer, SesMailer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // ========================================================================
    // ENVIRONMENT CONFIGURATION
    // ========================================================================

    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://notes_api.db".to_string());

    // Refusing to serve beats signing sessions with a guessable secret
    let jwt_secret = env::var("JWT_SECRET")
        .context("JWT_SECRET is not set; generate one with the generate_jwt_secret bin")?;

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let otp_exp_minutes = env::var("OTP_EXP_MINUTES")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(10);
    let otp_max_attempts = env::var("OTP_MAX_ATTEMPTS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(5);
    let otp_hash_cost = env::var("OTP_HASH_COST")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(10);
    let jwt_expires_days = env::var("JWT_EXPIRES_DAYS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(7);

    let google_client_id = env::var("GOOGLE_CLIENT_ID").ok();
    let google_client_secret = env::var("GOOGLE_CLIENT_SECRET").ok();

    let frontend_origin =
        env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".to_string());
    let oauth_redirect_url = env::var("OAUTH_REDIRECT_URL")
        .unwrap_or_else(|_| format!("http://localhost:{}/api/auth/google/callback", port));
    let production = env::var("APP_ENV")
        .map(|v| v == "production")
        .unwrap_or(false);

    let cors_origin: HeaderValue = frontend_origin
        .parse()
        .context("CORS_ORIGIN is not a valid header value")?;

    // ========================================================================
    // DATABASE SETUP
    // ========================================================================

    if let Some(path_part) = database_url.strip_prefix("sqlite://") {
        let path_without_params = path_part.split('?').next().unwrap_or("");
        if !path_without_params.is_empty() && !path_without_params.starts_with(':') {
            let db_path = PathBuf::from(path_without_params);
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }
    }

    // foreign_keys on for the user -> otp cascade
    let connect_options = SqliteConnectOptions::from_str(&database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(connect_options)
        .await?;

    common::migrations::run_migrations(&pool).await?;

    // ========================================================================
    // SERVICE INITIALIZATION
    // ========================================================================

    if google_client_id.is_none() {
        warn!("GOOGLE_CLIENT_ID not set, Google sign-in routes will report NOT_CONFIGURED");
    }
    let google_service = Arc::new(GoogleService::new(google_client_id, google_client_secret));
    info!("GoogleService initialized");

    let mailer: Arc<dyn Mailer> = match env::var("SES_FROM_EMAIL")
        .ok()
        .filter(|v| !v.trim().is_empty())
    {
        Some(from_email) => {
            info!(from = %from_email, "SES mailer initialized");
            Arc::new(SesMailer::new(from_email, otp_exp_minutes).await)
        }
        None => {
            warn!("SES_FROM_EMAIL not set, OTP codes will be logged instead of emailed");
            Arc::new(LogMailer)
        }
    };

    // ========================================================================
    // APPLICATION STATE
    // ========================================================================

    let app_state = AppState {
        db: pool,
        config: AuthConfig {
            frontend_origin,
            oauth_redirect_url,
            production,
        },
        otp_engine: OtpEngine::new(otp_exp_minutes, otp_hash_cost, otp_max_attempts),
        token_service: Arc::new(TokenService::new(&jwt_secret, jwt_expires_days)),
        google_service,
        mailer,
    };

    let shared = Arc::new(app_state);

    // ========================================================================
    // ROUTER COMPOSITION
    // ========================================================================

    let app = Router::new()
        .merge(auth::auth_routes())
        .layer(Extension(shared.clone()))
        .layer(
            // Credentials on and a single exact origin: the session
            // cookie only travels to the configured frontend
            CorsLayer::new()
                .allow_origin(cors_origin)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
                .allow_credentials(true),
        )
        .layer(TraceLayer::new_for_http());

    // ========================================================================
    // SERVER STARTUP
    // ========================================================================

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
