mod application;
mod data;
mod domain;
mod infrastructure;
mod presentation;

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{App, HttpServer, web};
use tracing::{error, info};

use crate::application::auth_service::AuthService;
use crate::application::post_service::PostService;
use crate::application::publisher::ScheduledPublisher;
use crate::application::rate_limiter::{RateLimitConfig, RateLimiter};
use crate::data::post_repository::PostgresPostRepository;
use crate::data::rate_limit_repository::PostgresRateLimitStore;
use crate::data::user_repository::PostgresUserRepository;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::database::{create_pool, run_migrations};
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::security::JwtKeys;
use crate::presentation::handlers;
use crate::presentation::middleware::{
    JwtAuthMiddleware, RateLimitMiddleware, RequestIdMiddleware, TimingMiddleware,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_logging();

    let config = AppConfig::from_env().expect("invalid configuration");
    let pool = create_pool(&config.database_url)
        .await
        .expect("failed to connect to database");
    run_migrations(&pool)
        .await
        .expect("failed to run migrations");

    let user_repo = Arc::new(PostgresUserRepository::new(pool.clone()));
    let post_repo = Arc::new(PostgresPostRepository::new(pool.clone()));
    let rate_limit_store = Arc::new(PostgresRateLimitStore::new(pool.clone()));

    let auth_service = AuthService::new(
        Arc::clone(&user_repo),
        JwtKeys::new(config.jwt_secret.clone()),
    );
    let post_service = PostService::new(Arc::clone(&post_repo));
    let publisher = ScheduledPublisher::new(
        Arc::clone(&post_repo),
        Duration::from_secs(config.publish_discovery_timeout_secs),
    );
    let rate_limiter = RateLimiter::new(
        Arc::clone(&rate_limit_store),
        RateLimitConfig {
            max_requests: config.rate_limit_max_requests,
            window_ms: config.rate_limit_window_ms,
        },
    );

    spawn_publish_loop(publisher.clone(), config.publish_interval_secs);
    spawn_rate_limit_cleanup(rate_limiter.clone(), config.rate_limit_cleanup_interval_secs);

    let config_data = config.clone();

    HttpServer::new(move || {
        let cors = build_cors(&config_data);
        App::new()
            .wrap(Logger::default())
            .wrap(RateLimitMiddleware)
            .wrap(TimingMiddleware)
            .wrap(RequestIdMiddleware)
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("Referrer-Policy", "no-referrer"))
                    .add(("Permissions-Policy", "geolocation=()"))
                    .add(("Cross-Origin-Opener-Policy", "same-origin")),
            )
            .wrap(cors)
            .app_data(web::Data::new(post_service.clone()))
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(publisher.clone()))
            .app_data(web::Data::new(rate_limiter.clone()))
            .service(
                web::scope("/api")
                    .service(handlers::auth::scope())
                    .service(handlers::post::get_posts)
                    .service(handlers::post::get_post)
                    .service(
                        web::scope("")
                            .wrap(JwtAuthMiddleware::new(auth_service.keys().clone()))
                            .service(handlers::post::create_post)
                            .service(handlers::post::update_post)
                            .service(handlers::post::delete_post)
                            .service(handlers::post::admin_posts)
                            .service(handlers::post::admin_get_post)
                            .service(handlers::tasks::publish_scheduled),
                    ),
            )
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}

/// Periodic reconciliation of scheduled posts. Runs until shutdown; a failed
/// run is logged and retried on the next tick, never in-process.
fn spawn_publish_loop(publisher: ScheduledPublisher<PostgresPostRepository>, interval_secs: u64) {
    let interval = Duration::from_secs(interval_secs);
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            match publisher.run().await {
                Ok(report) => {
                    if report.processed > 0 {
                        info!(
                            processed = report.processed,
                            published = report.published.len(),
                            failed = report.failed.len(),
                            "scheduled publish run completed"
                        );
                    }
                }
                Err(e) => error!(error = %e, "scheduled publish run failed"),
            }
        }
    });
}

fn spawn_rate_limit_cleanup(limiter: RateLimiter<PostgresRateLimitStore>, interval_secs: u64) {
    let interval = Duration::from_secs(interval_secs);
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let removed = limiter.cleanup_expired().await;
            if removed > 0 {
                info!(removed, "expired rate limit records cleaned up");
            }
        }
    });
}

fn build_cors(config: &AppConfig) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allowed_headers(vec![
            actix_web::http::header::CONTENT_TYPE,
            actix_web::http::header::AUTHORIZATION,
        ])
        .supports_credentials()
        .max_age(3600);

    for origin in &config.cors_origins {
        cors = cors.allowed_origin(origin);
    }

    cors
}
