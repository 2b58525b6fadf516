use crate::application::publisher::ScheduledPublisher;
use crate::data::post_repository::PostgresPostRepository;
use crate::domain::error::DomainError;
use crate::presentation::utils::AuthenticatedUser;
use actix_web::{HttpResponse, post, web};
use tracing::info;

/// Manual trigger for the reconciliation pass, same entrypoint the timer
/// loop uses. Returns the run report.
#[post("/tasks/publish-scheduled")]
pub async fn publish_scheduled(
    user: AuthenticatedUser,
    publisher: web::Data<ScheduledPublisher<PostgresPostRepository>>,
) -> Result<HttpResponse, DomainError> {
    let report = publisher.run().await?;

    info!(
        username = %user.username,
        processed = report.processed,
        published = report.published.len(),
        failed = report.failed.len(),
        "manual scheduled publish run"
    );

    Ok(HttpResponse::Ok().json(report))
}
