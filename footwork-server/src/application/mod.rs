pub mod auth_service;
pub mod post_service;
pub mod publisher;
pub mod rate_limiter;
