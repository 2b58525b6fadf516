use crate::application::post_service::PostService;
use crate::data::post_repository::{PostFilter, PostgresPostRepository};
use crate::domain::error::DomainError;
use crate::presentation::dto::{
    AdminPostsQuery, CreatePostRequest, ListPostsQuery, UpdatePostRequest,
};
use crate::presentation::utils::AuthenticatedUser;
use actix_web::{HttpMessage, HttpRequest, HttpResponse, delete, get, post, put, web};
use serde_json::json;
use tracing::info;

#[post("/posts")]
pub async fn create_post(
    req: HttpRequest,
    user: AuthenticatedUser,
    service: web::Data<PostService<PostgresPostRepository>>,
    payload: web::Json<CreatePostRequest>,
) -> Result<HttpResponse, DomainError> {
    let post = service.create_post(user.id, payload.into_inner()).await?;

    info!(
        request_id = %request_id(&req),
        username = %user.username,
        post_id = post.id,
        status = %post.status,
        "post created"
    );

    Ok(HttpResponse::Created().json(post))
}

#[put("/posts/{id}")]
pub async fn update_post(
    req: HttpRequest,
    user: AuthenticatedUser,
    service: web::Data<PostService<PostgresPostRepository>>,
    payload: web::Json<UpdatePostRequest>,
    path: web::Path<i64>,
) -> Result<HttpResponse, DomainError> {
    let post_id = path.into_inner();
    let post = service.update_post(post_id, payload.into_inner()).await?;

    info!(
        request_id = %request_id(&req),
        username = %user.username,
        post_id,
        status = %post.status,
        "post updated"
    );

    Ok(HttpResponse::Ok().json(post))
}

#[delete("/posts/{id}")]
pub async fn delete_post(
    req: HttpRequest,
    user: AuthenticatedUser,
    service: web::Data<PostService<PostgresPostRepository>>,
    path: web::Path<i64>,
) -> Result<HttpResponse, DomainError> {
    let post_id = path.into_inner();
    service.delete_post(post_id).await?;

    info!(
        request_id = %request_id(&req),
        username = %user.username,
        post_id,
        "post deleted"
    );

    Ok(HttpResponse::NoContent().finish())
}

#[get("/posts")]
pub async fn get_posts(
    service: web::Data<PostService<PostgresPostRepository>>,
    query: web::Query<ListPostsQuery>,
) -> Result<HttpResponse, DomainError> {
    let (posts, total) = service.get_published_posts(query.limit, query.offset).await?;

    Ok(HttpResponse::Ok().json(json!({
        "posts": posts,
        "total": total,
        "limit": query.limit,
        "offset": query.offset
    })))
}

#[get("/posts/{id}")]
pub async fn get_post(
    service: web::Data<PostService<PostgresPostRepository>>,
    path: web::Path<i64>,
) -> Result<HttpResponse, DomainError> {
    let post = service.get_published_post(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(post))
}

#[get("/admin/posts")]
pub async fn admin_posts(
    req: HttpRequest,
    user: AuthenticatedUser,
    service: web::Data<PostService<PostgresPostRepository>>,
    query: web::Query<AdminPostsQuery>,
) -> Result<HttpResponse, DomainError> {
    let query = query.into_inner();
    let (posts, total) = service
        .admin_posts(PostFilter {
            status: query.status,
            search: query.search,
            limit: query.limit,
            offset: query.offset,
        })
        .await?;

    info!(
        request_id = %request_id(&req),
        username = %user.username,
        total,
        "admin posts listed"
    );

    Ok(HttpResponse::Ok().json(json!({
        "posts": posts,
        "total": total,
        "limit": query.limit,
        "offset": query.offset
    })))
}

#[get("/admin/posts/{id}")]
pub async fn admin_get_post(
    _user: AuthenticatedUser,
    service: web::Data<PostService<PostgresPostRepository>>,
    path: web::Path<i64>,
) -> Result<HttpResponse, DomainError> {
    let post = service.get_post(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(post))
}

fn request_id(req: &HttpRequest) -> String {
    req.extensions()
        .get::<crate::presentation::middleware::RequestId>()
        .map(|rid| rid.0.clone())
        .unwrap_or_else(|| "unknown".into())
}
