use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::error::ApiError;
use crate::models::blog::BlogRequest;
use crate::models::parse_object_id;
use crate::services::blog_service;
use crate::state::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/blogs")
            .route("", web::post().to(create_blog))
            .route("", web::get().to(list_blogs))
            .route("/{id}", web::get().to(get_blog))
            .route("/{id}", web::put().to(update_blog))
            .route("/{id}", web::delete().to(delete_blog)),
    );
}

pub async fn create_blog(
    state: web::Data<AppState>,
    body: web::Json<BlogRequest>,
) -> Result<HttpResponse, ApiError> {
    let blog =
        blog_service::create_blog(state.blogs.as_ref(), state.users.as_ref(), body.into_inner())
            .await?;
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Blog created successfully",
        "blog": blog,
    })))
}

pub async fn list_blogs(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let blogs = blog_service::list_blogs(state.blogs.as_ref(), state.users.as_ref()).await?;
    Ok(HttpResponse::Ok().json(blogs))
}

pub async fn get_blog(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_object_id(&path, "blog")?;
    let blog = blog_service::get_blog(state.blogs.as_ref(), state.users.as_ref(), id).await?;
    Ok(HttpResponse::Ok().json(blog))
}

pub async fn update_blog(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<BlogRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_object_id(&path, "blog")?;
    let blog = blog_service::update_blog(
        state.blogs.as_ref(),
        state.users.as_ref(),
        id,
        body.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Blog updated successfully",
        "blog": blog,
    })))
}

pub async fn delete_blog(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_object_id(&path, "blog")?;
    blog_service::delete_blog(state.blogs.as_ref(), id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Blog deleted successfully",
    })))
}
