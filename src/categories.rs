// src/categories.rs
use crate::auth;
use crate::config::Config;
use crate::db::{self, SlugTable};
use crate::error::{ApiError, ApiResult};
use crate::models::{Category, CreateCategoryRequest};
use actix_web::{HttpRequest, HttpResponse, get, post, web};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

const DEFAULT_COLOR: &str = "#3b82f6";

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_categories)
        .service(create_category)
        .service(category_detail);
}

#[get("/categories")]
pub async fn list_categories(pool: web::Data<PgPool>) -> ApiResult<HttpResponse> {
    let categories = db::list_categories(&pool).await?;
    Ok(HttpResponse::Ok().json(categories))
}

#[get("/categories/{slug}")]
pub async fn category_detail(
    pool: web::Data<PgPool>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let category = db::get_category_by_slug(&pool, &path.into_inner())
        .await?
        .ok_or(ApiError::NotFound("Category"))?;
    Ok(HttpResponse::Ok().json(category))
}

#[post("/categories")]
pub async fn create_category(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    req: HttpRequest,
    body: web::Json<CreateCategoryRequest>,
) -> ApiResult<HttpResponse> {
    let user = auth::require_user(&req, &config, &pool).await?;
    auth::require_admin(&user)?;
    let body = body.into_inner();
    if body.name.trim().is_empty() {
        return Err(ApiError::Validation("name must not be empty".to_string()));
    }
    if db::category_name_exists(&pool, &body.name).await? {
        return Err(ApiError::Conflict("Category"));
    }

    let category = Category {
        id: Uuid::new_v4(),
        slug: db::unique_slug(&pool, SlugTable::Categories, &body.name).await?,
        name: body.name,
        description: body.description,
        color: body.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
        article_count: 0,
        sort_order: body.sort_order,
        is_active: true,
        created_at: Utc::now(),
    };
    db::insert_category(&pool, &category).await?;
    Ok(HttpResponse::Created().json(category))
}
