// src/videos.rs
use crate::auth;
use crate::config::Config;
use crate::db::{self, SlugTable};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    CreateVideoRequest, LimitQuery, Video, VideoListQuery, clamp_limit, limit_offset,
};
use crate::view_count::{self, MemoryDedupStore};
use actix_web::{HttpRequest, HttpResponse, get, post, web};
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_videos)
        .service(featured_videos)
        .service(create_video)
        .service(video_detail);
}

#[get("/videos")]
pub async fn list_videos(
    pool: web::Data<PgPool>,
    query: web::Query<VideoListQuery>,
) -> ApiResult<HttpResponse> {
    let videos = db::list_videos(&pool, &query).await?;
    let (limit, offset) = limit_offset(query.page, query.page_size);
    Ok(HttpResponse::Ok().json(json!({
        "page": offset / limit + 1,
        "page_size": limit,
        "results": videos,
    })))
}

#[get("/videos/featured")]
pub async fn featured_videos(
    pool: web::Data<PgPool>,
    query: web::Query<LimitQuery>,
) -> ApiResult<HttpResponse> {
    let limit = clamp_limit(query.limit, 6, 20);
    let videos = db::featured_videos(&pool, limit).await?;
    Ok(HttpResponse::Ok().json(videos))
}

// Video bodies are not subscription-gated; only the view counter cares who
// is asking, to skip the author's own visits.
#[get("/videos/{slug}")]
pub async fn video_detail(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    dedup: web::Data<MemoryDedupStore>,
    req: HttpRequest,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let slug = path.into_inner();
    let viewer = auth::current_user(&req, &config, &pool).await?;
    let video = db::get_active_video_by_slug(&pool, &slug)
        .await?
        .ok_or(ApiError::NotFound("Video"))?;

    let fingerprint = view_count::client_fingerprint(&req);
    view_count::record_video_view(&pool, dedup.get_ref(), &slug, viewer.as_ref(), fingerprint)
        .await;

    let mut payload = json!(video);
    if let Some(category_id) = video.category_id {
        if let Some(category) = db::get_category(&pool, category_id).await? {
            payload["category_name"] = json!(category.name);
            payload["category_slug"] = json!(category.slug);
        }
    }
    if let Some(author_id) = video.author_id {
        if let Some(author) = db::get_user_by_id(&pool, author_id).await? {
            payload["author_name"] = json!(author.username);
        }
    }
    Ok(HttpResponse::Ok().json(payload))
}

#[post("/videos")]
pub async fn create_video(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    req: HttpRequest,
    body: web::Json<CreateVideoRequest>,
) -> ApiResult<HttpResponse> {
    let user = auth::require_user(&req, &config, &pool).await?;
    auth::require_staff(&user)?;
    let body = body.into_inner();
    if body.title.trim().is_empty() {
        return Err(ApiError::Validation("title must not be empty".to_string()));
    }
    if body.video_url.trim().is_empty() {
        return Err(ApiError::Validation(
            "video_url must not be empty".to_string(),
        ));
    }
    if let Some(category_id) = body.category_id {
        if db::get_category(&pool, category_id).await?.is_none() {
            return Err(ApiError::Validation("unknown category".to_string()));
        }
    }

    let now = Utc::now();
    let video = Video {
        id: Uuid::new_v4(),
        slug: db::unique_slug(&pool, SlugTable::Videos, &body.title).await?,
        title: body.title,
        description: body.description,
        video_url: body.video_url,
        duration: body.duration.unwrap_or_else(|| "00:00".to_string()),
        category_id: body.category_id,
        author_id: Some(user.id),
        views_count: 0,
        is_featured: body.is_featured,
        is_active: true,
        published_at: now,
        updated_at: now,
    };
    db::insert_video(&pool, &video).await?;
    Ok(HttpResponse::Created().json(video))
}
