// src/breaking.rs
use crate::auth;
use crate::config::Config;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{BreakingNews, CreateBreakingRequest, SweepQuery};
use actix_web::{HttpRequest, HttpResponse, get, post, web};
use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_breaking)
        .service(create_breaking)
        .service(sweep_breaking);
}

#[get("/breaking-news")]
pub async fn list_breaking(pool: web::Data<PgPool>) -> ApiResult<HttpResponse> {
    let items = db::list_active_breaking(&pool).await?;
    Ok(HttpResponse::Ok().json(items))
}

#[post("/breaking-news")]
pub async fn create_breaking(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    req: HttpRequest,
    body: web::Json<CreateBreakingRequest>,
) -> ApiResult<HttpResponse> {
    let user = auth::require_user(&req, &config, &pool).await?;
    auth::require_staff(&user)?;
    let body = body.into_inner();
    if body.text.trim().is_empty() {
        return Err(ApiError::Validation("text must not be empty".to_string()));
    }

    let item = BreakingNews {
        id: Uuid::new_v4(),
        text: body.text,
        urgent: body.urgent,
        is_active: true,
        created_at: Utc::now(),
    };
    db::insert_breaking(&pool, &item).await?;
    Ok(HttpResponse::Created().json(item))
}

/// Sweep window in hours, bounded to a year. Left unbounded the value would
/// reach `chrono::Duration::hours`, which panics on huge inputs.
fn sweep_window(hours: Option<i64>) -> i64 {
    hours.unwrap_or(24).clamp(1, 24 * 365)
}

// Tickers go stale on their own; this retires everything older than the
// given window (default one day) in a single pass.
#[post("/breaking-news/sweep")]
pub async fn sweep_breaking(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    req: HttpRequest,
    query: web::Query<SweepQuery>,
) -> ApiResult<HttpResponse> {
    let user = auth::require_user(&req, &config, &pool).await?;
    auth::require_staff(&user)?;
    let hours = sweep_window(query.hours);
    let cutoff = Utc::now() - Duration::hours(hours);
    let deactivated = db::deactivate_breaking_before(&pool, cutoff).await?;
    Ok(HttpResponse::Ok().json(json!({ "deactivated": deactivated })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_window_clamps_both_ends() {
        assert_eq!(sweep_window(None), 24);
        assert_eq!(sweep_window(Some(0)), 1);
        assert_eq!(sweep_window(Some(-6)), 1);
        assert_eq!(sweep_window(Some(i64::MAX)), 24 * 365);
    }
}
