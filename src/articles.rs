// src/articles.rs
use crate::access::{self, AccessLevel, PREVIEW_MESSAGE};
use crate::auth;
use crate::config::Config;
use crate::db::{self, SlugTable};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    Article, ArticleListQuery, ArticleStatus, CreateArticleRequest, LimitQuery, SearchQuery,
    TrendingQuery, clamp_limit, limit_offset,
};
use crate::view_count::{self, MemoryDedupStore};
use actix_web::{HttpRequest, HttpResponse, get, post, web};
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    // Fixed paths first; the {slug} route would shadow them otherwise.
    cfg.service(list_articles)
        .service(trending_articles)
        .service(featured_articles)
        .service(search_articles)
        .service(create_article)
        .service(publish_article)
        .service(article_detail);
}

/// Estimated reading time in minutes, at 200 words per minute.
pub fn read_time_minutes(content: &str) -> i64 {
    let words = content.split_whitespace().count();
    ((words as f64 / 200.0).round() as i64).max(1)
}

/// Trending window in days, bounded to the past year. Left unbounded the
/// value would reach `chrono::Duration::days`, which panics on huge inputs.
fn trending_window(days: Option<i64>) -> i64 {
    days.unwrap_or(7).clamp(1, 365)
}

/// Article payload for the detail endpoint: the row itself plus category and
/// author labels, read time, and the access flags. A `Preview` decision
/// replaces the body with the redacted excerpt; the full row was still read,
/// redaction is strictly a response-shaping step.
async fn detail_payload(
    pool: &PgPool,
    article: &Article,
    level: AccessLevel,
) -> ApiResult<serde_json::Value> {
    let mut payload = json!(article);
    if let Some(category) = db::get_category(pool, article.category_id).await? {
        payload["category_name"] = json!(category.name);
        payload["category_slug"] = json!(category.slug);
    }
    if let Some(author_id) = article.author_id {
        if let Some(author) = db::get_user_by_id(pool, author_id).await? {
            payload["author_name"] = json!(author.username);
        }
    }
    payload["read_time"] = json!(read_time_minutes(&article.content));
    match level {
        AccessLevel::Full => {
            payload["is_preview"] = json!(false);
            payload["requires_subscription"] = json!(false);
        }
        AccessLevel::Preview if !article.content.is_empty() => {
            payload["content"] = json!(access::preview_excerpt(&article.content));
            payload["is_preview"] = json!(true);
            payload["requires_subscription"] = json!(true);
            payload["message"] = json!(PREVIEW_MESSAGE);
        }
        AccessLevel::Preview => {}
    }
    Ok(payload)
}

#[get("/articles")]
pub async fn list_articles(
    pool: web::Data<PgPool>,
    query: web::Query<ArticleListQuery>,
) -> ApiResult<HttpResponse> {
    let articles = db::list_published_articles(&pool, &query).await?;
    let (limit, offset) = limit_offset(query.page, query.page_size);
    Ok(HttpResponse::Ok().json(json!({
        "page": offset / limit + 1,
        "page_size": limit,
        "results": articles,
    })))
}

#[get("/articles/trending")]
pub async fn trending_articles(
    pool: web::Data<PgPool>,
    query: web::Query<TrendingQuery>,
) -> ApiResult<HttpResponse> {
    let days = trending_window(query.days);
    let limit = clamp_limit(query.limit, 10, 50);
    let articles = db::trending_articles(&pool, days, limit).await?;
    Ok(HttpResponse::Ok().json(articles))
}

#[get("/articles/featured")]
pub async fn featured_articles(
    pool: web::Data<PgPool>,
    query: web::Query<LimitQuery>,
) -> ApiResult<HttpResponse> {
    let limit = clamp_limit(query.limit, 5, 20);
    let articles = db::featured_articles(&pool, limit).await?;
    Ok(HttpResponse::Ok().json(articles))
}

#[get("/articles/search")]
pub async fn search_articles(
    pool: web::Data<PgPool>,
    query: web::Query<SearchQuery>,
) -> ApiResult<HttpResponse> {
    let (limit, offset) = limit_offset(query.page, query.page_size);
    let results = if query.q.trim().is_empty() {
        Vec::new()
    } else {
        db::search_articles(&pool, &query).await?
    };
    Ok(HttpResponse::Ok().json(json!({
        "page": offset / limit + 1,
        "page_size": limit,
        "results": results,
    })))
}

#[get("/articles/{slug}")]
pub async fn article_detail(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    dedup: web::Data<MemoryDedupStore>,
    req: HttpRequest,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let slug = path.into_inner();
    let viewer = auth::current_user(&req, &config, &pool).await?;
    let article = db::get_published_article_by_slug(&pool, &slug)
        .await?
        .ok_or(ApiError::NotFound("Article"))?;

    // Counting happens for every reader, preview or full.
    let fingerprint = view_count::client_fingerprint(&req);
    view_count::record_article_view(&pool, dedup.get_ref(), &slug, viewer.as_ref(), fingerprint)
        .await;

    let level = access::decide(viewer.as_ref(), Utc::now());
    let payload = detail_payload(&pool, &article, level).await?;
    Ok(HttpResponse::Ok().json(payload))
}

#[post("/articles")]
pub async fn create_article(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    req: HttpRequest,
    body: web::Json<CreateArticleRequest>,
) -> ApiResult<HttpResponse> {
    let user = auth::require_user(&req, &config, &pool).await?;
    auth::require_staff(&user)?;
    let body = body.into_inner();
    if body.title.trim().is_empty() {
        return Err(ApiError::Validation("title must not be empty".to_string()));
    }
    if db::get_category(&pool, body.category_id).await?.is_none() {
        return Err(ApiError::Validation("unknown category".to_string()));
    }

    let status = body.status.unwrap_or(ArticleStatus::Draft);
    let now = Utc::now();
    let article = Article {
        id: Uuid::new_v4(),
        slug: db::unique_slug(&pool, SlugTable::Articles, &body.title).await?,
        title: body.title,
        summary: body.summary,
        content: body.content,
        category_id: body.category_id,
        author_id: Some(user.id),
        status,
        is_breaking: body.is_breaking,
        is_featured: body.is_featured,
        views_count: 0,
        published_at: (status == ArticleStatus::Published).then_some(now),
        created_at: now,
        updated_at: now,
    };
    db::insert_article(&pool, &article).await?;
    if article.status == ArticleStatus::Published {
        db::recompute_category_count(&pool, article.category_id).await?;
    }
    Ok(HttpResponse::Created().json(article))
}

#[post("/articles/{slug}/publish")]
pub async fn publish_article(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    req: HttpRequest,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let user = auth::require_user(&req, &config, &pool).await?;
    auth::require_staff(&user)?;
    let article = db::publish_article(&pool, &path.into_inner())
        .await?
        .ok_or(ApiError::NotFound("Article"))?;
    db::recompute_category_count(&pool, article.category_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Article published",
        "article": article,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_time_has_a_floor_of_one_minute() {
        assert_eq!(read_time_minutes(""), 1);
        assert_eq!(read_time_minutes("a few words only"), 1);
    }

    #[test]
    fn read_time_rounds_word_count() {
        let three_hundred: String = vec!["word"; 300].join(" ");
        assert_eq!(read_time_minutes(&three_hundred), 2);
        let thousand: String = vec!["word"; 1000].join(" ");
        assert_eq!(read_time_minutes(&thousand), 5);
    }

    #[test]
    fn trending_window_clamps_both_ends() {
        assert_eq!(trending_window(None), 7);
        assert_eq!(trending_window(Some(0)), 1);
        assert_eq!(trending_window(Some(-30)), 1);
        assert_eq!(trending_window(Some(i64::MAX)), 365);
    }
}
