// src/newsletter.rs
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{NewsletterRequest, NewsletterSubscriber, valid_email};
use actix_web::{HttpResponse, post, web};
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(subscribe).service(unsubscribe);
}

#[post("/newsletter/subscribe")]
pub async fn subscribe(
    pool: web::Data<PgPool>,
    body: web::Json<NewsletterRequest>,
) -> ApiResult<HttpResponse> {
    let email = body.email.trim().to_string();
    if email.is_empty() {
        return Err(ApiError::Validation("Email is required".to_string()));
    }
    if !valid_email(&email) {
        return Err(ApiError::Validation("Invalid email address".to_string()));
    }

    if let Some(existing) = db::get_newsletter_subscriber(&pool, &email).await? {
        if !existing.is_active {
            db::reactivate_newsletter_subscriber(&pool, existing.id, Utc::now()).await?;
        }
        return Ok(HttpResponse::Ok().json(json!({
            "message": "Email already subscribed or reactivated",
            "email": existing.email,
        })));
    }

    let subscriber = NewsletterSubscriber {
        id: Uuid::new_v4(),
        email,
        is_active: true,
        subscribed_at: Utc::now(),
        unsubscribed_at: None,
    };
    db::insert_newsletter_subscriber(&pool, &subscriber).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "Successfully subscribed to newsletter",
        "email": subscriber.email,
    })))
}

#[post("/newsletter/unsubscribe")]
pub async fn unsubscribe(
    pool: web::Data<PgPool>,
    body: web::Json<NewsletterRequest>,
) -> ApiResult<HttpResponse> {
    let email = body.email.trim();
    if email.is_empty() {
        return Err(ApiError::Validation("Email is required".to_string()));
    }

    // A second unsubscribe and an unknown address answer the same way, so
    // the endpoint does not leak which addresses are on the list.
    match db::get_newsletter_subscriber(&pool, email).await? {
        Some(existing) if existing.is_active => {
            db::deactivate_newsletter_subscriber(&pool, existing.id, Utc::now()).await?;
            Ok(HttpResponse::Ok().json(json!({
                "message": "Successfully unsubscribed from newsletter",
            })))
        }
        _ => Ok(HttpResponse::NotFound().json(json!({
            "error": "Email not found or already unsubscribed",
        }))),
    }
}
