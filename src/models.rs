// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Editor,
    Journalist,
    Subscriber,
}

impl UserRole {
    pub fn is_staff(self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Editor | UserRole::Journalist)
    }
}

#[derive(Serialize, Clone, Debug, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    // Denormalized subscription snapshot, written only by the lifecycle
    // operations in `subscriptions` alongside the subscription row itself.
    pub is_subscribed: bool,
    pub subscription_start: Option<DateTime<Utc>>,
    pub subscription_end: Option<DateTime<Utc>>,
    pub email_notifications: bool,
    pub newsletter_opt_in: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "plan_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlanKind {
    Free,
    Monthly,
    Quarterly,
    Yearly,
}

#[derive(Serialize, Clone, Debug, FromRow)]
pub struct SubscriptionPlan {
    pub id: Uuid,
    pub name: String,
    pub kind: PlanKind,
    pub price_cents: i64,
    pub duration_days: i32,
    pub description: String,
    pub features: Vec<String>,
    pub includes_email_notifications: bool,
    pub includes_newsletter: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Expired,
    Cancelled,
}

#[derive(Serialize, Clone, Debug, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    // NULL when the plan was deleted after purchase.
    pub plan_id: Option<Uuid>,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub auto_renew: bool,
    pub payment_reference: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Clone, Debug, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub color: String,
    pub article_count: i64,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "article_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Draft,
    Published,
}

#[derive(Serialize, Clone, Debug, FromRow)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub content: String,
    pub category_id: Uuid,
    pub author_id: Option<Uuid>,
    pub status: ArticleStatus,
    pub is_breaking: bool,
    pub is_featured: bool,
    pub views_count: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Clone, Debug, FromRow)]
pub struct Video {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub video_url: String,
    pub duration: String,
    pub category_id: Option<Uuid>,
    pub author_id: Option<Uuid>,
    pub views_count: i64,
    pub is_featured: bool,
    pub is_active: bool,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Clone, Debug, FromRow)]
pub struct BreakingNews {
    pub id: Uuid,
    pub text: String,
    pub urgent: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Clone, Debug, FromRow)]
pub struct NewsletterSubscriber {
    pub id: Uuid,
    pub email: String,
    pub is_active: bool,
    pub subscribed_at: DateTime<Utc>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Claims {
    pub sub: String, // user id
    pub exp: usize,
}

#[derive(Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub email_notifications: Option<bool>,
    pub newsletter_opt_in: Option<bool>,
}

#[derive(Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub plan_id: Uuid,
    #[serde(default)]
    pub auto_renew: bool,
}

#[derive(Serialize, Deserialize)]
pub struct RenewRequest {
    pub days: Option<i64>,
}

#[derive(Serialize, Deserialize)]
pub struct CreatePlanRequest {
    pub name: String,
    pub kind: PlanKind,
    pub price_cents: i64,
    pub duration_days: i32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default = "default_true")]
    pub includes_email_notifications: bool,
    #[serde(default = "default_true")]
    pub includes_newsletter: bool,
}

#[derive(Serialize, Deserialize)]
pub struct CreateArticleRequest {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub category_id: Uuid,
    pub status: Option<ArticleStatus>,
    #[serde(default)]
    pub is_breaking: bool,
    #[serde(default)]
    pub is_featured: bool,
}

#[derive(Serialize, Deserialize)]
pub struct CreateVideoRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub video_url: String,
    #[serde(default)]
    pub duration: Option<String>,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub is_featured: bool,
}

#[derive(Serialize, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub color: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Serialize, Deserialize)]
pub struct CreateBreakingRequest {
    pub text: String,
    #[serde(default = "default_true")]
    pub urgent: bool,
}

#[derive(Serialize, Deserialize)]
pub struct NewsletterRequest {
    pub email: String,
}

fn default_true() -> bool {
    true
}

// Query-string parameter sets. Kept flat because serde(flatten) does not
// mix with non-string primitives under actix's urlencoded deserializer.

#[derive(Debug, Deserialize)]
pub struct ArticleListQuery {
    pub category: Option<String>,
    pub is_featured: Option<bool>,
    pub is_breaking: Option<bool>,
    pub author: Option<Uuid>,
    pub ordering: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub category: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct VideoListQuery {
    pub category: Option<String>,
    pub is_featured: Option<bool>,
    pub ordering: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    pub days: Option<i64>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SweepQuery {
    pub hours: Option<i64>,
}

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

pub fn limit_offset(page: Option<u32>, page_size: Option<u32>) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let size = page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    (i64::from(size), i64::from(page - 1) * i64::from(size))
}

pub fn clamp_limit(limit: Option<u32>, default: u32, max: u32) -> i64 {
    i64::from(limit.unwrap_or(default).clamp(1, max))
}

/// Light-weight email shape check: one `@`, non-empty local part, and a
/// domain with a dot. Deliverability is the SMTP server's problem.
pub fn valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_offset_defaults_to_first_page() {
        assert_eq!(limit_offset(None, None), (10, 0));
    }

    #[test]
    fn limit_offset_caps_page_size() {
        assert_eq!(limit_offset(Some(3), Some(500)), (100, 200));
    }

    #[test]
    fn limit_offset_treats_page_zero_as_first() {
        assert_eq!(limit_offset(Some(0), Some(20)), (20, 0));
    }

    #[test]
    fn clamp_limit_enforces_bounds() {
        assert_eq!(clamp_limit(None, 5, 20), 5);
        assert_eq!(clamp_limit(Some(100), 5, 20), 20);
        assert_eq!(clamp_limit(Some(0), 5, 20), 1);
    }

    #[test]
    fn staff_roles() {
        assert!(UserRole::Admin.is_staff());
        assert!(UserRole::Editor.is_staff());
        assert!(UserRole::Journalist.is_staff());
        assert!(!UserRole::Subscriber.is_staff());
    }

    #[test]
    fn email_shape_check() {
        assert!(valid_email("reader@example.com"));
        assert!(valid_email("a.b+tag@news.example.co.uk"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("@example.com"));
        assert!(!valid_email("user@nodot"));
        assert!(!valid_email("user@.com"));
        assert!(!valid_email("user name@example.com"));
    }
}
