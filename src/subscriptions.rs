// src/subscriptions.rs
use crate::auth;
use crate::config::Config;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::mailer::Mailer;
use crate::models::{
    CreatePlanRequest, RenewRequest, SubscribeRequest, Subscription, SubscriptionPlan,
    SubscriptionStatus, User, UserRole,
};
use actix_web::{HttpRequest, HttpResponse, get, post, web};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_plans);
    cfg.service(create_plan);
    cfg.service(my_subscriptions);
    cfg.service(subscribe);
    cfg.service(sweep_expired);
    cfg.service(activate_subscription);
    cfg.service(cancel_subscription);
    cfg.service(renew_subscription);
}

// ---------------------------------------------------------------------------
// lifecycle core
//
// The stored status is a state machine (pending -> active -> expired or
// cancelled); what callers observe is always the effective status, which
// re-checks the end date. Every transition below mutates the subscription row
// and the owner's denormalized snapshot together, and the async wrappers
// persist both inside one transaction.

/// A stored `active` is only trusted while the end date has not passed.
pub fn effective_status(subscription: &Subscription, now: DateTime<Utc>) -> SubscriptionStatus {
    match subscription.status {
        SubscriptionStatus::Active if subscription.end_date < now => SubscriptionStatus::Expired,
        status => status,
    }
}

pub fn apply_activation(subscription: &mut Subscription, owner: &mut User) {
    subscription.status = SubscriptionStatus::Active;
    owner.is_subscribed = true;
    owner.subscription_start = Some(subscription.start_date);
    owner.subscription_end = Some(subscription.end_date);
}

/// Cancellation ends access immediately rather than at the period end.
/// The snapshot start date is left alone for display purposes.
pub fn apply_cancellation(subscription: &mut Subscription, owner: &mut User, now: DateTime<Utc>) {
    subscription.status = SubscriptionStatus::Cancelled;
    owner.is_subscribed = false;
    owner.subscription_end = Some(now);
}

/// Renewal restarts the paid period from `now`, regardless of when the
/// previous period ended, and revives expired or cancelled subscriptions.
pub fn apply_renewal(
    subscription: &mut Subscription,
    owner: &mut User,
    days: i64,
    now: DateTime<Utc>,
) {
    subscription.status = SubscriptionStatus::Active;
    subscription.end_date = now + Duration::days(days);
    owner.is_subscribed = true;
    owner.subscription_start = Some(subscription.start_date);
    owner.subscription_end = Some(subscription.end_date);
}

/// Longest accepted subscription period, one century in days. Day counts
/// are bounded before any date arithmetic runs: `chrono::Duration::days`
/// panics from roughly 106 million days up.
pub const MAX_SUBSCRIPTION_DAYS: i64 = 36_500;

/// An explicit duration wins over the plan duration. A subscription whose
/// plan is gone (deleted plan, NULL plan_id) cannot be renewed without one.
/// Day counts outside `1..=MAX_SUBSCRIPTION_DAYS` are rejected.
pub fn renewal_days(requested: Option<i64>, plan_duration: Option<i64>) -> ApiResult<i64> {
    match requested.or(plan_duration) {
        Some(days) if days > MAX_SUBSCRIPTION_DAYS => Err(ApiError::Validation(format!(
            "days must not exceed {MAX_SUBSCRIPTION_DAYS}"
        ))),
        Some(days) if days > 0 => Ok(days),
        Some(_) => Err(ApiError::Validation(
            "days must be a positive number".to_string(),
        )),
        None => Err(ApiError::NoPlan),
    }
}

fn payment_reference(user_id: Uuid, now: DateTime<Utc>) -> String {
    format!("MANUAL_{}_{}", user_id, now.timestamp())
}

pub async fn purchase(
    pool: &PgPool,
    user: &User,
    plan_id: Uuid,
    auto_renew: bool,
) -> ApiResult<(Subscription, SubscriptionPlan)> {
    let plan = db::get_active_plan(pool, plan_id)
        .await?
        .ok_or(ApiError::InvalidPlan)?;
    let now = Utc::now();
    let mut subscription = Subscription {
        id: Uuid::new_v4(),
        user_id: user.id,
        plan_id: Some(plan.id),
        status: SubscriptionStatus::Pending,
        start_date: now,
        end_date: now + Duration::days(i64::from(plan.duration_days)),
        auto_renew,
        payment_reference: payment_reference(user.id, now),
        created_at: now,
        updated_at: now,
    };
    // No payment gateway is wired in, so the purchase activates on the spot.
    let mut owner = user.clone();
    apply_activation(&mut subscription, &mut owner);

    let mut tx = pool.begin().await?;
    db::insert_subscription(&mut *tx, &subscription).await?;
    db::set_user_snapshot(
        &mut *tx,
        owner.id,
        subscription.start_date,
        subscription.end_date,
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        user_id = %user.id,
        plan = %plan.name,
        end_date = %subscription.end_date,
        "subscription purchased"
    );
    Ok((subscription, plan))
}

pub async fn activate(pool: &PgPool, mut subscription: Subscription) -> ApiResult<Subscription> {
    let mut owner = db::get_user_by_id(pool, subscription.user_id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    apply_activation(&mut subscription, &mut owner);

    let mut tx = pool.begin().await?;
    db::set_subscription_status(&mut *tx, subscription.id, SubscriptionStatus::Active).await?;
    db::set_user_snapshot(
        &mut *tx,
        owner.id,
        subscription.start_date,
        subscription.end_date,
    )
    .await?;
    tx.commit().await?;
    Ok(subscription)
}

pub async fn cancel(pool: &PgPool, mut subscription: Subscription) -> ApiResult<Subscription> {
    let mut owner = db::get_user_by_id(pool, subscription.user_id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    let now = Utc::now();
    apply_cancellation(&mut subscription, &mut owner, now);

    let mut tx = pool.begin().await?;
    db::set_subscription_status(&mut *tx, subscription.id, SubscriptionStatus::Cancelled).await?;
    db::clear_user_snapshot(&mut *tx, owner.id, now).await?;
    tx.commit().await?;

    tracing::info!(user_id = %owner.id, subscription_id = %subscription.id, "subscription cancelled");
    Ok(subscription)
}

pub async fn renew(
    pool: &PgPool,
    mut subscription: Subscription,
    requested_days: Option<i64>,
) -> ApiResult<Subscription> {
    let plan_duration = match subscription.plan_id {
        Some(plan_id) => db::get_plan(pool, plan_id)
            .await?
            .map(|plan| i64::from(plan.duration_days)),
        None => None,
    };
    let days = renewal_days(requested_days, plan_duration)?;
    let mut owner = db::get_user_by_id(pool, subscription.user_id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    let now = Utc::now();
    apply_renewal(&mut subscription, &mut owner, days, now);

    let mut tx = pool.begin().await?;
    db::renew_subscription_row(&mut *tx, subscription.id, subscription.end_date).await?;
    db::set_user_snapshot(
        &mut *tx,
        owner.id,
        subscription.start_date,
        subscription.end_date,
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        user_id = %owner.id,
        subscription_id = %subscription.id,
        end_date = %subscription.end_date,
        "subscription renewed"
    );
    Ok(subscription)
}

/// Flips overdue `active` rows to `expired` and drops the matching user
/// snapshots. Readers never see the lag because access checks re-verify the
/// end date, so this sweep is bookkeeping, not enforcement.
pub async fn mark_expired(pool: &PgPool) -> ApiResult<u64> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;
    let user_ids = db::expire_due_subscriptions(&mut *tx, now).await?;
    if !user_ids.is_empty() {
        db::clear_expired_snapshots(&mut *tx, &user_ids, now).await?;
    }
    tx.commit().await?;

    let expired = user_ids.len() as u64;
    if expired > 0 {
        tracing::info!(count = expired, "marked overdue subscriptions expired");
    }
    Ok(expired)
}

// ---------------------------------------------------------------------------
// handlers

fn subscription_payload(subscription: &Subscription, now: DateTime<Utc>) -> serde_json::Value {
    let mut value = json!(subscription);
    value["effective_status"] = json!(effective_status(subscription, now));
    value
}

async fn load_owned_subscription(
    pool: &PgPool,
    subscription_id: Uuid,
    user: &User,
) -> ApiResult<Subscription> {
    let found = if user.role == UserRole::Admin {
        db::get_subscription(pool, subscription_id).await?
    } else {
        db::get_user_subscription(pool, subscription_id, user.id).await?
    };
    found.ok_or(ApiError::NotFound("Subscription"))
}

#[get("/subscription-plans")]
pub async fn list_plans(pool: web::Data<PgPool>) -> ApiResult<HttpResponse> {
    let plans = db::list_active_plans(&pool).await?;
    Ok(HttpResponse::Ok().json(plans))
}

#[post("/subscription-plans")]
pub async fn create_plan(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    req: HttpRequest,
    body: web::Json<CreatePlanRequest>,
) -> ApiResult<HttpResponse> {
    let user = auth::require_user(&req, &config, &pool).await?;
    auth::require_admin(&user)?;
    let body = body.into_inner();
    if body.duration_days <= 0 {
        return Err(ApiError::Validation(
            "duration_days must be positive".to_string(),
        ));
    }
    if i64::from(body.duration_days) > MAX_SUBSCRIPTION_DAYS {
        return Err(ApiError::Validation(format!(
            "duration_days must not exceed {MAX_SUBSCRIPTION_DAYS}"
        )));
    }
    if body.price_cents < 0 {
        return Err(ApiError::Validation(
            "price_cents must not be negative".to_string(),
        ));
    }
    let plan = SubscriptionPlan {
        id: Uuid::new_v4(),
        name: body.name,
        kind: body.kind,
        price_cents: body.price_cents,
        duration_days: body.duration_days,
        description: body.description,
        features: body.features,
        includes_email_notifications: body.includes_email_notifications,
        includes_newsletter: body.includes_newsletter,
        is_active: true,
        created_at: Utc::now(),
    };
    db::create_plan(&pool, &plan).await?;
    Ok(HttpResponse::Created().json(plan))
}

#[get("/subscriptions")]
pub async fn my_subscriptions(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    let user = auth::require_user(&req, &config, &pool).await?;
    let subscriptions = db::list_user_subscriptions(&pool, user.id).await?;
    let now = Utc::now();
    let payload: Vec<_> = subscriptions
        .iter()
        .map(|subscription| subscription_payload(subscription, now))
        .collect();
    Ok(HttpResponse::Ok().json(payload))
}

#[post("/subscriptions")]
pub async fn subscribe(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    mailer: web::Data<Mailer>,
    req: HttpRequest,
    body: web::Json<SubscribeRequest>,
) -> ApiResult<HttpResponse> {
    let user = auth::require_user(&req, &config, &pool).await?;
    let (subscription, plan) = purchase(&pool, &user, body.plan_id, body.auto_renew).await?;

    // Delivery failures only get logged; the purchase already committed.
    let mailer = mailer.clone();
    let recipient = user.clone();
    let plan_name = plan.name.clone();
    let end_date = subscription.end_date;
    tokio::spawn(async move {
        mailer
            .send_subscription_activated(&recipient, &plan_name, end_date)
            .await;
    });

    Ok(HttpResponse::Created().json(json!({
        "message": format!("Successfully subscribed to {}", plan.name),
        "subscription": subscription_payload(&subscription, Utc::now()),
    })))
}

#[post("/subscriptions/sweep-expired")]
pub async fn sweep_expired(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    let user = auth::require_user(&req, &config, &pool).await?;
    auth::require_staff(&user)?;
    let expired = mark_expired(&pool).await?;
    Ok(HttpResponse::Ok().json(json!({ "expired": expired })))
}

#[post("/subscriptions/{id}/activate")]
pub async fn activate_subscription(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let user = auth::require_user(&req, &config, &pool).await?;
    auth::require_admin(&user)?;
    let subscription = db::get_subscription(&pool, path.into_inner())
        .await?
        .ok_or(ApiError::NotFound("Subscription"))?;
    let subscription = activate(&pool, subscription).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Subscription activated",
        "subscription": subscription_payload(&subscription, Utc::now()),
    })))
}

#[post("/subscriptions/{id}/cancel")]
pub async fn cancel_subscription(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let user = auth::require_user(&req, &config, &pool).await?;
    let subscription = load_owned_subscription(&pool, path.into_inner(), &user).await?;
    let subscription = cancel(&pool, subscription).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Subscription cancelled",
        "subscription": subscription_payload(&subscription, Utc::now()),
    })))
}

#[post("/subscriptions/{id}/renew")]
pub async fn renew_subscription(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<RenewRequest>,
) -> ApiResult<HttpResponse> {
    let user = auth::require_user(&req, &config, &pool).await?;
    let subscription = load_owned_subscription(&pool, path.into_inner(), &user).await?;
    let subscription = renew(&pool, subscription, body.days).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Subscription renewed",
        "subscription": subscription_payload(&subscription, Utc::now()),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_subscription(status: SubscriptionStatus, ends_in_days: i64) -> Subscription {
        let now = Utc::now();
        Subscription {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            plan_id: Some(Uuid::new_v4()),
            status,
            start_date: now - Duration::days(30),
            end_date: now + Duration::days(ends_in_days),
            auto_renew: false,
            payment_reference: "MANUAL_test_0".to_string(),
            created_at: now - Duration::days(30),
            updated_at: now - Duration::days(30),
        }
    }

    fn sample_owner() -> User {
        User {
            id: Uuid::new_v4(),
            username: "owner".to_string(),
            email: "owner@example.com".to_string(),
            password_hash: "x".to_string(),
            role: UserRole::Subscriber,
            is_subscribed: false,
            subscription_start: None,
            subscription_end: None,
            email_notifications: true,
            newsletter_opt_in: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn effective_status_trusts_active_within_period() {
        let subscription = sample_subscription(SubscriptionStatus::Active, 5);
        assert_eq!(
            effective_status(&subscription, Utc::now()),
            SubscriptionStatus::Active
        );
    }

    #[test]
    fn effective_status_derives_expired_past_end_date() {
        let subscription = sample_subscription(SubscriptionStatus::Active, -1);
        assert_eq!(
            effective_status(&subscription, Utc::now()),
            SubscriptionStatus::Expired
        );
    }

    #[test]
    fn effective_status_never_resurrects_terminal_states() {
        // A cancelled subscription with a future end date stays cancelled,
        // and pending rows never look expired.
        let cancelled = sample_subscription(SubscriptionStatus::Cancelled, 5);
        assert_eq!(
            effective_status(&cancelled, Utc::now()),
            SubscriptionStatus::Cancelled
        );
        let pending = sample_subscription(SubscriptionStatus::Pending, -5);
        assert_eq!(
            effective_status(&pending, Utc::now()),
            SubscriptionStatus::Pending
        );
    }

    #[test]
    fn activation_syncs_snapshot_with_subscription_dates() {
        let mut subscription = sample_subscription(SubscriptionStatus::Pending, 30);
        let mut owner = sample_owner();
        apply_activation(&mut subscription, &mut owner);
        assert_eq!(subscription.status, SubscriptionStatus::Active);
        assert!(owner.is_subscribed);
        assert_eq!(owner.subscription_start, Some(subscription.start_date));
        assert_eq!(owner.subscription_end, Some(subscription.end_date));
    }

    #[test]
    fn activation_twice_yields_the_same_state() {
        let mut subscription = sample_subscription(SubscriptionStatus::Pending, 30);
        let mut owner = sample_owner();
        apply_activation(&mut subscription, &mut owner);
        let end_after_first = subscription.end_date;
        apply_activation(&mut subscription, &mut owner);
        assert_eq!(subscription.status, SubscriptionStatus::Active);
        assert_eq!(subscription.end_date, end_after_first);
        assert_eq!(owner.subscription_end, Some(end_after_first));
    }

    #[test]
    fn cancellation_ends_access_now() {
        let mut subscription = sample_subscription(SubscriptionStatus::Active, 30);
        let mut owner = sample_owner();
        apply_activation(&mut subscription, &mut owner);
        let start_before = owner.subscription_start;

        let now = Utc::now();
        apply_cancellation(&mut subscription, &mut owner, now);
        assert_eq!(subscription.status, SubscriptionStatus::Cancelled);
        assert!(!owner.is_subscribed);
        assert_eq!(owner.subscription_end, Some(now));
        assert_eq!(owner.subscription_start, start_before);
    }

    #[test]
    fn cancellation_is_idempotent() {
        let mut subscription = sample_subscription(SubscriptionStatus::Cancelled, -10);
        let mut owner = sample_owner();
        let now = Utc::now();
        apply_cancellation(&mut subscription, &mut owner, now);
        apply_cancellation(&mut subscription, &mut owner, now);
        assert_eq!(subscription.status, SubscriptionStatus::Cancelled);
        assert!(!owner.is_subscribed);
    }

    #[test]
    fn renewal_restarts_period_from_now() {
        let mut subscription = sample_subscription(SubscriptionStatus::Expired, -10);
        let mut owner = sample_owner();
        let now = Utc::now();
        apply_renewal(&mut subscription, &mut owner, 30, now);
        assert_eq!(subscription.status, SubscriptionStatus::Active);
        assert_eq!(subscription.end_date, now + Duration::days(30));
        assert!(owner.is_subscribed);
        assert_eq!(owner.subscription_end, Some(subscription.end_date));
        assert_eq!(owner.subscription_start, Some(subscription.start_date));
    }

    #[test]
    fn renewal_days_prefers_explicit_request() {
        assert_eq!(renewal_days(Some(7), Some(30)).unwrap(), 7);
        assert_eq!(renewal_days(None, Some(30)).unwrap(), 30);
    }

    #[test]
    fn renewal_days_without_plan_fails() {
        assert!(matches!(renewal_days(None, None), Err(ApiError::NoPlan)));
    }

    #[test]
    fn renewal_days_rejects_non_positive() {
        assert!(matches!(
            renewal_days(Some(0), None),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            renewal_days(Some(-3), Some(30)),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn renewal_days_caps_absurd_durations() {
        // Day counts past the cap must fail validation instead of reaching
        // the date arithmetic, which panics on values that large.
        assert!(matches!(
            renewal_days(Some(i64::MAX), None),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            renewal_days(Some(MAX_SUBSCRIPTION_DAYS + 1), Some(30)),
            Err(ApiError::Validation(_))
        ));
        assert_eq!(
            renewal_days(Some(MAX_SUBSCRIPTION_DAYS), None).unwrap(),
            MAX_SUBSCRIPTION_DAYS
        );
    }

    #[test]
    fn renewal_at_the_cap_stays_in_range() {
        let mut subscription = sample_subscription(SubscriptionStatus::Expired, -10);
        let mut owner = sample_owner();
        let now = Utc::now();
        let days = renewal_days(Some(MAX_SUBSCRIPTION_DAYS), None).unwrap();
        apply_renewal(&mut subscription, &mut owner, days, now);
        assert_eq!(
            subscription.end_date,
            now + Duration::days(MAX_SUBSCRIPTION_DAYS)
        );
    }

    #[test]
    fn payment_reference_embeds_user_and_timestamp() {
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let reference = payment_reference(user_id, now);
        assert!(reference.starts_with("MANUAL_"));
        assert!(reference.contains(&user_id.to_string()));
    }
}
