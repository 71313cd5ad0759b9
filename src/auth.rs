// src/auth.rs
use crate::access::{self, AccessLevel};
use crate::config::Config;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::mailer::Mailer;
use crate::models::{
    ChangePasswordRequest, Claims, LoginRequest, RegisterRequest, UpdateProfileRequest, User,
    UserRole, valid_email,
};
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, get, post, put, web};
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(register);
    cfg.service(login);
    cfg.service(me);
    cfg.service(update_me);
    cfg.service(change_password);
}

pub fn create_token(config: &Config, user_id: Uuid) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = Utc::now() + Duration::hours(config.token_ttl_hours);
    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_ref()),
    )
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Resolves the requesting user. No Authorization header means anonymous;
/// a header that does not decode to a live user is rejected outright.
pub async fn current_user(
    req: &HttpRequest,
    config: &Config,
    pool: &PgPool,
) -> ApiResult<Option<User>> {
    let Some(token) = bearer_token(req) else {
        return Ok(None);
    };
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_ref()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized)?;
    let user_id = Uuid::parse_str(&data.claims.sub).map_err(|_| ApiError::Unauthorized)?;
    let user = db::get_user_by_id(pool, user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(Some(user))
}

pub async fn require_user(req: &HttpRequest, config: &Config, pool: &PgPool) -> ApiResult<User> {
    current_user(req, config, pool)
        .await?
        .ok_or(ApiError::Unauthorized)
}

pub fn require_staff(user: &User) -> ApiResult<()> {
    if user.role.is_staff() {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

pub fn require_admin(user: &User) -> ApiResult<()> {
    if user.role == UserRole::Admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

#[post("/auth/register")]
pub async fn register(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    mailer: web::Data<Mailer>,
    body: web::Json<RegisterRequest>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    if body.username.trim().is_empty() {
        return Err(ApiError::Validation(
            "Username must not be empty".to_string(),
        ));
    }
    if !valid_email(&body.email) {
        return Err(ApiError::Validation(
            "Enter a valid email address".to_string(),
        ));
    }
    if body.password.chars().count() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    if db::get_user_by_username(&pool, &body.username)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("Username"));
    }
    if db::get_user_by_email(&pool, &body.email).await?.is_some() {
        return Err(ApiError::Conflict("Email"));
    }

    let password_hash = hash(&body.password, DEFAULT_COST)?;
    let user = User {
        id: Uuid::new_v4(),
        username: body.username,
        email: body.email,
        password_hash,
        role: UserRole::Subscriber,
        is_subscribed: false,
        subscription_start: None,
        subscription_end: None,
        email_notifications: true,
        newsletter_opt_in: true,
        created_at: Utc::now(),
    };
    db::create_user(&pool, &user).await?;
    let token = create_token(&config, user.id)?;

    let mailer = mailer.clone();
    let recipient = user.clone();
    tokio::spawn(async move {
        mailer.send_welcome(&recipient).await;
    });

    Ok(HttpResponse::Created().json(json!({
        "message": "User created successfully",
        "token": token,
        "user": user,
    })))
}

#[post("/auth/login")]
pub async fn login(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    body: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    let user = db::get_user_by_username(&pool, &body.username)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;
    // A malformed stored hash reads the same as a bad password.
    if !verify(&body.password, &user.password_hash).unwrap_or(false) {
        return Err(ApiError::InvalidCredentials);
    }
    let token = create_token(&config, user.id)?;
    Ok(HttpResponse::Ok().json(json!({
        "token": token,
        "user": user,
    })))
}

#[get("/auth/me")]
pub async fn me(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    let user = require_user(&req, &config, &pool).await?;
    let has_access = access::decide(Some(&user), Utc::now()) == AccessLevel::Full;
    let mut payload = json!(user);
    payload["has_active_subscription"] = json!(has_access);
    Ok(HttpResponse::Ok().json(payload))
}

#[put("/auth/me")]
pub async fn update_me(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    req: HttpRequest,
    body: web::Json<UpdateProfileRequest>,
) -> ApiResult<HttpResponse> {
    let user = require_user(&req, &config, &pool).await?;
    if let Some(email) = &body.email {
        if !valid_email(email) {
            return Err(ApiError::Validation(
                "Enter a valid email address".to_string(),
            ));
        }
        if email != &user.email && db::get_user_by_email(&pool, email).await?.is_some() {
            return Err(ApiError::Conflict("Email"));
        }
    }
    db::update_user_profile(
        &pool,
        user.id,
        body.email.as_deref(),
        body.email_notifications,
        body.newsletter_opt_in,
    )
    .await?;
    let updated = db::get_user_by_id(&pool, user.id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Profile updated",
        "user": updated,
    })))
}

#[post("/auth/change-password")]
pub async fn change_password(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    req: HttpRequest,
    body: web::Json<ChangePasswordRequest>,
) -> ApiResult<HttpResponse> {
    let user = require_user(&req, &config, &pool).await?;
    if !verify(&body.current_password, &user.password_hash).unwrap_or(false) {
        return Err(ApiError::InvalidCredentials);
    }
    if body.new_password.chars().count() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    let password_hash = hash(&body.new_password, DEFAULT_COST)?;
    db::update_user_password(&pool, user.id, &password_hash).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Password changed successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn test_config() -> Config {
        Config {
            database_url: String::new(),
            jwt_secret: "test-secret".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            token_ttl_hours: 24,
            site_name: "NewsDesk".to_string(),
            site_url: "http://localhost".to_string(),
            smtp_host: None,
            smtp_username: None,
            smtp_password: None,
            from_email: None,
        }
    }

    #[test]
    fn token_round_trips_through_decode() {
        let config = test_config();
        let user_id = Uuid::new_v4();
        let token = create_token(&config, user_id).unwrap();
        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(config.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(decoded.claims.sub, user_id.to_string());
    }

    #[test]
    fn token_rejects_wrong_secret() {
        let config = test_config();
        let token = create_token(&config, Uuid::new_v4()).unwrap();
        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"other-secret"),
            &Validation::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn bearer_token_parses_authorization_header() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer abc.def.ghi"))
            .to_http_request();
        assert_eq!(bearer_token(&req), Some("abc.def.ghi"));
    }

    #[test]
    fn bearer_token_ignores_other_schemes() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Basic dXNlcjpwYXNz"))
            .to_http_request();
        assert_eq!(bearer_token(&req), None);
        let bare = TestRequest::default().to_http_request();
        assert_eq!(bearer_token(&bare), None);
    }
}
