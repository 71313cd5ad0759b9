// src/db.rs
use crate::models::{
    Article, ArticleListQuery, BreakingNews, Category, NewsletterSubscriber, SearchQuery,
    Subscription, SubscriptionPlan, SubscriptionStatus, User, Video, VideoListQuery, limit_offset,
};
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// users

pub async fn get_user_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, email, password_hash, role, is_subscribed, subscription_start, \
         subscription_end, email_notifications, newsletter_opt_in, created_at \
         FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_user_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, email, password_hash, role, is_subscribed, subscription_start, \
         subscription_end, email_notifications, newsletter_opt_in, created_at \
         FROM users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await
}

pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, email, password_hash, role, is_subscribed, subscription_start, \
         subscription_end, email_notifications, newsletter_opt_in, created_at \
         FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn create_user(pool: &PgPool, user: &User) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (id, username, email, password_hash, role, is_subscribed, \
         subscription_start, subscription_end, email_notifications, newsletter_opt_in, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(user.id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role)
    .bind(user.is_subscribed)
    .bind(user.subscription_start)
    .bind(user.subscription_end)
    .bind(user.email_notifications)
    .bind(user.newsletter_opt_in)
    .bind(user.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_user_profile(
    pool: &PgPool,
    user_id: Uuid,
    email: Option<&str>,
    email_notifications: Option<bool>,
    newsletter_opt_in: Option<bool>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET email = COALESCE($2, email), \
         email_notifications = COALESCE($3, email_notifications), \
         newsletter_opt_in = COALESCE($4, newsletter_opt_in) \
         WHERE id = $1",
    )
    .bind(user_id)
    .bind(email)
    .bind(email_notifications)
    .bind(newsletter_opt_in)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_user_password(
    pool: &PgPool,
    user_id: Uuid,
    password_hash: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
        .bind(user_id)
        .bind(password_hash)
        .execute(pool)
        .await?;
    Ok(())
}

// Snapshot writers run inside the same transaction as the subscription row
// they mirror, hence the connection parameter.

pub async fn set_user_snapshot(
    conn: &mut PgConnection,
    user_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET is_subscribed = TRUE, subscription_start = $2, subscription_end = $3 \
         WHERE id = $1",
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn clear_user_snapshot(
    conn: &mut PgConnection,
    user_id: Uuid,
    ended_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET is_subscribed = FALSE, subscription_end = $2 WHERE id = $1")
        .bind(user_id)
        .bind(ended_at)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// subscription plans

pub async fn list_active_plans(pool: &PgPool) -> Result<Vec<SubscriptionPlan>, sqlx::Error> {
    sqlx::query_as::<_, SubscriptionPlan>(
        "SELECT id, name, kind, price_cents, duration_days, description, features, \
         includes_email_notifications, includes_newsletter, is_active, created_at \
         FROM subscription_plans WHERE is_active = TRUE ORDER BY price_cents ASC",
    )
    .fetch_all(pool)
    .await
}

pub async fn get_active_plan(
    pool: &PgPool,
    plan_id: Uuid,
) -> Result<Option<SubscriptionPlan>, sqlx::Error> {
    sqlx::query_as::<_, SubscriptionPlan>(
        "SELECT id, name, kind, price_cents, duration_days, description, features, \
         includes_email_notifications, includes_newsletter, is_active, created_at \
         FROM subscription_plans WHERE id = $1 AND is_active = TRUE",
    )
    .bind(plan_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_plan(
    pool: &PgPool,
    plan_id: Uuid,
) -> Result<Option<SubscriptionPlan>, sqlx::Error> {
    sqlx::query_as::<_, SubscriptionPlan>(
        "SELECT id, name, kind, price_cents, duration_days, description, features, \
         includes_email_notifications, includes_newsletter, is_active, created_at \
         FROM subscription_plans WHERE id = $1",
    )
    .bind(plan_id)
    .fetch_optional(pool)
    .await
}

pub async fn create_plan(pool: &PgPool, plan: &SubscriptionPlan) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO subscription_plans (id, name, kind, price_cents, duration_days, description, \
         features, includes_email_notifications, includes_newsletter, is_active, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(plan.id)
    .bind(&plan.name)
    .bind(plan.kind)
    .bind(plan.price_cents)
    .bind(plan.duration_days)
    .bind(&plan.description)
    .bind(&plan.features)
    .bind(plan.includes_email_notifications)
    .bind(plan.includes_newsletter)
    .bind(plan.is_active)
    .bind(plan.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// subscriptions

pub async fn insert_subscription(
    conn: &mut PgConnection,
    subscription: &Subscription,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO subscriptions (id, user_id, plan_id, status, start_date, end_date, \
         auto_renew, payment_reference, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(subscription.id)
    .bind(subscription.user_id)
    .bind(subscription.plan_id)
    .bind(subscription.status)
    .bind(subscription.start_date)
    .bind(subscription.end_date)
    .bind(subscription.auto_renew)
    .bind(&subscription.payment_reference)
    .bind(subscription.created_at)
    .bind(subscription.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_subscription(
    pool: &PgPool,
    subscription_id: Uuid,
) -> Result<Option<Subscription>, sqlx::Error> {
    sqlx::query_as::<_, Subscription>(
        "SELECT id, user_id, plan_id, status, start_date, end_date, auto_renew, \
         payment_reference, created_at, updated_at \
         FROM subscriptions WHERE id = $1",
    )
    .bind(subscription_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_user_subscription(
    pool: &PgPool,
    subscription_id: Uuid,
    user_id: Uuid,
) -> Result<Option<Subscription>, sqlx::Error> {
    sqlx::query_as::<_, Subscription>(
        "SELECT id, user_id, plan_id, status, start_date, end_date, auto_renew, \
         payment_reference, created_at, updated_at \
         FROM subscriptions WHERE id = $1 AND user_id = $2",
    )
    .bind(subscription_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_user_subscriptions(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<Subscription>, sqlx::Error> {
    sqlx::query_as::<_, Subscription>(
        "SELECT id, user_id, plan_id, status, start_date, end_date, auto_renew, \
         payment_reference, created_at, updated_at \
         FROM subscriptions WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn set_subscription_status(
    conn: &mut PgConnection,
    subscription_id: Uuid,
    status: SubscriptionStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE subscriptions SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(subscription_id)
        .bind(status)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn renew_subscription_row(
    conn: &mut PgConnection,
    subscription_id: Uuid,
    end_date: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE subscriptions SET status = 'active', end_date = $2, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(subscription_id)
    .bind(end_date)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn expire_due_subscriptions(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
) -> Result<Vec<Uuid>, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>(
        "UPDATE subscriptions SET status = 'expired', updated_at = NOW() \
         WHERE status = 'active' AND end_date < $1 RETURNING user_id",
    )
    .bind(now)
    .fetch_all(&mut *conn)
    .await
}

pub async fn clear_expired_snapshots(
    conn: &mut PgConnection,
    user_ids: &[Uuid],
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET is_subscribed = FALSE \
         WHERE id = ANY($1) AND is_subscribed = TRUE \
         AND subscription_end IS NOT NULL AND subscription_end < $2",
    )
    .bind(user_ids)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// articles

pub async fn list_published_articles(
    pool: &PgPool,
    query: &ArticleListQuery,
) -> Result<Vec<Article>, sqlx::Error> {
    let (limit, offset) = limit_offset(query.page, query.page_size);
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT id, title, slug, summary, content, category_id, author_id, status, is_breaking, \
         is_featured, views_count, published_at, created_at, updated_at \
         FROM articles WHERE status = 'published'",
    );
    if let Some(category) = &query.category {
        qb.push(" AND category_id = (SELECT id FROM categories WHERE slug = ");
        qb.push_bind(category);
        qb.push(")");
    }
    if let Some(featured) = query.is_featured {
        qb.push(" AND is_featured = ");
        qb.push_bind(featured);
    }
    if let Some(breaking) = query.is_breaking {
        qb.push(" AND is_breaking = ");
        qb.push_bind(breaking);
    }
    if let Some(author) = query.author {
        qb.push(" AND author_id = ");
        qb.push_bind(author);
    }
    qb.push(" ORDER BY ");
    qb.push(article_order_clause(query.ordering.as_deref()));
    qb.push(" LIMIT ");
    qb.push_bind(limit);
    qb.push(" OFFSET ");
    qb.push_bind(offset);
    qb.build_query_as::<Article>().fetch_all(pool).await
}

pub async fn search_articles(
    pool: &PgPool,
    query: &SearchQuery,
) -> Result<Vec<Article>, sqlx::Error> {
    let (limit, offset) = limit_offset(query.page, query.page_size);
    let pattern = format!("%{}%", query.q);
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT id, title, slug, summary, content, category_id, author_id, status, is_breaking, \
         is_featured, views_count, published_at, created_at, updated_at \
         FROM articles WHERE status = 'published'",
    );
    qb.push(" AND (title ILIKE ");
    qb.push_bind(pattern.clone());
    qb.push(" OR summary ILIKE ");
    qb.push_bind(pattern.clone());
    qb.push(" OR content ILIKE ");
    qb.push_bind(pattern);
    qb.push(")");
    if let Some(category) = &query.category {
        qb.push(" AND category_id = (SELECT id FROM categories WHERE slug = ");
        qb.push_bind(category);
        qb.push(")");
    }
    qb.push(" ORDER BY published_at DESC NULLS LAST LIMIT ");
    qb.push_bind(limit);
    qb.push(" OFFSET ");
    qb.push_bind(offset);
    qb.build_query_as::<Article>().fetch_all(pool).await
}

pub async fn get_published_article_by_slug(
    pool: &PgPool,
    slug: &str,
) -> Result<Option<Article>, sqlx::Error> {
    sqlx::query_as::<_, Article>(
        "SELECT id, title, slug, summary, content, category_id, author_id, status, is_breaking, \
         is_featured, views_count, published_at, created_at, updated_at \
         FROM articles WHERE slug = $1 AND status = 'published'",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await
}

pub async fn trending_articles(
    pool: &PgPool,
    days: i64,
    limit: i64,
) -> Result<Vec<Article>, sqlx::Error> {
    let cutoff = Utc::now() - Duration::days(days);
    sqlx::query_as::<_, Article>(
        "SELECT id, title, slug, summary, content, category_id, author_id, status, is_breaking, \
         is_featured, views_count, published_at, created_at, updated_at \
         FROM articles WHERE status = 'published' AND published_at >= $1 \
         ORDER BY views_count DESC, published_at DESC LIMIT $2",
    )
    .bind(cutoff)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn featured_articles(pool: &PgPool, limit: i64) -> Result<Vec<Article>, sqlx::Error> {
    sqlx::query_as::<_, Article>(
        "SELECT id, title, slug, summary, content, category_id, author_id, status, is_breaking, \
         is_featured, views_count, published_at, created_at, updated_at \
         FROM articles WHERE status = 'published' AND is_featured = TRUE \
         ORDER BY published_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn insert_article(pool: &PgPool, article: &Article) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO articles (id, title, slug, summary, content, category_id, author_id, status, \
         is_breaking, is_featured, views_count, published_at, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
    )
    .bind(article.id)
    .bind(&article.title)
    .bind(&article.slug)
    .bind(&article.summary)
    .bind(&article.content)
    .bind(article.category_id)
    .bind(article.author_id)
    .bind(article.status)
    .bind(article.is_breaking)
    .bind(article.is_featured)
    .bind(article.views_count)
    .bind(article.published_at)
    .bind(article.created_at)
    .bind(article.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn publish_article(pool: &PgPool, slug: &str) -> Result<Option<Article>, sqlx::Error> {
    sqlx::query_as::<_, Article>(
        "UPDATE articles SET status = 'published', \
         published_at = COALESCE(published_at, NOW()), updated_at = NOW() \
         WHERE slug = $1 \
         RETURNING id, title, slug, summary, content, category_id, author_id, status, \
         is_breaking, is_featured, views_count, published_at, created_at, updated_at",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await
}

// The FOR UPDATE lock serializes concurrent view recording for one article;
// the dedup check and the counter bump both happen under it.

pub async fn lock_article_for_view(
    conn: &mut PgConnection,
    slug: &str,
) -> Result<Option<(Uuid, Option<Uuid>)>, sqlx::Error> {
    sqlx::query_as::<_, (Uuid, Option<Uuid>)>(
        "SELECT id, author_id FROM articles WHERE slug = $1 AND status = 'published' FOR UPDATE",
    )
    .bind(slug)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn bump_article_views(
    conn: &mut PgConnection,
    article_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE articles SET views_count = views_count + 1 WHERE id = $1")
        .bind(article_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// videos

pub async fn list_videos(
    pool: &PgPool,
    query: &VideoListQuery,
) -> Result<Vec<Video>, sqlx::Error> {
    let (limit, offset) = limit_offset(query.page, query.page_size);
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT id, title, slug, description, video_url, duration, category_id, author_id, \
         views_count, is_featured, is_active, published_at, updated_at \
         FROM videos WHERE is_active = TRUE",
    );
    if let Some(category) = &query.category {
        qb.push(" AND category_id = (SELECT id FROM categories WHERE slug = ");
        qb.push_bind(category);
        qb.push(")");
    }
    if let Some(featured) = query.is_featured {
        qb.push(" AND is_featured = ");
        qb.push_bind(featured);
    }
    qb.push(" ORDER BY ");
    qb.push(video_order_clause(query.ordering.as_deref()));
    qb.push(" LIMIT ");
    qb.push_bind(limit);
    qb.push(" OFFSET ");
    qb.push_bind(offset);
    qb.build_query_as::<Video>().fetch_all(pool).await
}

pub async fn get_active_video_by_slug(
    pool: &PgPool,
    slug: &str,
) -> Result<Option<Video>, sqlx::Error> {
    sqlx::query_as::<_, Video>(
        "SELECT id, title, slug, description, video_url, duration, category_id, author_id, \
         views_count, is_featured, is_active, published_at, updated_at \
         FROM videos WHERE slug = $1 AND is_active = TRUE",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await
}

pub async fn featured_videos(pool: &PgPool, limit: i64) -> Result<Vec<Video>, sqlx::Error> {
    sqlx::query_as::<_, Video>(
        "SELECT id, title, slug, description, video_url, duration, category_id, author_id, \
         views_count, is_featured, is_active, published_at, updated_at \
         FROM videos WHERE is_active = TRUE AND is_featured = TRUE \
         ORDER BY published_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn insert_video(pool: &PgPool, video: &Video) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO videos (id, title, slug, description, video_url, duration, category_id, \
         author_id, views_count, is_featured, is_active, published_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(video.id)
    .bind(&video.title)
    .bind(&video.slug)
    .bind(&video.description)
    .bind(&video.video_url)
    .bind(&video.duration)
    .bind(video.category_id)
    .bind(video.author_id)
    .bind(video.views_count)
    .bind(video.is_featured)
    .bind(video.is_active)
    .bind(video.published_at)
    .bind(video.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn lock_video_for_view(
    conn: &mut PgConnection,
    slug: &str,
) -> Result<Option<(Uuid, Option<Uuid>)>, sqlx::Error> {
    sqlx::query_as::<_, (Uuid, Option<Uuid>)>(
        "SELECT id, author_id FROM videos WHERE slug = $1 AND is_active = TRUE FOR UPDATE",
    )
    .bind(slug)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn bump_video_views(conn: &mut PgConnection, video_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE videos SET views_count = views_count + 1 WHERE id = $1")
        .bind(video_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// categories

pub async fn list_categories(pool: &PgPool) -> Result<Vec<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        "SELECT id, name, slug, description, color, article_count, sort_order, is_active, \
         created_at \
         FROM categories WHERE is_active = TRUE ORDER BY sort_order ASC, name ASC",
    )
    .fetch_all(pool)
    .await
}

pub async fn get_category(
    pool: &PgPool,
    category_id: Uuid,
) -> Result<Option<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        "SELECT id, name, slug, description, color, article_count, sort_order, is_active, \
         created_at \
         FROM categories WHERE id = $1",
    )
    .bind(category_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_category_by_slug(
    pool: &PgPool,
    slug: &str,
) -> Result<Option<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        "SELECT id, name, slug, description, color, article_count, sort_order, is_active, \
         created_at \
         FROM categories WHERE slug = $1 AND is_active = TRUE",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await
}

pub async fn category_name_exists(pool: &PgPool, name: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE name = $1)")
        .bind(name)
        .fetch_one(pool)
        .await
}

pub async fn insert_category(pool: &PgPool, category: &Category) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO categories (id, name, slug, description, color, article_count, sort_order, \
         is_active, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(category.id)
    .bind(&category.name)
    .bind(&category.slug)
    .bind(&category.description)
    .bind(&category.color)
    .bind(category.article_count)
    .bind(category.sort_order)
    .bind(category.is_active)
    .bind(category.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn recompute_category_count(
    pool: &PgPool,
    category_id: Uuid,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "UPDATE categories SET article_count = \
         (SELECT COUNT(*) FROM articles WHERE category_id = $1 AND status = 'published') \
         WHERE id = $1 RETURNING article_count",
    )
    .bind(category_id)
    .fetch_one(pool)
    .await
}

// ---------------------------------------------------------------------------
// breaking news

pub async fn list_active_breaking(pool: &PgPool) -> Result<Vec<BreakingNews>, sqlx::Error> {
    sqlx::query_as::<_, BreakingNews>(
        "SELECT id, text, urgent, is_active, created_at \
         FROM breaking_news WHERE is_active = TRUE ORDER BY urgent DESC, created_at DESC",
    )
    .fetch_all(pool)
    .await
}

pub async fn insert_breaking(pool: &PgPool, item: &BreakingNews) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO breaking_news (id, text, urgent, is_active, created_at) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(item.id)
    .bind(&item.text)
    .bind(item.urgent)
    .bind(item.is_active)
    .bind(item.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn deactivate_breaking_before(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE breaking_news SET is_active = FALSE WHERE is_active = TRUE AND created_at < $1",
    )
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// newsletter

pub async fn get_newsletter_subscriber(
    pool: &PgPool,
    email: &str,
) -> Result<Option<NewsletterSubscriber>, sqlx::Error> {
    sqlx::query_as::<_, NewsletterSubscriber>(
        "SELECT id, email, is_active, subscribed_at, unsubscribed_at \
         FROM newsletter_subscribers WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn insert_newsletter_subscriber(
    pool: &PgPool,
    subscriber: &NewsletterSubscriber,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO newsletter_subscribers (id, email, is_active, subscribed_at, unsubscribed_at) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(subscriber.id)
    .bind(&subscriber.email)
    .bind(subscriber.is_active)
    .bind(subscriber.subscribed_at)
    .bind(subscriber.unsubscribed_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn reactivate_newsletter_subscriber(
    pool: &PgPool,
    subscriber_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE newsletter_subscribers SET is_active = TRUE, subscribed_at = $2, \
         unsubscribed_at = NULL WHERE id = $1",
    )
    .bind(subscriber_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn deactivate_newsletter_subscriber(
    pool: &PgPool,
    subscriber_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE newsletter_subscribers SET is_active = FALSE, unsubscribed_at = $2 WHERE id = $1",
    )
    .bind(subscriber_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// slugs and ordering

#[derive(Debug, Clone, Copy)]
pub enum SlugTable {
    Articles,
    Videos,
    Categories,
}

impl SlugTable {
    fn exists_query(self) -> &'static str {
        match self {
            SlugTable::Articles => "SELECT EXISTS(SELECT 1 FROM articles WHERE slug = $1)",
            SlugTable::Videos => "SELECT EXISTS(SELECT 1 FROM videos WHERE slug = $1)",
            SlugTable::Categories => "SELECT EXISTS(SELECT 1 FROM categories WHERE slug = $1)",
        }
    }

    fn fallback_slug(self) -> &'static str {
        match self {
            SlugTable::Articles => "article",
            SlugTable::Videos => "video",
            SlugTable::Categories => "category",
        }
    }
}

pub async fn slug_exists(pool: &PgPool, table: SlugTable, slug: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(table.exists_query())
        .bind(slug)
        .fetch_one(pool)
        .await
}

pub fn slugify(text: &str) -> String {
    let lower = text.to_lowercase();
    let mapped: String = lower
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    mapped
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

pub async fn unique_slug(
    pool: &PgPool,
    table: SlugTable,
    source: &str,
) -> Result<String, sqlx::Error> {
    let base = slugify(source);
    let base = if base.is_empty() {
        table.fallback_slug().to_string()
    } else {
        base
    };
    let mut candidate = base.clone();
    let mut suffix = 1u32;
    while slug_exists(pool, table, &candidate).await? {
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }
    Ok(candidate)
}

// Ordering comes from an untrusted query parameter, so it is mapped onto a
// fixed clause instead of being spliced into the SQL.
pub fn article_order_clause(ordering: Option<&str>) -> &'static str {
    match ordering.unwrap_or("-published_at") {
        "published_at" => "published_at ASC NULLS LAST",
        "views_count" => "views_count ASC",
        "-views_count" => "views_count DESC",
        "created_at" => "created_at ASC",
        "-created_at" => "created_at DESC",
        _ => "published_at DESC NULLS LAST",
    }
}

pub fn video_order_clause(ordering: Option<&str>) -> &'static str {
    match ordering.unwrap_or("-published_at") {
        "published_at" => "published_at ASC",
        "views_count" => "views_count ASC",
        "-views_count" => "views_count DESC",
        _ => "published_at DESC",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic_title() {
        assert_eq!(
            slugify("Breaking News: Markets Rally!"),
            "breaking-news-markets-rally"
        );
    }

    #[test]
    fn slugify_collapses_separator_runs() {
        assert_eq!(slugify("  a -- b  "), "a-b");
    }

    #[test]
    fn slugify_non_ascii_drops_to_empty() {
        assert_eq!(slugify("Новости"), "");
    }

    #[test]
    fn article_ordering_rejects_unknown_fields() {
        assert_eq!(
            article_order_clause(Some("title; DROP TABLE articles")),
            "published_at DESC NULLS LAST"
        );
        assert_eq!(
            article_order_clause(Some("-views_count")),
            "views_count DESC"
        );
        assert_eq!(article_order_clause(None), "published_at DESC NULLS LAST");
    }

    #[test]
    fn video_ordering_rejects_unknown_fields() {
        assert_eq!(video_order_clause(Some("duration")), "published_at DESC");
        assert_eq!(video_order_clause(Some("views_count")), "views_count ASC");
    }
}
