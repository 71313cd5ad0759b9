// src/view_count.rs
use crate::db;
use crate::models::User;
use actix_web::HttpRequest;
use async_trait::async_trait;
use moka::future::Cache;
use sqlx::PgPool;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// How long one fingerprint suppresses repeat views of the same item.
pub const DEDUP_TTL: Duration = Duration::from_secs(3600);

const DEDUP_CAPACITY: u64 = 100_000;

#[derive(Debug, Clone, Copy)]
pub enum ContentKind {
    Article,
    Video,
}

impl ContentKind {
    fn key_prefix(self) -> &'static str {
        match self {
            ContentKind::Article => "article_view",
            ContentKind::Video => "video_view",
        }
    }

    fn name(self) -> &'static str {
        match self {
            ContentKind::Article => "article",
            ContentKind::Video => "video",
        }
    }
}

pub fn dedup_key(kind: ContentKind, content_id: Uuid, fingerprint: &str) -> String {
    format!("{}_{}_{}", kind.key_prefix(), content_id, fingerprint)
}

/// Client fingerprint for dedup: leftmost X-Forwarded-For entry when the
/// header is present, otherwise the peer address. None means the request
/// cannot be attributed and dedup is skipped for it.
pub fn client_fingerprint(req: &HttpRequest) -> Option<String> {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok());
    fingerprint_from(forwarded, req.peer_addr().map(|addr| addr.ip()))
}

pub fn fingerprint_from(forwarded_for: Option<&str>, peer: Option<IpAddr>) -> Option<String> {
    if let Some(header) = forwarded_for {
        let first = header.split(',').next().unwrap_or("").trim();
        if !first.is_empty() {
            return Some(first.to_string());
        }
    }
    peer.map(|ip| ip.to_string())
}

#[derive(Debug, Error)]
#[error("dedup store unavailable: {0}")]
pub struct DedupStoreError(pub String);

/// Seen-recently store behind the view counter. The in-memory moka store is
/// the default; the trait seam exists so an external store can take its place
/// without touching the counting logic.
#[async_trait]
pub trait DedupStore: Send + Sync {
    async fn seen(&self, key: &str) -> Result<bool, DedupStoreError>;
    async fn mark(&self, key: &str) -> Result<(), DedupStoreError>;
}

#[derive(Clone)]
pub struct MemoryDedupStore {
    cache: Cache<String, ()>,
}

impl MemoryDedupStore {
    pub fn new() -> Self {
        Self::with_ttl(DEDUP_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(DEDUP_CAPACITY)
                .time_to_live(ttl)
                .build(),
        }
    }
}

impl Default for MemoryDedupStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DedupStore for MemoryDedupStore {
    async fn seen(&self, key: &str) -> Result<bool, DedupStoreError> {
        Ok(self.cache.get(key).await.is_some())
    }

    async fn mark(&self, key: &str) -> Result<(), DedupStoreError> {
        self.cache.insert(key.to_string(), ()).await;
        Ok(())
    }
}

/// Dedup decision for one request. Store failures count the view anyway;
/// an unavailable store must never turn into lost views or failed requests.
async fn should_count(store: &dyn DedupStore, key: &str) -> bool {
    match store.seen(key).await {
        Ok(true) => false,
        Ok(false) => {
            if let Err(err) = store.mark(key).await {
                tracing::warn!(error = %err, "failed to mark view fingerprint");
            }
            true
        }
        Err(err) => {
            tracing::warn!(error = %err, "dedup store check failed, counting view");
            true
        }
    }
}

/// Records one view of a published article. Fire and forget: errors are
/// logged and swallowed so the read path never fails because of counting.
pub async fn record_article_view(
    pool: &PgPool,
    store: &dyn DedupStore,
    slug: &str,
    viewer: Option<&User>,
    fingerprint: Option<String>,
) {
    if let Err(err) = record(pool, store, ContentKind::Article, slug, viewer, fingerprint).await {
        tracing::error!(slug, error = %err, "failed to record article view");
    }
}

pub async fn record_video_view(
    pool: &PgPool,
    store: &dyn DedupStore,
    slug: &str,
    viewer: Option<&User>,
    fingerprint: Option<String>,
) {
    if let Err(err) = record(pool, store, ContentKind::Video, slug, viewer, fingerprint).await {
        tracing::error!(slug, error = %err, "failed to record video view");
    }
}

// The row lock is taken first so that concurrent requests for the same item
// serialize; the dedup check runs under it, which is what makes "same
// fingerprint counts once" hold even for simultaneous requests. Requests for
// different items only ever lock their own row.
async fn record(
    pool: &PgPool,
    store: &dyn DedupStore,
    kind: ContentKind,
    slug: &str,
    viewer: Option<&User>,
    fingerprint: Option<String>,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    let locked = match kind {
        ContentKind::Article => db::lock_article_for_view(&mut *tx, slug).await?,
        ContentKind::Video => db::lock_video_for_view(&mut *tx, slug).await?,
    };
    let Some((content_id, author_id)) = locked else {
        return Ok(());
    };

    if is_self_view(author_id, viewer) {
        tracing::debug!(slug, kind = kind.name(), "skipping author self-view");
        return Ok(());
    }

    // Requests without a fingerprint are counted without dedup.
    let counted = match fingerprint {
        Some(fp) => should_count(store, &dedup_key(kind, content_id, &fp)).await,
        None => true,
    };
    if !counted {
        return Ok(());
    }

    match kind {
        ContentKind::Article => db::bump_article_views(&mut *tx, content_id).await?,
        ContentKind::Video => db::bump_video_views(&mut *tx, content_id).await?,
    }
    tx.commit().await?;
    Ok(())
}

pub fn is_self_view(author_id: Option<Uuid>, viewer: Option<&User>) -> bool {
    matches!((author_id, viewer), (Some(author), Some(user)) if author == user.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use chrono::Utc;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn reader() -> User {
        User {
            id: Uuid::new_v4(),
            username: "reader".to_string(),
            email: "reader@example.com".to_string(),
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
    fn fingerprint_prefers_forwarded_for() {
        let peer = Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(
            fingerprint_from(Some("203.0.113.7, 70.41.3.18"), peer),
            Some("203.0.113.7".to_string())
        );
    }

    #[test]
    fn fingerprint_falls_back_to_peer_address() {
        let peer = Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(fingerprint_from(None, peer), Some("10.0.0.1".to_string()));
        assert_eq!(fingerprint_from(Some("  "), peer), Some("10.0.0.1".to_string()));
    }

    #[test]
    fn fingerprint_absent_when_nothing_known() {
        assert_eq!(fingerprint_from(None, None), None);
    }

    #[test]
    fn dedup_key_formats_per_kind() {
        let id = Uuid::nil();
        assert_eq!(
            dedup_key(ContentKind::Article, id, "1.2.3.4"),
            format!("article_view_{id}_1.2.3.4")
        );
        assert_eq!(
            dedup_key(ContentKind::Video, id, "1.2.3.4"),
            format!("video_view_{id}_1.2.3.4")
        );
    }

    #[test]
    fn self_view_detection() {
        let user = reader();
        assert!(is_self_view(Some(user.id), Some(&user)));
        assert!(!is_self_view(Some(Uuid::new_v4()), Some(&user)));
        assert!(!is_self_view(None, Some(&user)));
        assert!(!is_self_view(Some(user.id), None));
    }

    #[tokio::test]
    async fn repeat_fingerprint_counts_once() {
        let store = MemoryDedupStore::new();
        let key = dedup_key(ContentKind::Article, Uuid::new_v4(), "1.2.3.4");
        assert!(should_count(&store, &key).await);
        assert!(!should_count(&store, &key).await);
    }

    #[tokio::test]
    async fn distinct_fingerprints_count_separately() {
        let store = MemoryDedupStore::new();
        let id = Uuid::new_v4();
        assert!(should_count(&store, &dedup_key(ContentKind::Article, id, "1.1.1.1")).await);
        assert!(should_count(&store, &dedup_key(ContentKind::Article, id, "2.2.2.2")).await);
    }

    #[tokio::test]
    async fn article_and_video_keys_do_not_collide() {
        let store = MemoryDedupStore::new();
        let id = Uuid::new_v4();
        assert!(should_count(&store, &dedup_key(ContentKind::Article, id, "1.1.1.1")).await);
        assert!(should_count(&store, &dedup_key(ContentKind::Video, id, "1.1.1.1")).await);
    }

    #[tokio::test]
    async fn ttl_expiry_allows_counting_again() {
        let store = MemoryDedupStore::with_ttl(Duration::from_millis(20));
        let key = dedup_key(ContentKind::Article, Uuid::new_v4(), "1.2.3.4");
        assert!(should_count(&store, &key).await);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(should_count(&store, &key).await);
    }

    struct FailingStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DedupStore for FailingStore {
        async fn seen(&self, _key: &str) -> Result<bool, DedupStoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(DedupStoreError("connection refused".to_string()))
        }

        async fn mark(&self, _key: &str) -> Result<(), DedupStoreError> {
            Err(DedupStoreError("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn store_failure_fails_open() {
        let store = FailingStore {
            calls: AtomicUsize::new(0),
        };
        assert!(should_count(&store, "article_view_x_1.2.3.4").await);
        assert!(should_count(&store, "article_view_x_1.2.3.4").await);
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }
}
