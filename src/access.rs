// src/access.rs
use crate::models::{User, UserRole};
use chrono::{DateTime, Utc};

/// First N characters of an article body shown to readers without access.
pub const PREVIEW_LENGTH: usize = 200;

pub const PREVIEW_MESSAGE: &str = "Subscribe to read the full article";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Full,
    Preview,
}

/// Decides how much of a gated article the viewer may see.
///
/// The denormalized snapshot on the user row is what gets consulted, but the
/// end date is re-checked against `now` so a stale `is_subscribed = true`
/// never grants access past the paid period.
pub fn decide(viewer: Option<&User>, now: DateTime<Utc>) -> AccessLevel {
    let Some(user) = viewer else {
        return AccessLevel::Preview;
    };
    if user.role == UserRole::Admin {
        return AccessLevel::Full;
    }
    match (user.is_subscribed, user.subscription_end) {
        (true, Some(end)) if end >= now => AccessLevel::Full,
        _ => AccessLevel::Preview,
    }
}

/// Truncates an article body to the preview length on a char boundary and
/// marks the cut with an ellipsis. Empty bodies stay empty.
pub fn preview_excerpt(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }
    let cut = content
        .char_indices()
        .nth(PREVIEW_LENGTH)
        .map(|(index, _)| index)
        .unwrap_or(content.len());
    format!("{}...", &content[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn viewer(role: UserRole, is_subscribed: bool, end: Option<DateTime<Utc>>) -> User {
        User {
            id: Uuid::new_v4(),
            username: "reader".to_string(),
            email: "reader@example.com".to_string(),
            password_hash: "x".to_string(),
            role,
            is_subscribed,
            subscription_start: None,
            subscription_end: end,
            email_notifications: true,
            newsletter_opt_in: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn anonymous_gets_preview() {
        assert_eq!(decide(None, Utc::now()), AccessLevel::Preview);
    }

    #[test]
    fn admin_bypasses_subscription_check() {
        let user = viewer(UserRole::Admin, false, None);
        assert_eq!(decide(Some(&user), Utc::now()), AccessLevel::Full);
    }

    #[test]
    fn subscriber_within_period_gets_full() {
        let now = Utc::now();
        let user = viewer(UserRole::Subscriber, true, Some(now + Duration::days(10)));
        assert_eq!(decide(Some(&user), now), AccessLevel::Full);
    }

    #[test]
    fn subscription_end_is_inclusive() {
        let now = Utc::now();
        let user = viewer(UserRole::Subscriber, true, Some(now));
        assert_eq!(decide(Some(&user), now), AccessLevel::Full);
    }

    #[test]
    fn stale_snapshot_past_end_date_gets_preview() {
        let now = Utc::now();
        let user = viewer(UserRole::Subscriber, true, Some(now - Duration::seconds(1)));
        assert_eq!(decide(Some(&user), now), AccessLevel::Preview);
    }

    #[test]
    fn snapshot_without_end_date_gets_preview() {
        let user = viewer(UserRole::Subscriber, true, None);
        assert_eq!(decide(Some(&user), Utc::now()), AccessLevel::Preview);
    }

    #[test]
    fn staff_writers_still_need_a_subscription() {
        let user = viewer(UserRole::Editor, false, None);
        assert_eq!(decide(Some(&user), Utc::now()), AccessLevel::Preview);
    }

    #[test]
    fn excerpt_truncates_long_content() {
        let content = "a".repeat(500);
        let excerpt = preview_excerpt(&content);
        assert_eq!(excerpt.chars().count(), PREVIEW_LENGTH + 3);
        assert!(excerpt.ends_with("..."));
    }

    #[test]
    fn excerpt_keeps_short_content_whole() {
        assert_eq!(preview_excerpt("short body"), "short body...");
    }

    #[test]
    fn excerpt_cuts_multibyte_text_on_char_boundary() {
        let content = "é".repeat(300);
        let excerpt = preview_excerpt(&content);
        assert_eq!(excerpt.chars().count(), PREVIEW_LENGTH + 3);
    }

    #[test]
    fn excerpt_leaves_empty_content_alone() {
        assert_eq!(preview_excerpt(""), "");
    }
}
