// src/scoring.rs
//! Engagement score stored on each content item.
//!
//! `(views + 5·likes + 10·comments) · credibility · 1 / (1 + 0.1·days_old)`

use chrono::{DateTime, Utc};

use crate::model::Engagement;

pub const LIKE_WEIGHT: f64 = 5.0;
pub const COMMENT_WEIGHT: f64 = 10.0;
pub const DECAY_PER_DAY: f64 = 0.1;

pub fn engagement_score(
    engagement: &Engagement,
    credibility: f64,
    published_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    let raw = engagement.views.max(0) as f64
        + engagement.likes.max(0) as f64 * LIKE_WEIGHT
        + engagement.comments.max(0) as f64 * COMMENT_WEIGHT;
    let days_old = ((now - published_at).num_seconds().max(0) as f64) / 86_400.0;
    let recency = 1.0 / (1.0 + days_old * DECAY_PER_DAY);
    let score = raw * credibility.clamp(0.0, 1.0) * recency;
    (score * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn fresh_item_is_not_decayed() {
        let now = Utc::now();
        let e = Engagement {
            views: 100,
            likes: 10,
            comments: 2,
        };
        assert_eq!(engagement_score(&e, 0.5, now, now), 85.0);
    }

    #[test]
    fn ten_days_halves_the_score() {
        let now = Utc::now();
        let e = Engagement {
            views: 1000,
            likes: 0,
            comments: 0,
        };
        assert_eq!(engagement_score(&e, 1.0, now - Duration::days(10), now), 500.0);
    }

    #[test]
    fn future_dates_do_not_boost() {
        let now = Utc::now();
        let e = Engagement {
            views: 10,
            likes: 0,
            comments: 0,
        };
        assert_eq!(engagement_score(&e, 1.0, now + Duration::days(3), now), 10.0);
    }
}
