//! Interaction-score computation.
//!
//! The score summarizes how recently a user has been active, weighing four
//! signals: logging in, sending a message, creating a post, and accepting a
//! friend request.  Each signal contributes its weight scaled by an
//! exponential decay with a seven-day half-life, so a signal from a week ago
//! is worth half of a fresh one.
//!
//! The application recomputes the score after every qualifying write; it is
//! never derived inside SQL.

use chrono::{DateTime, Utc};

use crate::constants::{
    SCORE_HALF_LIFE_DAYS, SCORE_WEIGHT_FRIEND_ACCEPT, SCORE_WEIGHT_LOGIN, SCORE_WEIGHT_MESSAGE,
    SCORE_WEIGHT_POST,
};

/// The most recent occurrence of each scored signal.  `None` means the user
/// has never produced that signal.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InteractionSignals {
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_post_at: Option<DateTime<Utc>>,
    pub last_friend_accept_at: Option<DateTime<Utc>>,
}

/// Compute the interaction score at `now`.
///
/// Result is clamped to `0.0..=100.0`.  Timestamps in the future (clock skew
/// between writers) count as "just now" rather than inflating the score.
pub fn interaction_score(now: DateTime<Utc>, signals: &InteractionSignals) -> f64 {
    let score = decay(now, signals.last_login_at) * SCORE_WEIGHT_LOGIN
        + decay(now, signals.last_message_at) * SCORE_WEIGHT_MESSAGE
        + decay(now, signals.last_post_at) * SCORE_WEIGHT_POST
        + decay(now, signals.last_friend_accept_at) * SCORE_WEIGHT_FRIEND_ACCEPT;

    score.clamp(0.0, 100.0)
}

/// Exponential decay factor for a single signal: 1.0 when fresh, 0.5 after
/// one half-life, 0.0 when the signal never happened.
fn decay(now: DateTime<Utc>, at: Option<DateTime<Utc>>) -> f64 {
    let Some(at) = at else {
        return 0.0;
    };

    let age_secs = (now - at).num_seconds().max(0) as f64;
    let age_days = age_secs / 86_400.0;

    0.5_f64.powf(age_days / SCORE_HALF_LIFE_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn no_activity_scores_zero() {
        let now = Utc::now();
        assert_eq!(interaction_score(now, &InteractionSignals::default()), 0.0);
    }

    #[test]
    fn fresh_activity_scores_full() {
        let now = Utc::now();
        let signals = InteractionSignals {
            last_login_at: Some(now),
            last_message_at: Some(now),
            last_post_at: Some(now),
            last_friend_accept_at: Some(now),
        };
        let score = interaction_score(now, &signals);
        assert!((score - 100.0).abs() < 1e-9, "score was {score}");
    }

    #[test]
    fn one_half_life_halves_a_signal() {
        let now = Utc::now();
        let signals = InteractionSignals {
            last_message_at: Some(now - Duration::days(7)),
            ..Default::default()
        };
        let score = interaction_score(now, &signals);
        assert!((score - 15.0).abs() < 0.01, "score was {score}");
    }

    #[test]
    fn future_timestamps_count_as_fresh() {
        let now = Utc::now();
        let signals = InteractionSignals {
            last_login_at: Some(now + Duration::hours(1)),
            ..Default::default()
        };
        assert_eq!(interaction_score(now, &signals), 10.0);
    }

    #[test]
    fn older_activity_scores_lower() {
        let now = Utc::now();
        let fresh = InteractionSignals {
            last_post_at: Some(now - Duration::days(1)),
            ..Default::default()
        };
        let stale = InteractionSignals {
            last_post_at: Some(now - Duration::days(30)),
            ..Default::default()
        };
        assert!(interaction_score(now, &fresh) > interaction_score(now, &stale));
    }
}
