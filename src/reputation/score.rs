//! Reputation and badge records
//!
//! Score starts at 0 and grows with completed bounties.
//! Level is derived from score and never stored independently of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Points per level step
pub const POINTS_PER_LEVEL: i64 = 100;

/// `max(1, floor(score / 100))`
pub fn level_for(score: i64) -> i64 {
    score.div_euclid(POINTS_PER_LEVEL).max(1)
}

/// Reputation record for a user (one per user)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reputation {
    pub user_id: String,
    pub score: i64,
    pub level: i64,
    pub badges: Vec<Badge>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reputation {
    pub fn new(user_id: String) -> Self {
        Self {
            user_id,
            score: 0,
            level: 1,
            badges: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Next value after adding `points`, or `None` on overflow.
    pub fn with_points(&self, points: i64) -> Option<Reputation> {
        let score = self.score.checked_add(points)?;
        let mut next = self.clone();
        next.score = score;
        next.level = level_for(score);
        next.updated_at = Utc::now();
        Some(next)
    }

    pub fn has_badge(&self, name: &str) -> bool {
        self.badges.iter().any(|b| b.name == name)
    }
}

/// Milestone badge. At most one per (user_id, name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub description: String,
    /// External proof of the award (metadata URI), when one was published
    pub proof_uri: Option<String>,
    pub tx_hash: Option<String>,
    pub awarded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBadge {
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub proof_uri: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_formula() {
        assert_eq!(level_for(0), 1);
        assert_eq!(level_for(99), 1);
        assert_eq!(level_for(100), 1);
        assert_eq!(level_for(199), 1);
        assert_eq!(level_for(200), 2);
        assert_eq!(level_for(1050), 10);
        assert_eq!(level_for(-250), 1);
    }

    #[test]
    fn test_with_points() {
        let rep = Reputation::new("0xabc".to_string());
        let next = rep.with_points(250).unwrap();
        assert_eq!(next.score, 250);
        assert_eq!(next.level, 2);
        assert_eq!(rep.score, 0);
    }

    #[test]
    fn test_with_points_overflow() {
        let mut rep = Reputation::new("0xabc".to_string());
        rep.score = i64::MAX;
        assert!(rep.with_points(1).is_none());
    }
}
