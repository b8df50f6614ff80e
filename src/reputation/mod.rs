//! Reputation: per-user score, derived level and milestone badges
//!
//! ```text
//! ┌────────────┐  apply   ┌──────────────┐  award_in  ┌─────────────┐
//! │ Lifecycle  │────────►│    Ledger    │──────────►│ BadgeEngine │
//! │ (complete) │          │ score, level │            │ milestones  │
//! └────────────┘          └──────────────┘            └─────────────┘
//! ```
//!
//! ## Score Model
//!
//! - Score starts at 0 and grows by a fixed award per completed bounty
//! - Level is `max(1, score / 100)`
//! - Badges are awarded once per milestone and never revoked

mod badges;
mod ledger;
mod score;

pub use badges::{BadgeEngine, Milestone, MilestoneCatalogue};
pub use ledger::{Ledger, DEFAULT_COMPLETION_POINTS};
pub use score::{level_for, Badge, NewBadge, Reputation, POINTS_PER_LEVEL};
