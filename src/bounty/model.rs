//! Bounty records and the pure state machine over them.
//!
//! Transition methods never mutate in place: each one validates the current
//! value and returns the next value, which the caller persists with an
//! optimistic version check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::bounty::amount::TokenAmount;
use crate::error::{BountyError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BountyStatus {
    Open,
    Claimed,
    Submitted,
    Disputed,
    Completed,
}

impl BountyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BountyStatus::Open => "open",
            BountyStatus::Claimed => "claimed",
            BountyStatus::Submitted => "submitted",
            BountyStatus::Disputed => "disputed",
            BountyStatus::Completed => "completed",
        }
    }

    /// The transition table. Comments are not a transition and are accepted
    /// in every state.
    pub fn allows(&self, action: BountyAction) -> bool {
        use BountyAction::*;
        use BountyStatus::*;
        matches!(
            (*self, action),
            (Open, Claim)
                | (Claimed, Submit)
                | (Claimed | Submitted, Complete)
                | (Claimed, Dispute)
                | (Disputed, Resolve)
                | (_, Comment)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BountyStatus::Completed)
    }
}

impl fmt::Display for BountyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BountyStatus {
    type Err = BountyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(BountyStatus::Open),
            "claimed" => Ok(BountyStatus::Claimed),
            "submitted" => Ok(BountyStatus::Submitted),
            "disputed" => Ok(BountyStatus::Disputed),
            "completed" => Ok(BountyStatus::Completed),
            other => Err(BountyError::validation(format!(
                "unknown bounty status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BountyAction {
    Claim,
    Submit,
    Complete,
    Dispute,
    Resolve,
    Comment,
}

impl fmt::Display for BountyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            BountyAction::Claim => "claim",
            BountyAction::Submit => "submit work for",
            BountyAction::Complete => "complete",
            BountyAction::Dispute => "dispute",
            BountyAction::Resolve => "resolve",
            BountyAction::Comment => "comment on",
        };
        f.write_str(verb)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounty {
    pub id: i64,
    /// Reference to the on-chain bounty, when one exists
    pub external_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub reward: TokenAmount,
    pub creator_id: String,
    pub hunter_id: Option<String>,
    pub status: BountyStatus,
    pub deadline: DateTime<Utc>,
    pub dispute_reason: Option<String>,
    pub dispute_winner: Option<String>,
    pub dispute_resolution: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Content-store handle of the bounty metadata document
    pub metadata_hash: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bounty {
    pub fn is_creator(&self, user_id: &str) -> bool {
        self.creator_id == user_id
    }

    pub fn is_hunter(&self, user_id: &str) -> bool {
        self.hunter_id.as_deref() == Some(user_id)
    }

    /// Reject `action` if the current status does not allow it, reporting
    /// lost races as their own error kinds.
    pub fn ensure_allows(&self, action: BountyAction) -> Result<()> {
        if self.status.allows(action) {
            return Ok(());
        }
        Err(match (self.status, action) {
            (BountyStatus::Claimed | BountyStatus::Submitted, BountyAction::Claim) => {
                BountyError::AlreadyClaimed(self.id)
            }
            (BountyStatus::Completed, BountyAction::Complete | BountyAction::Resolve) => {
                BountyError::AlreadyCompleted(self.id)
            }
            (status, action) => BountyError::InvalidTransition { action, status },
        })
    }

    fn assigned_hunter(&self) -> Result<&str> {
        self.hunter_id
            .as_deref()
            .ok_or_else(|| BountyError::validation(format!("bounty {} has no assigned hunter", self.id)))
    }

    pub fn claimed_by(&self, hunter_id: &str) -> Result<Bounty> {
        self.ensure_allows(BountyAction::Claim)?;
        if self.is_creator(hunter_id) {
            return Err(BountyError::Unauthorized(
                "creators cannot claim their own bounty".to_string(),
            ));
        }
        if self.hunter_id.is_some() {
            return Err(BountyError::AlreadyClaimed(self.id));
        }

        let mut next = self.clone();
        next.status = BountyStatus::Claimed;
        next.hunter_id = Some(hunter_id.to_string());
        Ok(next)
    }

    /// Submitting work leaves the bounty itself untouched.
    pub fn ensure_submitter(&self, hunter_id: &str) -> Result<()> {
        self.ensure_allows(BountyAction::Submit)?;
        if !self.is_hunter(hunter_id) {
            return Err(BountyError::Unauthorized(
                "only the assigned hunter can submit work".to_string(),
            ));
        }
        Ok(())
    }

    pub fn completed_by(&self, creator_id: &str) -> Result<Bounty> {
        self.ensure_allows(BountyAction::Complete)?;
        if !self.is_creator(creator_id) {
            return Err(BountyError::Unauthorized(
                "only the creator can complete a bounty".to_string(),
            ));
        }
        self.assigned_hunter()?;

        let mut next = self.clone();
        next.status = BountyStatus::Completed;
        Ok(next)
    }

    pub fn disputed_by(&self, creator_id: &str, reason: &str) -> Result<Bounty> {
        self.ensure_allows(BountyAction::Dispute)?;
        if !self.is_creator(creator_id) {
            return Err(BountyError::Unauthorized(
                "only the creator can raise a dispute".to_string(),
            ));
        }
        self.assigned_hunter()?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(BountyError::validation("dispute reason is required"));
        }

        let mut next = self.clone();
        next.status = BountyStatus::Disputed;
        next.dispute_reason = Some(reason.to_string());
        Ok(next)
    }

    /// Close a dispute in favour of `winner`. The caller is responsible for
    /// checking that it acts as the arbiter.
    pub fn resolved(&self, winner: &str, resolution: &str) -> Result<Bounty> {
        self.ensure_allows(BountyAction::Resolve)?;
        let hunter = self.assigned_hunter()?;
        if winner != self.creator_id && winner != hunter {
            return Err(BountyError::validation(format!(
                "winner {winner} is not a party to bounty {}",
                self.id
            )));
        }
        let resolution = resolution.trim();
        if resolution.is_empty() {
            return Err(BountyError::validation("dispute resolution is required"));
        }

        let mut next = self.clone();
        next.status = BountyStatus::Completed;
        next.dispute_winner = Some(winner.to_string());
        next.dispute_resolution = Some(resolution.to_string());
        next.resolved_at = Some(Utc::now());
        Ok(next)
    }

    pub fn ensure_commenter(&self, author_id: &str) -> Result<()> {
        if self.is_creator(author_id) || self.is_hunter(author_id) {
            Ok(())
        } else {
            Err(BountyError::Unauthorized(
                "only the creator or the assigned hunter can comment".to_string(),
            ))
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewBounty {
    pub external_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub reward: TokenAmount,
    pub creator_id: String,
    pub deadline: DateTime<Utc>,
    pub metadata_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Accepted,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Accepted => "accepted",
            SubmissionStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for SubmissionStatus {
    type Err = BountyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(SubmissionStatus::Pending),
            "accepted" => Ok(SubmissionStatus::Accepted),
            "rejected" => Ok(SubmissionStatus::Rejected),
            other => Err(BountyError::validation(format!(
                "unknown submission status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BountySubmission {
    pub id: i64,
    pub bounty_id: i64,
    pub hunter_id: String,
    pub content: String,
    pub content_hash: String,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub bounty_id: i64,
    pub hunter_id: String,
    pub content: String,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BountyComment {
    pub id: i64,
    pub bounty_id: i64,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub bounty_id: i64,
    pub author_id: String,
    pub content: String,
}

/// Listing filter. Identity fields must already be canonical.
#[derive(Debug, Clone, Default)]
pub struct BountyFilter {
    pub creator_id: Option<String>,
    pub hunter_id: Option<String>,
    pub status: Option<BountyStatus>,
}

impl BountyFilter {
    pub fn matches(&self, bounty: &Bounty) -> bool {
        self.creator_id
            .as_deref()
            .map_or(true, |c| bounty.creator_id == c)
            && self
                .hunter_id
                .as_deref()
                .map_or(true, |h| bounty.hunter_id.as_deref() == Some(h))
            && self.status.map_or(true, |s| bounty.status == s)
    }
}
