//! Milestone badges
//!
//! A badge is awarded once per (user, milestone) when the score first
//! reaches the milestone threshold. The store's unique constraint is the
//! final guard; the engine only tries to avoid needless inserts.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::content::ContentStore;
use crate::database::{Store, StoreTransaction};
use crate::error::Result;
use crate::identity::canonical_address;
use crate::reputation::{Badge, NewBadge, Reputation};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Milestone {
    pub name: String,
    pub threshold: i64,
    pub description: String,
}

impl Milestone {
    pub fn new(name: &str, threshold: i64) -> Self {
        Self {
            name: name.to_string(),
            threshold,
            description: format!("Awarded for reaching {threshold} reputation points"),
        }
    }

    pub fn reached_by(&self, reputation: &Reputation) -> bool {
        reputation.score >= self.threshold
    }
}

/// Unordered set of milestones
#[derive(Debug, Clone)]
pub struct MilestoneCatalogue {
    milestones: HashSet<Milestone>,
}

impl Default for MilestoneCatalogue {
    fn default() -> Self {
        Self::new([
            Milestone::new("Novice Hunter", 100),
            Milestone::new("Skilled Hunter", 500),
            Milestone::new("Expert Hunter", 1000),
            Milestone::new("Legendary Hunter", 5000),
        ])
    }
}

impl MilestoneCatalogue {
    pub fn new(milestones: impl IntoIterator<Item = Milestone>) -> Self {
        Self {
            milestones: milestones.into_iter().collect(),
        }
    }

    pub fn reached<'a>(&'a self, reputation: &'a Reputation) -> impl Iterator<Item = &'a Milestone> {
        self.milestones.iter().filter(move |m| m.reached_by(reputation))
    }

    pub fn len(&self) -> usize {
        self.milestones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.milestones.is_empty()
    }
}

/// Document published as a badge's external proof
#[derive(Serialize)]
struct BadgeProof<'a> {
    user_id: &'a str,
    badge: &'a str,
    description: &'a str,
    threshold: i64,
    score: i64,
    awarded_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct BadgeEngine {
    store: Arc<dyn Store>,
    catalogue: MilestoneCatalogue,
    /// Where proof documents go; without one badges carry no proof_uri
    content: Option<Arc<dyn ContentStore>>,
}

impl BadgeEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_catalogue(store, MilestoneCatalogue::default())
    }

    pub fn with_catalogue(store: Arc<dyn Store>, catalogue: MilestoneCatalogue) -> Self {
        Self {
            store,
            catalogue,
            content: None,
        }
    }

    pub fn with_content_store(mut self, content: Arc<dyn ContentStore>) -> Self {
        self.content = Some(content);
        self
    }

    pub fn catalogue(&self) -> &MilestoneCatalogue {
        &self.catalogue
    }

    /// Award every reached milestone in one transaction. Returns the
    /// badges this call created.
    pub async fn check_and_award(
        &self,
        user_id: &str,
        reputation: &Reputation,
    ) -> Result<Vec<Badge>> {
        let user_id = canonical_address(user_id)?;
        let mut tx = self.store.begin().await?;
        tx.ensure_user(&user_id).await?;
        let awarded = self.award_in(tx.as_mut(), &user_id, reputation).await?;
        tx.commit().await?;
        Ok(awarded)
    }

    /// Same as [`check_and_award`](Self::check_and_award) inside a
    /// caller-owned transaction.
    pub async fn award_in(
        &self,
        tx: &mut dyn StoreTransaction,
        user_id: &str,
        reputation: &Reputation,
    ) -> Result<Vec<Badge>> {
        let mut awarded = Vec::new();

        for milestone in self.catalogue.reached(reputation) {
            if tx.find_badge(user_id, &milestone.name).await?.is_some() {
                continue;
            }

            let badge = NewBadge {
                user_id: user_id.to_string(),
                name: milestone.name.clone(),
                description: milestone.description.clone(),
                proof_uri: self.publish_proof(user_id, milestone, reputation).await,
            };
            match tx.insert_badge(&badge).await? {
                Some(badge) => {
                    info!(
                        user_id = %user_id,
                        badge = %badge.name,
                        score = reputation.score,
                        "Badge awarded"
                    );
                    awarded.push(badge);
                }
                None => {
                    debug!(user_id = %user_id, badge = %milestone.name, "Badge already awarded");
                }
            }
        }

        Ok(awarded)
    }

    /// Upload the proof document. Failure leaves the badge without one.
    async fn publish_proof(
        &self,
        user_id: &str,
        milestone: &Milestone,
        reputation: &Reputation,
    ) -> Option<String> {
        let content = self.content.as_ref()?;
        let proof = BadgeProof {
            user_id,
            badge: &milestone.name,
            description: &milestone.description,
            threshold: milestone.threshold,
            score: reputation.score,
            awarded_at: Utc::now(),
        };
        let bytes = match serde_json::to_vec(&proof) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Failed to encode badge proof");
                return None;
            }
        };
        match content.put(bytes).await {
            Ok(handle) => Some(content.uri(&handle)),
            Err(e) => {
                warn!(user_id = %user_id, badge = %milestone.name, error = %e, "Badge proof upload failed");
                None
            }
        }
    }
}
