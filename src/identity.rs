//! Wallet identity resolution
//!
//! Every identity that enters the system (actor, creator, hunter, dispute
//! winner, listing filters) goes through [`canonical_address`] before it is
//! compared or stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::database::Store;
use crate::error::{BountyError, Result};

const ADDRESS_HEX_LEN: usize = 40;

/// Lowercase, `0x`-prefixed, 40 hex digits.
pub fn canonical_address(raw: &str) -> Result<String> {
    let lowered = raw.trim().to_ascii_lowercase();
    let hex_part = lowered.strip_prefix("0x").unwrap_or(&lowered);

    if hex_part.len() != ADDRESS_HEX_LEN || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(BountyError::validation(format!(
            "invalid wallet address: {}",
            raw.trim()
        )));
    }

    Ok(format!("0x{hex_part}"))
}

/// Registered user. The id is the canonical wallet address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub address: String,
    pub username: Option<String>,
    pub bio: String,
    pub avatar: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(address: String) -> Self {
        Self {
            id: address.clone(),
            address,
            username: None,
            bio: String::new(),
            avatar: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

/// Profile fields a user may change about themselves
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

/// Maps bearer credentials to canonical user ids and provisions first-time
/// users together with their reputation record.
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn Store>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Parse an `Authorization` header value of the form `Bearer <wallet>`.
    pub fn parse_bearer(header: &str) -> Result<String> {
        let mut parts = header.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some("Bearer"), Some(wallet), None) => canonical_address(wallet).map_err(|_| {
                BountyError::Unauthorized("invalid wallet address format".to_string())
            }),
            _ => Err(BountyError::Unauthorized(
                "invalid authorization format".to_string(),
            )),
        }
    }

    /// Resolve a credential to a canonical user id, provisioning the user on
    /// first sight.
    pub async fn resolve(&self, authorization: &str) -> Result<String> {
        let address = Self::parse_bearer(authorization)?;
        self.provision(&address).await?;
        Ok(address)
    }

    /// Make sure the user and its reputation record exist. Both rows are
    /// written in one transaction.
    pub async fn provision(&self, address: &str) -> Result<User> {
        if let Some(user) = self.store.get_user(address).await? {
            return Ok(user);
        }

        let mut tx = self.store.begin().await?;
        let (user, created) = tx.ensure_user(address).await?;
        tx.commit().await?;

        if created {
            info!(user_id = %address, "Provisioned new user");
        } else {
            debug!(user_id = %address, "User provisioned concurrently");
        }
        Ok(user)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User> {
        let user_id = canonical_address(user_id)?;
        self.store
            .get_user(&user_id)
            .await?
            .ok_or_else(|| BountyError::not_found("user", &user_id))
    }

    /// Apply a profile update. Users may only edit themselves.
    pub async fn update_profile(
        &self,
        actor: &str,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<User> {
        let actor = canonical_address(actor)?;
        let user_id = canonical_address(user_id)?;
        if actor != user_id {
            return Err(BountyError::Unauthorized(
                "users can only update their own profile".to_string(),
            ));
        }

        let mut user = self.provision(&user_id).await?;
        if let Some(username) = update.username {
            let username = username.trim();
            if username.is_empty() || username.len() > 64 {
                return Err(BountyError::validation(
                    "username must be between 1 and 64 characters",
                ));
            }
            user.username = Some(username.to_string());
        }
        if let Some(bio) = update.bio {
            user.bio = bio;
        }
        if let Some(avatar) = update.avatar {
            user.avatar = avatar;
        }

        let mut tx = self.store.begin().await?;
        let saved = tx.update_user(&user).await?;
        tx.commit().await?;
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_address_lowercases_and_prefixes() {
        let mixed = "0xAbCdEf0123456789aBcDeF0123456789ABCDEF01";
        assert_eq!(
            canonical_address(mixed).unwrap(),
            "0xabcdef0123456789abcdef0123456789abcdef01"
        );
        let bare = "ABCDEF0123456789ABCDEF0123456789ABCDEF01";
        assert_eq!(
            canonical_address(bare).unwrap(),
            "0xabcdef0123456789abcdef0123456789abcdef01"
        );
        assert_eq!(
            canonical_address("  0XABCDEF0123456789ABCDEF0123456789ABCDEF01 ").unwrap(),
            "0xabcdef0123456789abcdef0123456789abcdef01"
        );
    }

    #[test]
    fn test_canonical_address_rejects_malformed() {
        assert!(canonical_address("").is_err());
        assert!(canonical_address("0x1234").is_err());
        assert!(canonical_address("0xzz00000000000000000000000000000000000000").is_err());
    }

    #[test]
    fn test_parse_bearer() {
        let addr = IdentityResolver::parse_bearer(
            "Bearer 0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
        )
        .unwrap();
        assert_eq!(addr, "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");

        assert!(matches!(
            IdentityResolver::parse_bearer("Basic abc"),
            Err(BountyError::Unauthorized(_))
        ));
        assert!(matches!(
            IdentityResolver::parse_bearer("Bearer not-a-wallet"),
            Err(BountyError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_provisions_user_and_reputation() {
        let store = Arc::new(crate::database::MemoryStore::new());
        let resolver = IdentityResolver::new(store.clone());

        let addr = resolver
            .resolve("Bearer 0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB")
            .await
            .unwrap();
        assert!(store.get_user(&addr).await.unwrap().is_some());
        let reputation = store.get_reputation(&addr).await.unwrap().unwrap();
        assert_eq!(reputation.score, 0);

        // second sight is a no-op
        let again = resolver.provision(&addr).await.unwrap();
        assert_eq!(again.id, addr);
    }

    #[tokio::test]
    async fn test_profile_updates_are_self_only() {
        let store = Arc::new(crate::database::MemoryStore::new());
        let resolver = IdentityResolver::new(store);
        let alice = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        let bob = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

        let update = ProfileUpdate {
            username: Some(" alice ".to_string()),
            ..Default::default()
        };
        let user = resolver.update_profile(alice, alice, update).await.unwrap();
        assert_eq!(user.username.as_deref(), Some("alice"));
        assert_eq!(resolver.get_user(alice).await.unwrap().username, user.username);

        let err = resolver
            .update_profile(bob, alice, ProfileUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BountyError::Unauthorized(_)));

        let taken = ProfileUpdate {
            username: Some("alice".to_string()),
            ..Default::default()
        };
        let err = resolver.update_profile(bob, bob, taken).await.unwrap_err();
        assert!(matches!(err, BountyError::Conflict { .. }));
    }
}
