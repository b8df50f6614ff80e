//! Bounty Ledger
//!
//! Coordinates the lifecycle of bounties (create, claim, submit, complete,
//! dispute, resolve) and credits the winning hunter with reputation points
//! and milestone badges in the same transaction that completes the bounty.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Server entrypoint
//! ├── config.rs      - Configuration management
//! ├── error.rs       - Domain error type
//! ├── identity.rs    - Wallet addresses, users, bearer resolution
//! ├── bounty/        - Bounty lifecycle
//! │   ├── amount.rs    - Fixed-point token amounts
//! │   ├── model.rs     - Bounties, submissions, comments, state machine
//! │   ├── lifecycle.rs - LifecycleManager
//! │   └── dispute.rs   - DisputeResolver
//! ├── reputation/    - Reputation ledger
//! │   ├── score.rs   - Scores, levels, badges
//! │   ├── ledger.rs  - Transactional score updates
//! │   └── badges.rs  - Milestone catalogue and BadgeEngine
//! ├── content/       - Content-addressed blob storage (IPFS, memory)
//! ├── database/      - Store contract, PostgreSQL and in-memory backends
//! └── api/           - HTTP API endpoints and middleware
//! ```

pub mod api;
pub mod bounty;
pub mod config;
pub mod content;
pub mod database;
pub mod error;
pub mod identity;
pub mod reputation;

// Re-export main types for convenience
pub use bounty::{
    Bounty, BountyComment, BountyFilter, BountyStatus, BountySubmission, Completion, CreateBounty,
    DisputeResolver, LifecycleManager, SubmissionStatus, TokenAmount,
};
pub use config::AppConfig;
pub use content::{ContentStore, IpfsContentStore, MemoryContentStore};
pub use database::{DatabasePool, FailPoint, MemoryStore, Store, StoreTransaction};
pub use error::{BountyError, Result};
pub use identity::{IdentityResolver, ProfileUpdate, User};
pub use reputation::{Badge, BadgeEngine, Ledger, Milestone, MilestoneCatalogue, Reputation};
