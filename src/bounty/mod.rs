//! Bounties: records, the lifecycle state machine and dispute resolution
//!
//! ```text
//!   open ──claim──► claimed ──complete──► completed
//!                      │  ▲                   ▲
//!                submit└──┘                   │
//!                      │                      │
//!                      └──dispute──► disputed ┘ resolve (arbiter)
//! ```

pub mod amount;
pub mod dispute;
pub mod lifecycle;
pub mod model;

pub use amount::{ParseAmountError, TokenAmount, BASE_UNIT, TOKEN_DECIMALS};
pub use dispute::DisputeResolver;
pub use lifecycle::{Award, Completion, CreateBounty, LifecycleManager};
pub use model::{
    Bounty, BountyAction, BountyComment, BountyFilter, BountyStatus, BountySubmission, NewBounty,
    NewComment, NewSubmission, SubmissionStatus,
};
