//! Persistence
//!
//! [`Store`] is the transactional contract. [`DatabasePool`] implements it
//! on PostgreSQL and [`MemoryStore`] in process.

pub mod bounties;
pub mod memory;
pub mod pool;
pub mod reputation;
pub mod store;
pub mod users;

pub use memory::{FailPoint, MemoryStore};
pub use pool::{DatabasePool, PgTransaction};
pub use store::{Store, StoreTransaction};
