// ============================================
// Engagement Profile Module
// ============================================
//
// Per-user behavioral state consumed by the scoring engine:
// 1. Team affinity scores in [0, 100]
// 2. Format preference weights (always renormalized to sum to 1.0)
// 3. Per-author read counts
// 4. Same-day topic view counts (reset by an external nightly job)
//
// The profile store is the only shared mutable resource in this crate.
// Writes are last-write-wins by design: staleness in a personalization
// signal degrades UX, it does not break correctness.

pub mod engagement;
pub mod store;

pub use engagement::EngagementProfile;
pub use store::{InMemoryProfileStore, ProfileService, ProfileStore, RedisProfileStore};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, ProfileError>;
