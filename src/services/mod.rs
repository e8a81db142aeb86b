pub mod assembler;
pub mod profile;
pub mod scoring;
pub mod tracker;

pub use assembler::{FeedAssembler, FeedViewer, PostSource};
pub use profile::{EngagementProfile, ProfileService, ProfileStore};
pub use scoring::{score_post, ScoringContext};
pub use tracker::{InteractionSink, SessionStore, ViewTracker};
