pub mod config;
pub mod models;
pub mod services;

pub use config::Config;
pub use models::{ContentType, FeedStats, InteractionEvent, Post, RankedPost};
pub use services::{
    EngagementProfile, FeedAssembler, FeedViewer, InteractionSink, PostSource, ProfileService,
    ProfileStore, ScoringContext, SessionStore, ViewTracker,
};
