use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    pub redis: RedisConfig,
    pub tracker: TrackerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Most-recent published posts fetched for scoring.
    pub candidate_limit: usize,
    /// Pinned editor-pick slots at the top of the feed.
    pub editor_pick_slots: u8,
    /// Size of the precomputed 7-day trending pool.
    pub trending_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub profile_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Bound on each fire-and-forget interaction submit.
    pub submit_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        Ok(Config {
            feed: FeedConfig {
                candidate_limit: env::var("CANDIDATE_LIMIT")
                    .unwrap_or_else(|_| "200".to_string())
                    .parse()
                    .expect("CANDIDATE_LIMIT must be a valid usize"),
                editor_pick_slots: env::var("EDITOR_PICK_SLOTS")
                    .unwrap_or_else(|_| "6".to_string())
                    .parse()
                    .expect("EDITOR_PICK_SLOTS must be a valid u8"),
                trending_limit: env::var("TRENDING_LIMIT")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("TRENDING_LIMIT must be a valid usize"),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
                profile_ttl_secs: env::var("PROFILE_TTL_SECS")
                    .unwrap_or_else(|_| "86400".to_string())
                    .parse()
                    .expect("PROFILE_TTL_SECS must be a valid u64"),
            },
            tracker: TrackerConfig {
                submit_timeout_ms: env::var("TRACKER_TIMEOUT_MS")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .expect("TRACKER_TIMEOUT_MS must be a valid u64"),
            },
        })
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            candidate_limit: 200,
            editor_pick_slots: 6,
            trending_limit: 20,
        }
    }
}
