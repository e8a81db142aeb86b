use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Post format, a closed enumeration.
///
/// Unknown formats from upstream fail deserialization rather than silently
/// creating a new preference bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Article,
    Video,
    Analysis,
    Podcast,
    Gallery,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Article => "article",
            ContentType::Video => "video",
            ContentType::Analysis => "analysis",
            ContentType::Podcast => "podcast",
            ContentType::Gallery => "gallery",
        }
    }

    /// All known formats, in a fixed order.
    pub fn all() -> [ContentType; 5] {
        [
            ContentType::Article,
            ContentType::Video,
            ContentType::Analysis,
            ContentType::Podcast,
            ContentType::Gallery,
        ]
    }
}

/// Published post as supplied by the post store (read-only here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    /// Editorial baseline quality signal in [0, 100]; absent means neutral.
    pub importance_score: Option<f32>,
    pub published_at: DateTime<Utc>,
    pub team_slug: String,
    /// Precomputed by the post store from a 7-day view-count query.
    pub is_trending: bool,
    pub content_type: ContentType,
    pub primary_topic: Option<String>,
    pub author_id: Option<Uuid>,
    pub views: u64,
    /// Editor-pick slot (1..=6) when the post is manually pinned.
    pub pinned_slot: Option<u8>,
}

/// Per-term score components for one candidate.
///
/// Personalized and anonymous paths fill different subsets; unused terms
/// stay at zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreBreakdown {
    pub base: f32,
    pub recency_decay: f32,
    pub team_affinity: f32,
    pub trending_boost: f32,
    pub unseen_bonus: f32,
    pub content_type_boost: f32,
    pub author_affinity: f32,
    pub fatigue_penalty: f32,
    pub views_boost: f32,
}

impl ScoreBreakdown {
    /// Final score: sum of all terms, rounded to the nearest integer.
    /// No floor or ceiling is applied; the total can go negative.
    pub fn total(&self) -> i32 {
        (self.base
            + self.recency_decay
            + self.team_affinity
            + self.trending_boost
            + self.unseen_bonus
            + self.content_type_boost
            + self.author_affinity
            + self.fatigue_penalty
            + self.views_boost)
            .round() as i32
    }
}

/// Candidate post with its computed score.
#[derive(Debug, Clone)]
pub struct RankedPost {
    pub post: Post,
    pub score: i32,
    pub breakdown: ScoreBreakdown,
}

/// Behavioral signal produced by the client-side tracker and consumed by the
/// profile store. `session_id` is the join key between the click event and
/// the later unmount update when no authenticated user id is available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub user_id: Option<Uuid>,
    pub post_id: Uuid,
    pub session_id: String,
    pub clicked: bool,
    pub read_time_seconds: u32,
    pub scroll_depth_percent: u8,
}

/// Counters emitted with each assembled feed.
#[derive(Debug, Clone, Default)]
pub struct FeedStats {
    pub editor_pick_count: i32,
    pub trending_marked_count: i32,
    pub scored_count: i32,
    pub final_count: i32,
}
