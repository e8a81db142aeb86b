// ============================================
// Scoring Engine
// ============================================
//
// Pure multi-factor score for feed candidates.
//
// Logged-in terms:
// - Importance baseline (editorial quality signal)
// - Recency decay (flat penalty after 6h, superlinear after 24h, capped)
// - Team affinity (engagement profile, max +20)
// - Trending boost (+10)
// - Unseen-in-session bonus (+5)
// - Format preference vs the neutral 1/3 baseline
// - Author affinity (step function over read counts)
// - Topic fatigue penalty (same-day oversaturation)
//
// Anonymous viewers get baseline + recency + trending plus a log-scaled
// popularity boost instead of any personalization term.

use crate::models::{Post, ScoreBreakdown};
use crate::services::profile::EngagementProfile;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

/// Neutral importance when the post store supplies none.
const NEUTRAL_IMPORTANCE: f32 = 50.0;
/// Neutral format weight (balanced three-way default profile).
const NEUTRAL_FORMAT_WEIGHT: f32 = 0.33;
const TEAM_AFFINITY_FACTOR: f32 = 0.2;
const FORMAT_BOOST_FACTOR: f32 = 30.0;
const TRENDING_BOOST: f32 = 10.0;
const UNSEEN_BONUS: f32 = 5.0;
const MAX_RECENCY_PENALTY: f32 = 50.0;
const MAX_VIEWS_BOOST: f32 = 10.0;

/// Per-request scoring input. Constructed fresh for every feed request and
/// never persisted; `now` is injected so scoring stays deterministic.
#[derive(Debug, Clone)]
pub struct ScoringContext {
    pub profile: Option<EngagementProfile>,
    /// Post ids the viewer has already seen this session.
    pub viewed_post_ids: HashSet<Uuid>,
    pub logged_in: bool,
    pub now: DateTime<Utc>,
}

impl ScoringContext {
    pub fn for_user(
        profile: EngagementProfile,
        viewed_post_ids: HashSet<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            profile: Some(profile),
            viewed_post_ids,
            logged_in: true,
            now,
        }
    }

    pub fn anonymous(viewed_post_ids: HashSet<Uuid>, now: DateTime<Utc>) -> Self {
        Self {
            profile: None,
            viewed_post_ids,
            logged_in: false,
            now,
        }
    }

    fn is_personalized(&self) -> bool {
        self.logged_in && self.profile.is_some()
    }
}

/// Score one candidate against the viewer context.
///
/// Deterministic for a fixed `(post, context)`; safe to call concurrently.
pub fn score_post(post: &Post, ctx: &ScoringContext) -> (i32, ScoreBreakdown) {
    let breakdown = match (ctx.is_personalized(), ctx.profile.as_ref()) {
        (true, Some(profile)) => personalized_breakdown(post, profile, ctx),
        _ => anonymous_breakdown(post, ctx),
    };

    let score = breakdown.total();
    debug!(
        post_id = %post.id,
        base = breakdown.base,
        recency_decay = breakdown.recency_decay,
        team_affinity = breakdown.team_affinity,
        trending_boost = breakdown.trending_boost,
        unseen_bonus = breakdown.unseen_bonus,
        content_type_boost = breakdown.content_type_boost,
        author_affinity = breakdown.author_affinity,
        fatigue_penalty = breakdown.fatigue_penalty,
        views_boost = breakdown.views_boost,
        score = score,
        "Candidate scored"
    );

    (score, breakdown)
}

fn personalized_breakdown(
    post: &Post,
    profile: &EngagementProfile,
    ctx: &ScoringContext,
) -> ScoreBreakdown {
    let team_score = profile
        .team_scores
        .get(&post.team_slug)
        .copied()
        .unwrap_or(0.0);

    let format_pref = profile
        .format_prefs
        .get(&post.content_type)
        .copied()
        .unwrap_or(NEUTRAL_FORMAT_WEIGHT);

    let author_reads = post
        .author_id
        .and_then(|author| profile.author_reads.get(&author).copied())
        .unwrap_or(0);

    let topic_views = post
        .primary_topic
        .as_deref()
        .and_then(|topic| profile.topic_views_today.get(topic).copied())
        .unwrap_or(0);

    ScoreBreakdown {
        base: post.importance_score.unwrap_or(NEUTRAL_IMPORTANCE),
        recency_decay: recency_decay(hours_old(post, ctx.now)),
        team_affinity: team_score.round() * TEAM_AFFINITY_FACTOR,
        trending_boost: if post.is_trending { TRENDING_BOOST } else { 0.0 },
        unseen_bonus: if ctx.viewed_post_ids.contains(&post.id) {
            0.0
        } else {
            UNSEEN_BONUS
        },
        content_type_boost: ((format_pref - NEUTRAL_FORMAT_WEIGHT) * FORMAT_BOOST_FACTOR).round(),
        author_affinity: author_affinity(author_reads),
        fatigue_penalty: fatigue_penalty(topic_views),
        views_boost: 0.0,
    }
}

fn anonymous_breakdown(post: &Post, ctx: &ScoringContext) -> ScoreBreakdown {
    ScoreBreakdown {
        base: post.importance_score.unwrap_or(NEUTRAL_IMPORTANCE),
        recency_decay: recency_decay(hours_old(post, ctx.now)),
        trending_boost: if post.is_trending { TRENDING_BOOST } else { 0.0 },
        views_boost: views_boost(post.views),
        ..Default::default()
    }
}

/// Post age in hours. Future-dated posts (clock skew) clamp to 0 so the
/// decay term can never flip sign.
fn hours_old(post: &Post, now: DateTime<Utc>) -> f32 {
    let age_seconds = (now - post.published_at).num_seconds().max(0);
    age_seconds as f32 / 3600.0
}

/// 0 under 6h, flat -2 up to 24h, then a superlinear penalty capped at -50
/// so an old post's score never collapses to zero.
fn recency_decay(hours: f32) -> f32 {
    if hours < 6.0 {
        0.0
    } else if hours < 24.0 {
        -2.0
    } else {
        -((hours / 24.0).powf(1.3) * 4.0).min(MAX_RECENCY_PENALTY)
    }
}

/// Monotone step function over how many of this author's posts the viewer
/// has read. No author resolves to a count of 0.
fn author_affinity(read_count: u32) -> f32 {
    match read_count {
        0..=1 => 0.0,
        2..=4 => 4.0,
        5..=9 => 8.0,
        _ => 12.0,
    }
}

/// Suppresses topic oversaturation within a day.
fn fatigue_penalty(topic_views_today: u32) -> f32 {
    match topic_views_today {
        0..=3 => 0.0,
        4..=5 => -8.0,
        _ => -15.0,
    }
}

/// Log-scaled popularity signal for anonymous viewers, capped at +10.
fn views_boost(views: u64) -> f32 {
    (((views + 1) as f32).log10() * 3.0).min(MAX_VIEWS_BOOST)
}
