use crate::models::{ContentType, InteractionEvent, Post};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

/// Team slugs seeded into every fresh profile. Interactions with teams
/// outside this list are still accepted; they start at the unseen-team seed.
pub const KNOWN_TEAMS: [&str; 5] = ["bears", "bulls", "cubs", "white-sox", "blackhawks"];

/// Seed for the home team in a fresh profile.
const HOME_TEAM_SEED: f32 = 50.0;
/// Seed for every other team, and the starting value for a team first seen
/// through an interaction.
const UNSEEN_TEAM_SEED: f32 = 30.0;
const MAX_TEAM_SCORE: f32 = 100.0;

/// Reads longer than this count as an engaged read.
const ENGAGED_READ_SECS: u32 = 30;
const ENGAGED_TEAM_DELTA: f32 = 5.0;
const CASUAL_TEAM_DELTA: f32 = 3.0;

const FORMAT_PREF_STEP: f32 = 0.02;
/// Cap applied before renormalization so one format can never fully
/// crowd out the others.
const MAX_FORMAT_PREF: f32 = 0.6;

/// Per-user engagement profile, keyed by user id in the profile store.
/// Anonymous viewers have no profile at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementProfile {
    /// Team slug -> affinity in [0, 100].
    pub team_scores: HashMap<String, f32>,
    /// Format -> preference weight; invariant: weights sum to 1.0
    /// (renormalized after every update, not just at initialization).
    pub format_prefs: HashMap<ContentType, f32>,
    /// Author id -> read count, monotonic.
    pub author_reads: HashMap<Uuid, u32>,
    /// Topic -> views today. The day-boundary reset is owned by an external
    /// scheduled job; this crate only reads and increments.
    pub topic_views_today: HashMap<String, u32>,
}

impl Default for EngagementProfile {
    /// Balanced starting point for a user with no stored profile: equal
    /// weight on the three core formats, home team ahead of the rest.
    fn default() -> Self {
        let mut team_scores = HashMap::new();
        for team in KNOWN_TEAMS {
            let seed = if team == "bears" {
                HOME_TEAM_SEED
            } else {
                UNSEEN_TEAM_SEED
            };
            team_scores.insert(team.to_string(), seed);
        }

        let mut format_prefs = HashMap::new();
        format_prefs.insert(ContentType::Article, 1.0 / 3.0);
        format_prefs.insert(ContentType::Video, 1.0 / 3.0);
        format_prefs.insert(ContentType::Analysis, 1.0 / 3.0);

        Self {
            team_scores,
            format_prefs,
            author_reads: HashMap::new(),
            topic_views_today: HashMap::new(),
        }
    }
}

impl EngagementProfile {
    /// Fold one interaction into the profile, returning the updated copy.
    /// Copy-on-write: the receiver (which may be the shared default) is
    /// never mutated in place.
    pub fn apply_interaction(&self, post: &Post, interaction: &InteractionEvent) -> Self {
        let mut next = self.clone();

        // Team affinity: engaged reads move the needle faster, capped at 100.
        let delta = if interaction.read_time_seconds > ENGAGED_READ_SECS {
            ENGAGED_TEAM_DELTA
        } else {
            CASUAL_TEAM_DELTA
        };
        let team = next
            .team_scores
            .entry(post.team_slug.clone())
            .or_insert(UNSEEN_TEAM_SEED);
        *team = (*team + delta).min(MAX_TEAM_SCORE);

        // Format preference: small nudge toward the consumed format, capped,
        // then the whole map is renormalized to keep the sum-to-1 invariant.
        let pref = next.format_prefs.entry(post.content_type).or_insert(0.0);
        *pref = (*pref + FORMAT_PREF_STEP).min(MAX_FORMAT_PREF);
        next.renormalize_format_prefs();

        if let Some(author_id) = post.author_id {
            *next.author_reads.entry(author_id).or_insert(0) += 1;
        }

        if let Some(topic) = &post.primary_topic {
            *next.topic_views_today.entry(topic.clone()).or_insert(0) += 1;
        }

        next
    }

    /// Restore the sum-to-1.0 invariant on `format_prefs`. A zero total is
    /// left alone rather than divided through, so a degenerate map can never
    /// poison every future score with NaN weights.
    fn renormalize_format_prefs(&mut self) {
        let total: f32 = self.format_prefs.values().sum();
        if total <= f32::EPSILON {
            warn!("format preference weights sum to zero, skipping renormalization");
            return;
        }
        for weight in self.format_prefs.values_mut() {
            *weight /= total;
        }
        debug_assert!(
            (self.format_prefs.values().sum::<f32>() - 1.0).abs() < 1e-4,
            "format_prefs must sum to 1.0 after renormalization"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_post(team: &str, content_type: ContentType) -> Post {
        Post {
            id: Uuid::new_v4(),
            importance_score: None,
            published_at: Utc::now(),
            team_slug: team.to_string(),
            is_trending: false,
            content_type,
            primary_topic: Some("trade-rumors".to_string()),
            author_id: Some(Uuid::new_v4()),
            views: 0,
            pinned_slot: None,
        }
    }

    fn test_interaction(read_time_seconds: u32) -> InteractionEvent {
        InteractionEvent {
            user_id: Some(Uuid::new_v4()),
            post_id: Uuid::new_v4(),
            session_id: "session-1".to_string(),
            clicked: true,
            read_time_seconds,
            scroll_depth_percent: 80,
        }
    }

    #[test]
    fn test_default_profile_shape() {
        let profile = EngagementProfile::default();
        assert_eq!(profile.team_scores.get("bears"), Some(&50.0));
        assert_eq!(profile.team_scores.get("bulls"), Some(&30.0));
        let total: f32 = profile.format_prefs.values().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!(profile.author_reads.is_empty());
        assert!(profile.topic_views_today.is_empty());
    }

    #[test]
    fn test_engaged_read_moves_team_score_faster() {
        let profile = EngagementProfile::default();
        let post = test_post("bears", ContentType::Article);

        let casual = profile.apply_interaction(&post, &test_interaction(10));
        assert_eq!(casual.team_scores.get("bears"), Some(&53.0));

        let engaged = profile.apply_interaction(&post, &test_interaction(45));
        assert_eq!(engaged.team_scores.get("bears"), Some(&55.0));
    }

    #[test]
    fn test_unseen_team_starts_at_seed() {
        let profile = EngagementProfile::default();
        let post = test_post("fire", ContentType::Article);
        let updated = profile.apply_interaction(&post, &test_interaction(45));
        assert_eq!(updated.team_scores.get("fire"), Some(&35.0));
    }

    #[test]
    fn test_team_score_capped_at_100() {
        let mut profile = EngagementProfile::default();
        let post = test_post("bears", ContentType::Article);
        let interaction = test_interaction(60);
        for _ in 0..50 {
            profile = profile.apply_interaction(&post, &interaction);
        }
        assert_eq!(profile.team_scores.get("bears"), Some(&100.0));
    }

    #[test]
    fn test_format_prefs_stay_normalized() {
        let mut profile = EngagementProfile::default();
        let interaction = test_interaction(20);
        let posts = [
            test_post("bears", ContentType::Video),
            test_post("bulls", ContentType::Podcast),
            test_post("cubs", ContentType::Article),
        ];
        for i in 0..120 {
            profile = profile.apply_interaction(&posts[i % posts.len()], &interaction);
            let total: f32 = profile.format_prefs.values().sum();
            assert!((total - 1.0).abs() < 1e-4, "sum drifted to {total}");
        }
    }

    #[test]
    fn test_new_format_gets_a_bucket() {
        let profile = EngagementProfile::default();
        let post = test_post("bears", ContentType::Gallery);
        let updated = profile.apply_interaction(&post, &test_interaction(20));
        assert!(updated.format_prefs.get(&ContentType::Gallery).is_some());
    }

    #[test]
    fn test_zero_sum_prefs_skip_renormalization() {
        let mut profile = EngagementProfile::default();
        profile.format_prefs.clear();
        profile.format_prefs.insert(ContentType::Article, 0.0);
        profile.renormalize_format_prefs();
        // No NaN, no panic; the degenerate weight is left untouched.
        assert_eq!(profile.format_prefs.get(&ContentType::Article), Some(&0.0));
    }

    #[test]
    fn test_author_and_topic_counters() {
        let profile = EngagementProfile::default();
        let post = test_post("bears", ContentType::Article);
        let author = post.author_id.unwrap();

        let once = profile.apply_interaction(&post, &test_interaction(20));
        let twice = once.apply_interaction(&post, &test_interaction(20));
        assert_eq!(twice.author_reads.get(&author), Some(&2));
        assert_eq!(twice.topic_views_today.get("trade-rumors"), Some(&2));
    }

    #[test]
    fn test_apply_is_copy_on_write() {
        let profile = EngagementProfile::default();
        let post = test_post("bears", ContentType::Article);
        let _ = profile.apply_interaction(&post, &test_interaction(45));
        assert_eq!(profile, EngagementProfile::default());
    }

    #[test]
    fn test_missing_author_and_topic_are_not_errors() {
        let profile = EngagementProfile::default();
        let mut post = test_post("bears", ContentType::Article);
        post.author_id = None;
        post.primary_topic = None;
        let updated = profile.apply_interaction(&post, &test_interaction(20));
        assert!(updated.author_reads.is_empty());
        assert!(updated.topic_views_today.is_empty());
    }
}
