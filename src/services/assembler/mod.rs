// ============================================
// Feed Assembler
// ============================================
//
// Orchestrates the final ordered feed for one viewer:
// 1. Load the viewer's engagement profile (default if none)
// 2. Fetch editor picks, the trending pool, and recent candidates
// 3. Mark trending candidates (the pool never injects posts on its own)
// 4. Score every candidate and sort descending
// 5. Backfill from non-empty pools when others come back empty
// 6. Pin editor picks to slots 1..=6, then append the ranked pool
//
// Pool fetches and the profile read are soft dependencies: any failure
// degrades that input to empty/default with a warning, never an error.

use crate::config::FeedConfig;
use crate::models::{FeedStats, Post, RankedPost};
use crate::services::profile::ProfileService;
use crate::services::scoring::{score_post, ScoringContext};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Read-only post store boundary.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Most recent published posts, newest first.
    async fn fetch_candidate_posts(&self, limit: usize) -> Result<Vec<Post>>;
    /// Manually pinned posts for slots 1..=6.
    async fn fetch_editor_picks(&self) -> Result<Vec<Post>>;
    /// Top posts by views over a trailing 7-day window.
    async fn fetch_trending_pool(&self) -> Result<Vec<Post>>;
}

/// Backfill policy applied when one or more pools are empty. Must be
/// idempotent and total: applying it twice changes nothing, and it never
/// fails. The feed stays non-empty as long as any pool has content.
pub trait FallbackPolicy: Send + Sync {
    fn backfill(
        &self,
        editor_picks: Vec<Post>,
        ranked: Vec<RankedPost>,
        trending: Vec<Post>,
    ) -> (Vec<Post>, Vec<RankedPost>, Vec<Post>);
}

/// Default backfill: when both editor picks and the ranked pool are empty,
/// promote the trending pool (already views-desc) into the ranked list.
/// Everything else passes through untouched.
pub struct DefaultFallback;

impl FallbackPolicy for DefaultFallback {
    fn backfill(
        &self,
        editor_picks: Vec<Post>,
        ranked: Vec<RankedPost>,
        trending: Vec<Post>,
    ) -> (Vec<Post>, Vec<RankedPost>, Vec<Post>) {
        if editor_picks.is_empty() && ranked.is_empty() && !trending.is_empty() {
            let promoted = trending
                .iter()
                .cloned()
                .map(|post| RankedPost {
                    post,
                    score: 0,
                    breakdown: Default::default(),
                })
                .collect();
            return (editor_picks, promoted, trending);
        }
        (editor_picks, ranked, trending)
    }
}

/// The viewer a feed is assembled for.
#[derive(Debug, Clone)]
pub struct FeedViewer {
    pub user_id: Option<Uuid>,
    /// Post ids already seen this session.
    pub viewed_post_ids: HashSet<Uuid>,
}

impl FeedViewer {
    pub fn logged_in(user_id: Uuid, viewed_post_ids: HashSet<Uuid>) -> Self {
        Self {
            user_id: Some(user_id),
            viewed_post_ids,
        }
    }

    pub fn anonymous(viewed_post_ids: HashSet<Uuid>) -> Self {
        Self {
            user_id: None,
            viewed_post_ids,
        }
    }
}

pub struct FeedAssembler {
    source: Arc<dyn PostSource>,
    profiles: ProfileService,
    fallback: Box<dyn FallbackPolicy>,
    config: FeedConfig,
}

impl FeedAssembler {
    pub fn new(source: Arc<dyn PostSource>, profiles: ProfileService, config: FeedConfig) -> Self {
        Self {
            source,
            profiles,
            fallback: Box::new(DefaultFallback),
            config,
        }
    }

    /// Swap in a collaborator-supplied backfill policy.
    pub fn with_fallback(mut self, fallback: Box<dyn FallbackPolicy>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Assemble the ordered feed for one request.
    pub async fn assemble(&self, viewer: &FeedViewer) -> Result<(Vec<Post>, FeedStats)> {
        let now = Utc::now();
        let ctx = match viewer.user_id {
            Some(user_id) => ScoringContext::for_user(
                self.profiles.get_or_default(user_id).await,
                viewer.viewed_post_ids.clone(),
                now,
            ),
            None => ScoringContext::anonymous(viewer.viewed_post_ids.clone(), now),
        };

        let (picks, trending, candidates) = tokio::join!(
            self.source.fetch_editor_picks(),
            self.source.fetch_trending_pool(),
            self.source.fetch_candidate_posts(self.config.candidate_limit),
        );
        let picks = pool_or_empty(picks, "editor_picks");
        let trending = pool_or_empty(trending, "trending");
        let mut candidates = pool_or_empty(candidates, "candidates");
        candidates.truncate(self.config.candidate_limit);

        let mut stats = FeedStats {
            editor_pick_count: picks.len() as i32,
            ..Default::default()
        };

        // Trending pool only flags matching candidates; it does not add posts.
        let trending_ids: HashSet<Uuid> = trending.iter().map(|post| post.id).collect();
        for candidate in &mut candidates {
            if trending_ids.contains(&candidate.id) {
                candidate.is_trending = true;
                stats.trending_marked_count += 1;
            }
        }

        stats.scored_count = candidates.len() as i32;
        let ranked = self.rank(candidates, &ctx);

        let (picks, ranked, _trending) = self.fallback.backfill(picks, ranked, trending);

        // Editor picks hold slots 1..=N ascending, unconditionally.
        let mut picks = picks;
        picks.sort_by_key(|post| post.pinned_slot.unwrap_or(u8::MAX));
        let pinned: Vec<Post> = picks
            .into_iter()
            .take(self.config.editor_pick_slots as usize)
            .collect();
        let pinned_ids: HashSet<Uuid> = pinned.iter().map(|post| post.id).collect();

        let mut feed = pinned;
        feed.extend(
            ranked
                .into_iter()
                .filter(|ranked| !pinned_ids.contains(&ranked.post.id))
                .map(|ranked| ranked.post),
        );
        stats.final_count = feed.len() as i32;

        info!(
            user_id = ?viewer.user_id,
            editor_picks = stats.editor_pick_count,
            trending_marked = stats.trending_marked_count,
            scored = stats.scored_count,
            final_count = stats.final_count,
            "Feed assembled"
        );

        Ok((feed, stats))
    }

    /// Score candidates and sort descending. The sort is stable and the
    /// candidates arrive newest-first, so equal scores keep most-recent-first
    /// order (the documented tie-break).
    fn rank(&self, candidates: Vec<Post>, ctx: &ScoringContext) -> Vec<RankedPost> {
        let mut ranked: Vec<RankedPost> = candidates
            .into_iter()
            .map(|post| {
                let (score, breakdown) = score_post(&post, ctx);
                RankedPost {
                    post,
                    score,
                    breakdown,
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.score.cmp(&a.score));
        ranked
    }
}

fn pool_or_empty(result: Result<Vec<Post>>, pool: &'static str) -> Vec<Post> {
    match result {
        Ok(posts) => posts,
        Err(e) => {
            warn!(pool = pool, error = %e, "Pool fetch failed, continuing with empty pool");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentType;
    use crate::services::profile::InMemoryProfileStore;
    use anyhow::anyhow;
    use chrono::Duration;

    struct StubPostSource {
        candidates: Vec<Post>,
        editor_picks: Vec<Post>,
        trending: Vec<Post>,
        fail_candidates: bool,
    }

    impl StubPostSource {
        fn new() -> Self {
            Self {
                candidates: Vec::new(),
                editor_picks: Vec::new(),
                trending: Vec::new(),
                fail_candidates: false,
            }
        }
    }

    #[async_trait]
    impl PostSource for StubPostSource {
        async fn fetch_candidate_posts(&self, limit: usize) -> Result<Vec<Post>> {
            if self.fail_candidates {
                return Err(anyhow!("post store unreachable"));
            }
            Ok(self.candidates.iter().take(limit).cloned().collect())
        }

        async fn fetch_editor_picks(&self) -> Result<Vec<Post>> {
            Ok(self.editor_picks.clone())
        }

        async fn fetch_trending_pool(&self) -> Result<Vec<Post>> {
            Ok(self.trending.clone())
        }
    }

    fn test_post(importance: f32, hours_ago: i64) -> Post {
        Post {
            id: Uuid::new_v4(),
            importance_score: Some(importance),
            published_at: Utc::now() - Duration::hours(hours_ago),
            team_slug: "bears".to_string(),
            is_trending: false,
            content_type: ContentType::Article,
            primary_topic: None,
            author_id: None,
            views: 0,
            pinned_slot: None,
        }
    }

    fn assembler(source: StubPostSource) -> FeedAssembler {
        FeedAssembler::new(
            Arc::new(source),
            ProfileService::new(Arc::new(InMemoryProfileStore::new())),
            FeedConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_empty_picks_feed_is_ranked_pool_in_score_order() {
        let mut source = StubPostSource::new();
        source.candidates = vec![
            test_post(20.0, 1),
            test_post(90.0, 1),
            test_post(55.0, 1),
        ];
        let expected_order = [
            source.candidates[1].id,
            source.candidates[2].id,
            source.candidates[0].id,
        ];

        let (feed, stats) = assembler(source)
            .assemble(&FeedViewer::anonymous(HashSet::new()))
            .await
            .unwrap();

        assert_eq!(stats.editor_pick_count, 0);
        let ids: Vec<Uuid> = feed.iter().map(|p| p.id).collect();
        assert_eq!(ids, expected_order);
    }

    #[tokio::test]
    async fn test_editor_picks_pinned_ascending_regardless_of_score() {
        let mut source = StubPostSource::new();
        source.candidates = vec![test_post(99.0, 1)];

        let mut pick_a = test_post(1.0, 100);
        pick_a.pinned_slot = Some(2);
        let mut pick_b = test_post(1.0, 100);
        pick_b.pinned_slot = Some(1);
        source.editor_picks = vec![pick_a.clone(), pick_b.clone()];

        let (feed, _) = assembler(source)
            .assemble(&FeedViewer::anonymous(HashSet::new()))
            .await
            .unwrap();

        assert_eq!(feed[0].id, pick_b.id);
        assert_eq!(feed[1].id, pick_a.id);
        assert_eq!(feed.len(), 3);
    }

    #[tokio::test]
    async fn test_trending_pool_marks_candidates_without_injecting() {
        let mut source = StubPostSource::new();
        let candidate = test_post(50.0, 1);
        source.candidates = vec![candidate.clone()];
        // One overlapping id, one trending post not in the candidate set.
        source.trending = vec![candidate.clone(), test_post(50.0, 1)];

        let (feed, stats) = assembler(source)
            .assemble(&FeedViewer::anonymous(HashSet::new()))
            .await
            .unwrap();

        assert_eq!(stats.trending_marked_count, 1);
        assert_eq!(feed.len(), 1);
        assert!(feed[0].is_trending);
    }

    #[tokio::test]
    async fn test_trending_backfills_when_other_pools_empty() {
        let mut source = StubPostSource::new();
        source.trending = vec![test_post(50.0, 1), test_post(40.0, 2)];
        let expected: Vec<Uuid> = source.trending.iter().map(|p| p.id).collect();

        let (feed, _) = assembler(source)
            .assemble(&FeedViewer::anonymous(HashSet::new()))
            .await
            .unwrap();

        let ids: Vec<Uuid> = feed.iter().map(|p| p.id).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_failed_pool_degrades_to_empty() {
        let mut source = StubPostSource::new();
        source.fail_candidates = true;
        let mut pick = test_post(10.0, 1);
        pick.pinned_slot = Some(1);
        source.editor_picks = vec![pick.clone()];

        let (feed, _) = assembler(source)
            .assemble(&FeedViewer::anonymous(HashSet::new()))
            .await
            .unwrap();

        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].id, pick.id);
    }

    #[tokio::test]
    async fn test_pinned_post_not_duplicated_in_ranked_section() {
        let mut source = StubPostSource::new();
        let mut pick = test_post(80.0, 1);
        pick.pinned_slot = Some(1);
        source.editor_picks = vec![pick.clone()];
        source.candidates = vec![pick.clone(), test_post(30.0, 1)];

        let (feed, _) = assembler(source)
            .assemble(&FeedViewer::anonymous(HashSet::new()))
            .await
            .unwrap();

        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].id, pick.id);
    }

    #[tokio::test]
    async fn test_equal_scores_keep_input_order() {
        let mut source = StubPostSource::new();
        // Identical in every scoring input; input order is newest-first.
        source.candidates = vec![test_post(50.0, 1), test_post(50.0, 2), test_post(50.0, 3)];
        let expected: Vec<Uuid> = source.candidates.iter().map(|p| p.id).collect();

        let (feed, _) = assembler(source)
            .assemble(&FeedViewer::anonymous(HashSet::new()))
            .await
            .unwrap();

        let ids: Vec<Uuid> = feed.iter().map(|p| p.id).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_default_fallback_is_idempotent() {
        let trending = vec![test_post(50.0, 1)];
        let fallback = DefaultFallback;

        let (picks, ranked, trending) =
            fallback.backfill(Vec::new(), Vec::new(), trending);
        assert_eq!(ranked.len(), 1);

        let (picks2, ranked2, _) = fallback.backfill(picks, ranked, trending);
        assert!(picks2.is_empty());
        assert_eq!(ranked2.len(), 1);
    }

    #[tokio::test]
    async fn test_editor_slots_capped() {
        let mut source = StubPostSource::new();
        for slot in 1..=8u8 {
            let mut pick = test_post(10.0, 1);
            pick.pinned_slot = Some(slot);
            source.editor_picks.push(pick);
        }

        let (feed, _) = assembler(source)
            .assemble(&FeedViewer::anonymous(HashSet::new()))
            .await
            .unwrap();

        assert_eq!(feed.len(), 6);
    }
}
