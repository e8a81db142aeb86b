use super::{EngagementProfile, ProfileError, Result};
use crate::models::{InteractionEvent, Post};
use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Persistent profile store, keyed by user id. Owned by the external
/// persistence layer; this crate only uses the read/write contract.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, user_id: Uuid) -> Result<Option<EngagementProfile>>;
    async fn upsert(&self, user_id: Uuid, profile: &EngagementProfile) -> Result<()>;
}

/// Redis-backed store: JSON values under `user:{id}:profile` with a TTL.
pub struct RedisProfileStore {
    redis: redis::Client,
    ttl_secs: u64,
    key_prefix: String,
}

impl RedisProfileStore {
    pub fn new(redis: redis::Client, ttl_secs: u64) -> Self {
        Self {
            redis,
            ttl_secs,
            key_prefix: "user".to_string(),
        }
    }

    fn profile_key(&self, user_id: Uuid) -> String {
        format!("{}:{}:profile", self.key_prefix, user_id)
    }
}

#[async_trait]
impl ProfileStore for RedisProfileStore {
    async fn get(&self, user_id: Uuid) -> Result<Option<EngagementProfile>> {
        let mut conn = self
            .redis
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| ProfileError::StoreError(e.to_string()))?;

        let profile_json: Option<String> = conn
            .get(self.profile_key(user_id))
            .await
            .map_err(|e| ProfileError::StoreError(e.to_string()))?;

        match profile_json {
            Some(json) => {
                let profile = serde_json::from_str(&json)
                    .map_err(|e| ProfileError::InvalidData(e.to_string()))?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    async fn upsert(&self, user_id: Uuid, profile: &EngagementProfile) -> Result<()> {
        let mut conn = self
            .redis
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| ProfileError::StoreError(e.to_string()))?;

        let profile_json = serde_json::to_string(profile)
            .map_err(|e| ProfileError::InvalidData(e.to_string()))?;

        let _: () = conn
            .set_ex(self.profile_key(user_id), profile_json, self.ttl_secs)
            .await
            .map_err(|e| ProfileError::StoreError(e.to_string()))?;

        Ok(())
    }
}

/// In-memory store for tests and local development.
#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: DashMap<Uuid, EngagementProfile>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get(&self, user_id: Uuid) -> Result<Option<EngagementProfile>> {
        Ok(self.profiles.get(&user_id).map(|entry| entry.value().clone()))
    }

    async fn upsert(&self, user_id: Uuid, profile: &EngagementProfile) -> Result<()> {
        self.profiles.insert(user_id, profile.clone());
        Ok(())
    }
}

/// Read side and write side of the profile contract.
///
/// Reads degrade to the default profile (missing data is never an error);
/// writes are plain read-modify-write with last-write-wins semantics.
/// Concurrent updates to the same profile converge eventually, which is an
/// accepted trade-off for a personalization signal.
pub struct ProfileService {
    store: Arc<dyn ProfileStore>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    /// Stored profile, or an owned copy of the default for users with none.
    pub async fn get_or_default(&self, user_id: Uuid) -> EngagementProfile {
        match self.store.get(user_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => EngagementProfile::default(),
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    error = %e,
                    "Profile load failed, falling back to default"
                );
                EngagementProfile::default()
            }
        }
    }

    /// Fold an interaction into the stored profile. Anonymous interactions
    /// carry no user id and update nothing here; their session-keyed rows
    /// live upstream.
    pub async fn record_interaction(
        &self,
        post: &Post,
        interaction: &InteractionEvent,
    ) -> Result<()> {
        let Some(user_id) = interaction.user_id else {
            debug!(post_id = %interaction.post_id, "Anonymous interaction, no profile update");
            return Ok(());
        };

        let current = self.get_or_default(user_id).await;
        let updated = current.apply_interaction(post, interaction);
        self.store.upsert(user_id, &updated).await?;

        info!(
            user_id = %user_id,
            post_id = %post.id,
            team = %post.team_slug,
            read_time_seconds = interaction.read_time_seconds,
            "Profile updated from interaction"
        );

        Ok(())
    }
}
