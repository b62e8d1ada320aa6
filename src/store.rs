// Store traits - every read and write the engines perform goes through these
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::StoreResult;
use crate::models::{
    DigestUser, FriendTrips, LeaderboardCandidate, LeaderboardCategory, LeaderboardSnapshot,
    Role, UserId, ViewStats,
};

#[cfg(test)]
pub mod memory;

/// Read-only access to users and their social graph.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Profile-complete users, optionally restricted to a professional role
    async fn leaderboard_candidates(
        &self,
        role: Option<Role>,
    ) -> StoreResult<Vec<LeaderboardCandidate>>;

    async fn digest_user(&self, id: UserId) -> StoreResult<Option<DigestUser>>;

    /// Likes received at or after `since`; likes without a timestamp never count
    async fn new_like_count(&self, id: UserId, since: DateTime<Utc>) -> StoreResult<i64>;

    async fn total_like_count(&self, id: UserId) -> StoreResult<i64>;

    /// Trips starting on or after `today`, grouped per friend
    async fn friends_upcoming_trips(
        &self,
        friend_ids: &[UserId],
        today: NaiveDate,
    ) -> StoreResult<Vec<FriendTrips>>;

    async fn active_digest_recipients(
        &self,
        admin_email: Option<&str>,
        logged_in_since: DateTime<Utc>,
    ) -> StoreResult<Vec<UserId>>;
}

#[async_trait]
pub trait ProfileViewStore: Send + Sync {
    async fn weekly_view_stats(&self, id: UserId, since: DateTime<Utc>) -> StoreResult<ViewStats>;
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Insert or replace the snapshot for `(category, day)`
    async fn upsert_snapshot(&self, snapshot: &LeaderboardSnapshot) -> StoreResult<()>;

    /// Most recent snapshot with `from <= taken_at <= to`
    async fn latest_between(
        &self,
        category: LeaderboardCategory,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Option<LeaderboardSnapshot>>;

    /// Most recent snapshot with `taken_at < before`
    async fn latest_before(
        &self,
        category: LeaderboardCategory,
        before: DateTime<Utc>,
    ) -> StoreResult<Option<LeaderboardSnapshot>>;

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;
}
