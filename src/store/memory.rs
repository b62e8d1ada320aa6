use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{
    CityId, CityRef, DateRange, DigestUser, FriendTrips, LeaderboardCandidate, LeaderboardCategory,
    LeaderboardSnapshot, Placement, RecentViewer, Role, Trip, UserId, ViewStats,
};
use crate::store::{ProfileViewStore, SnapshotStore, UserStore};

pub fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn city_uuid(name: &str) -> Uuid {
    let mut bytes = [0u8; 16];
    for (slot, byte) in bytes.iter_mut().zip(name.bytes()) {
        *slot = byte;
    }
    Uuid::from_bytes(bytes)
}

pub fn city(name: &str) -> CityRef {
    CityRef {
        id: CityId(city_uuid(name)),
        name: name.to_string(),
    }
}

pub fn trip(city_name: &str, start: NaiveDate, end: NaiveDate) -> Trip {
    Trip {
        city: city(city_name),
        dates: DateRange::new(start, end),
    }
}

#[derive(Debug, Clone)]
pub struct MemoryUser {
    pub id: UserId,
    pub name: String,
    pub username: String,
    pub email: Option<String>,
    pub is_profile_complete: bool,
    pub roles: Vec<Role>,
    pub last_login: Option<DateTime<Utc>>,
    pub liked_by: Vec<(UserId, Option<DateTime<Utc>>)>,
    pub friends: Vec<UserId>,
    pub trips: Vec<Trip>,
    pub placements: Vec<Placement>,
}

impl MemoryUser {
    pub fn new(name: &str) -> Self {
        let username = name.to_lowercase().replace(' ', ".");
        Self {
            id: UserId(Uuid::new_v4()),
            name: name.to_string(),
            email: Some(format!("{username}@dancetribe.test")),
            username,
            is_profile_complete: true,
            roles: Vec::new(),
            last_login: None,
            liked_by: Vec::new(),
            friends: Vec::new(),
            trips: Vec::new(),
            placements: Vec::new(),
        }
    }

    pub fn with_likes(mut self, count: usize) -> Self {
        self.liked_by = (0..count).map(|_| (UserId(Uuid::new_v4()), None)).collect();
        self
    }

    pub fn with_placements(mut self, raw: &[&str]) -> Self {
        self.placements = raw.iter().map(|value| Placement::parse(value)).collect();
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.push(role);
        self
    }
}

#[derive(Debug, Clone)]
pub struct MemoryView {
    pub profile: UserId,
    pub viewer: UserId,
    pub viewer_name: String,
    pub viewed_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryStore {
    pub users: Mutex<Vec<MemoryUser>>,
    pub snapshots: Mutex<Vec<LeaderboardSnapshot>>,
    pub views: Mutex<Vec<MemoryView>>,
    pub failing_categories: Mutex<Vec<LeaderboardCategory>>,
    pub fail_view_stats: bool,
    pub fail_candidates: bool,
    /// Calls made past `digest_user`
    pub stat_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn with_users(users: Vec<MemoryUser>) -> Self {
        Self {
            users: Mutex::new(users),
            ..Self::default()
        }
    }

    pub async fn snapshot_count(&self, category: LeaderboardCategory) -> usize {
        self.snapshots
            .lock()
            .await
            .iter()
            .filter(|snapshot| snapshot.category == category)
            .count()
    }

    pub async fn push_snapshot(
        &self,
        category: LeaderboardCategory,
        taken_at: DateTime<Utc>,
        ranks: &[(UserId, i32, i64)],
    ) {
        self.snapshots.lock().await.push(LeaderboardSnapshot {
            category,
            day: taken_at.date_naive(),
            taken_at,
            rankings: ranks
                .iter()
                .map(|(user_id, rank, score)| crate::models::RankingEntry {
                    user_id: *user_id,
                    rank: *rank,
                    score: *score,
                })
                .collect(),
        });
    }

    fn touch(&self) {
        self.stat_calls.fetch_add(1, Ordering::Relaxed);
    }
}

fn upcoming(trips: &[Trip], today: NaiveDate) -> Vec<Trip> {
    trips
        .iter()
        .filter(|trip| trip.dates.start >= today)
        .cloned()
        .collect()
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn leaderboard_candidates(
        &self,
        role: Option<Role>,
    ) -> StoreResult<Vec<LeaderboardCandidate>> {
        self.touch();
        if self.fail_candidates {
            return Err(StoreError::InvalidData("candidate query failed".to_string()));
        }
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .filter(|user| user.is_profile_complete)
            .filter(|user| role.map_or(true, |role| user.roles.contains(&role)))
            .map(|user| LeaderboardCandidate {
                user_id: user.id,
                like_count: user.liked_by.len() as i64,
                placements: user.placements.clone(),
            })
            .collect())
    }

    async fn digest_user(&self, id: UserId) -> StoreResult<Option<DigestUser>> {
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .find(|user| user.id == id)
            .map(|user| DigestUser {
                id: user.id,
                name: user.name.clone(),
                username: user.username.clone(),
                email: user.email.clone(),
                friends: user.friends.clone(),
                trips: user.trips.clone(),
            }))
    }

    async fn new_like_count(&self, id: UserId, since: DateTime<Utc>) -> StoreResult<i64> {
        self.touch();
        let users = self.users.lock().await;
        Ok(users
            .iter()
            .find(|user| user.id == id)
            .map(|user| {
                user.liked_by
                    .iter()
                    .filter(|(_, liked_at)| liked_at.is_some_and(|at| at >= since))
                    .count() as i64
            })
            .unwrap_or(0))
    }

    async fn total_like_count(&self, id: UserId) -> StoreResult<i64> {
        self.touch();
        let users = self.users.lock().await;
        Ok(users
            .iter()
            .find(|user| user.id == id)
            .map(|user| user.liked_by.len() as i64)
            .unwrap_or(0))
    }

    async fn friends_upcoming_trips(
        &self,
        friend_ids: &[UserId],
        today: NaiveDate,
    ) -> StoreResult<Vec<FriendTrips>> {
        self.touch();
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .filter(|user| friend_ids.contains(&user.id))
            .map(|user| FriendTrips {
                friend_id: user.id,
                friend_name: user.name.clone(),
                trips: upcoming(&user.trips, today),
            })
            .collect())
    }

    async fn active_digest_recipients(
        &self,
        admin_email: Option<&str>,
        logged_in_since: DateTime<Utc>,
    ) -> StoreResult<Vec<UserId>> {
        self.touch();
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .filter(|user| user.is_profile_complete)
            .filter(|user| match user.email.as_deref() {
                Some(email) => !email.is_empty() && Some(email) != admin_email,
                None => false,
            })
            .filter(|user| user.last_login.is_some_and(|at| at >= logged_in_since))
            .map(|user| user.id)
            .collect())
    }
}

#[async_trait]
impl ProfileViewStore for MemoryStore {
    async fn weekly_view_stats(&self, id: UserId, since: DateTime<Utc>) -> StoreResult<ViewStats> {
        self.touch();
        if self.fail_view_stats {
            return Err(StoreError::InvalidData("view store offline".to_string()));
        }
        let mut views: Vec<MemoryView> = self
            .views
            .lock()
            .await
            .iter()
            .filter(|view| view.profile == id && view.viewed_at >= since)
            .cloned()
            .collect();
        views.sort_by(|a, b| b.viewed_at.cmp(&a.viewed_at));

        let unique: HashSet<UserId> = views.iter().map(|view| view.viewer).collect();
        let mut seen = HashSet::new();
        let recent_viewers = views
            .iter()
            .filter(|view| seen.insert(view.viewer))
            .take(5)
            .map(|view| RecentViewer {
                viewer_id: view.viewer,
                name: view.viewer_name.clone(),
                viewed_at: view.viewed_at,
            })
            .collect();

        Ok(ViewStats {
            total_views: views.len() as i64,
            unique_viewers: unique.len() as i64,
            recent_viewers,
        })
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn upsert_snapshot(&self, snapshot: &LeaderboardSnapshot) -> StoreResult<()> {
        if self
            .failing_categories
            .lock()
            .await
            .contains(&snapshot.category)
        {
            return Err(StoreError::InvalidData(format!(
                "write rejected for {}",
                snapshot.category
            )));
        }
        let mut snapshots = self.snapshots.lock().await;
        match snapshots
            .iter_mut()
            .find(|existing| existing.category == snapshot.category && existing.day == snapshot.day)
        {
            Some(existing) => *existing = snapshot.clone(),
            None => snapshots.push(snapshot.clone()),
        }
        Ok(())
    }

    async fn latest_between(
        &self,
        category: LeaderboardCategory,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Option<LeaderboardSnapshot>> {
        self.touch();
        Ok(self
            .snapshots
            .lock()
            .await
            .iter()
            .filter(|s| s.category == category && s.taken_at >= from && s.taken_at <= to)
            .max_by_key(|s| s.taken_at)
            .cloned())
    }

    async fn latest_before(
        &self,
        category: LeaderboardCategory,
        before: DateTime<Utc>,
    ) -> StoreResult<Option<LeaderboardSnapshot>> {
        self.touch();
        Ok(self
            .snapshots
            .lock()
            .await
            .iter()
            .filter(|s| s.category == category && s.taken_at < before)
            .max_by_key(|s| s.taken_at)
            .cloned())
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let mut snapshots = self.snapshots.lock().await;
        let before = snapshots.len();
        snapshots.retain(|s| s.taken_at >= cutoff);
        Ok((before - snapshots.len()) as u64)
    }
}
