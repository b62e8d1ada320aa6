use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::calendar::{self, DayKey, RANK_CHANGE_WINDOW_DAYS, SNAPSHOT_RETENTION_DAYS};
use crate::error::StoreResult;
use crate::models::{
    LeaderboardCandidate, LeaderboardCategory, LeaderboardSnapshot, Placement, RankChange,
    RankingEntry, UserId,
};
use crate::store::{SnapshotStore, UserStore};

pub const LEADERBOARD_SIZE: usize = 100;

/// Score of a candidate in `category`, or `None` when the candidate is not
/// eligible for it at all.
pub fn category_score(category: LeaderboardCategory, candidate: &LeaderboardCandidate) -> Option<i64> {
    if category.needs_competitions() && candidate.placements.is_empty() {
        return None;
    }

    let score = match category {
        LeaderboardCategory::MostLiked
        | LeaderboardCategory::MostLikedTeachers
        | LeaderboardCategory::MostLikedDjs
        | LeaderboardCategory::MostLikedPhotographers => candidate.like_count,
        LeaderboardCategory::JjChampions => candidate
            .placements
            .iter()
            .filter(|placement| **placement == Placement::First)
            .count() as i64,
        LeaderboardCategory::JjPodium => candidate
            .placements
            .iter()
            .filter(|placement| placement.is_podium())
            .count() as i64,
        LeaderboardCategory::JjParticipation => candidate.placements.len() as i64,
    };

    Some(score)
}

/// Ranks candidates by descending score; equal scores fall back to ascending
/// user id so the same data always yields the same ranking.
pub fn rank_candidates(
    category: LeaderboardCategory,
    candidates: &[LeaderboardCandidate],
) -> Vec<RankingEntry> {
    let mut scored: Vec<(UserId, i64)> = candidates
        .iter()
        .filter_map(|candidate| {
            category_score(category, candidate).map(|score| (candidate.user_id, score))
        })
        .filter(|(_, score)| *score > 0)
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    scored.truncate(LEADERBOARD_SIZE);

    scored
        .into_iter()
        .enumerate()
        .map(|(index, (user_id, score))| RankingEntry {
            user_id,
            rank: index as i32 + 1,
            score,
        })
        .collect()
}

pub async fn calculate_rankings(
    users: &dyn UserStore,
    category: LeaderboardCategory,
) -> StoreResult<Vec<RankingEntry>> {
    let candidates = users.leaderboard_candidates(category.role()).await?;
    Ok(rank_candidates(category, &candidates))
}

#[derive(Debug, Default)]
pub struct SnapshotRun {
    pub saved: Vec<LeaderboardCategory>,
    pub empty: Vec<LeaderboardCategory>,
    pub failed: Vec<(LeaderboardCategory, String)>,
}

impl SnapshotRun {
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn count(&self) -> usize {
        self.saved.len()
    }
}

/// Writes today's snapshot for every category. A failing category is logged
/// and reported without stopping the ones after it; re-running on the same day
/// replaces rather than duplicates.
pub async fn snapshot_all_leaderboards(
    users: &dyn UserStore,
    snapshots: &dyn SnapshotStore,
    now: DateTime<Utc>,
) -> SnapshotRun {
    let day = DayKey::of(now);
    let mut run = SnapshotRun::default();

    for category in LeaderboardCategory::ALL {
        let rankings = match calculate_rankings(users, category).await {
            Ok(rankings) => rankings,
            Err(err) => {
                error!(%category, "failed to calculate rankings: {err}");
                run.failed.push((category, err.to_string()));
                continue;
            }
        };

        if rankings.is_empty() {
            info!(%category, "no ranked users, skipping snapshot");
            run.empty.push(category);
            continue;
        }

        let snapshot = LeaderboardSnapshot {
            category,
            day: day.date(),
            taken_at: now,
            rankings,
        };

        match snapshots.upsert_snapshot(&snapshot).await {
            Ok(()) => run.saved.push(category),
            Err(err) => {
                error!(%category, "failed to save snapshot: {err}");
                run.failed.push((category, err.to_string()));
            }
        }
    }

    info!(
        %day,
        saved = run.saved.len(),
        failed = run.failed.len(),
        "leaderboard snapshot run finished"
    );
    run
}

pub fn rank_change(
    current: Option<&LeaderboardSnapshot>,
    previous: Option<&LeaderboardSnapshot>,
    user_id: UserId,
) -> RankChange {
    let current_entry = current.and_then(|snapshot| snapshot.entry_for(user_id));
    let previous_entry = previous.and_then(|snapshot| snapshot.entry_for(user_id));

    let current_rank = current_entry.map(|entry| entry.rank);
    let previous_rank = previous_entry.map(|entry| entry.rank);

    let (change, improved) = match (current_rank, previous_rank) {
        (Some(now), Some(before)) => (before - now, now < before),
        _ => (0, false),
    };

    RankChange {
        current: current_rank,
        previous: previous_rank,
        score: current_entry.map(|entry| entry.score),
        change,
        improved,
        is_new: current_rank.is_some() && previous_rank.is_none(),
        dropped_out: current_rank.is_none() && previous_rank.is_some(),
    }
}

async fn load_rank_change(
    snapshots: &dyn SnapshotStore,
    user_id: UserId,
    category: LeaderboardCategory,
    now: DateTime<Utc>,
) -> StoreResult<RankChange> {
    let week_ago = calendar::days_before(now, RANK_CHANGE_WINDOW_DAYS);
    let current = snapshots.latest_between(category, week_ago, now).await?;
    let previous = snapshots.latest_before(category, week_ago).await?;
    Ok(rank_change(current.as_ref(), previous.as_ref(), user_id))
}

/// Week-over-week movement of one user; lookup failures degrade to the empty
/// change.
pub async fn user_rank_change(
    snapshots: &dyn SnapshotStore,
    user_id: UserId,
    category: LeaderboardCategory,
    now: DateTime<Utc>,
) -> RankChange {
    match load_rank_change(snapshots, user_id, category, now).await {
        Ok(change) => change,
        Err(err) => {
            warn!(%user_id, %category, "rank change unavailable: {err}");
            RankChange::default()
        }
    }
}

pub async fn all_rank_changes(
    snapshots: &dyn SnapshotStore,
    user_id: UserId,
    now: DateTime<Utc>,
) -> BTreeMap<LeaderboardCategory, RankChange> {
    let mut changes = BTreeMap::new();
    for category in LeaderboardCategory::ALL {
        changes.insert(
            category,
            user_rank_change(snapshots, user_id, category, now).await,
        );
    }
    changes
}

pub async fn cleanup_old_snapshots(
    snapshots: &dyn SnapshotStore,
    now: DateTime<Utc>,
) -> StoreResult<u64> {
    let cutoff = calendar::days_before(now, SNAPSHOT_RETENTION_DAYS);
    let deleted = snapshots.delete_before(cutoff).await?;
    info!(deleted, %cutoff, "removed expired leaderboard snapshots");
    Ok(deleted)
}

/// Most recent snapshot still inside the retention window.
pub async fn latest_rankings(
    snapshots: &dyn SnapshotStore,
    category: LeaderboardCategory,
    now: DateTime<Utc>,
) -> StoreResult<Option<LeaderboardSnapshot>> {
    let cutoff = calendar::days_before(now, SNAPSHOT_RETENTION_DAYS);
    snapshots.latest_between(category, cutoff, now).await
}
