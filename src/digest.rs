use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::calendar::{self, ACTIVE_USER_WINDOW_DAYS, DIGEST_WINDOW_DAYS};
use crate::error::StoreResult;
use crate::leaderboard;
use crate::models::{FriendTrips, UserId, WeeklyDigestData};
use crate::overlap::{self, DIGEST_OVERLAP_LIMIT};
use crate::store::{ProfileViewStore, SnapshotStore, UserStore};

#[derive(Clone, Copy)]
pub struct DigestSources<'a> {
    pub users: &'a dyn UserStore,
    pub views: &'a dyn ProfileViewStore,
    pub snapshots: &'a dyn SnapshotStore,
}

/// Collapses a failed stat into its zero value. This is the only place where
/// digest errors are swallowed.
fn or_zero<T: Default>(user_id: UserId, stat: &'static str, result: StoreResult<T>) -> T {
    result.unwrap_or_else(|err| {
        warn!(%user_id, stat, "digest stat unavailable, using default: {err}");
        T::default()
    })
}

/// Gathers one user's weekly activity. `None` means the user cannot receive a
/// digest (unknown user or no email on file); everything else degrades to
/// zero values instead of failing.
pub async fn weekly_digest_data(
    sources: DigestSources<'_>,
    user_id: UserId,
    now: DateTime<Utc>,
) -> Option<WeeklyDigestData> {
    let user = match sources.users.digest_user(user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return None,
        Err(err) => {
            warn!(%user_id, "could not load digest user: {err}");
            return None;
        }
    };
    let email = user.email.clone().filter(|email| !email.trim().is_empty())?;

    let since = calendar::days_before(now, DIGEST_WINDOW_DAYS);
    let today = calendar::today(now);

    let views = or_zero(
        user_id,
        "profile_views",
        sources.views.weekly_view_stats(user_id, since).await,
    );
    let new_likes = or_zero(
        user_id,
        "new_likes",
        sources.users.new_like_count(user_id, since).await,
    );
    let total_likes = or_zero(
        user_id,
        "total_likes",
        sources.users.total_like_count(user_id).await,
    );
    let leaderboard_changes = leaderboard::all_rank_changes(sources.snapshots, user_id, now).await;

    let friend_trips: Vec<FriendTrips> = if user.friends.is_empty() {
        Vec::new()
    } else {
        or_zero(
            user_id,
            "friend_trips",
            sources
                .users
                .friends_upcoming_trips(&user.friends, today)
                .await,
        )
    };
    let friends_with_trips = friend_trips
        .iter()
        .filter(|friend| !friend.trips.is_empty())
        .count() as i64;
    let trip_overlaps = overlap::find_trip_overlaps(
        &user.trips,
        &friend_trips,
        today,
        Some(DIGEST_OVERLAP_LIMIT),
    );

    Some(WeeklyDigestData {
        user_id: user.id,
        name: user.name,
        username: user.username,
        email,
        period_start: since.date_naive(),
        period_end: today,
        views,
        new_likes,
        total_likes,
        leaderboard_changes,
        friends_with_trips,
        trip_overlaps,
    })
}

/// True when the digest has at least one section worth sending.
pub fn should_send_digest(data: &WeeklyDigestData) -> bool {
    data.views.total_views > 0
        || data.new_likes > 0
        || data
            .leaderboard_changes
            .values()
            .any(|change| change.is_notable())
        || data.friends_with_trips > 0
        || !data.trip_overlaps.is_empty()
}

pub async fn active_users_for_digest(
    users: &dyn UserStore,
    admin_email: Option<&str>,
    now: DateTime<Utc>,
) -> StoreResult<Vec<UserId>> {
    let since = calendar::days_before(now, ACTIVE_USER_WINDOW_DAYS);
    users.active_digest_recipients(admin_email, since).await
}

#[derive(Debug, Default)]
pub struct DigestBatch {
    pub ready: Vec<WeeklyDigestData>,
    pub quiet: usize,
    pub undeliverable: usize,
}

/// Composes digests for every active user, one user at a time.
pub async fn collect_weekly_digests(
    sources: DigestSources<'_>,
    admin_email: Option<&str>,
    now: DateTime<Utc>,
) -> StoreResult<DigestBatch> {
    let recipients = active_users_for_digest(sources.users, admin_email, now).await?;
    let mut batch = DigestBatch::default();

    for user_id in recipients {
        match weekly_digest_data(sources, user_id, now).await {
            Some(data) if should_send_digest(&data) => batch.ready.push(data),
            Some(_) => batch.quiet += 1,
            None => batch.undeliverable += 1,
        }
    }

    info!(
        ready = batch.ready.len(),
        quiet = batch.quiet,
        undeliverable = batch.undeliverable,
        "weekly digests composed"
    );
    Ok(batch)
}
