use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{
    CityId, CityRef, DateRange, DigestUser, FriendTrips, LeaderboardCandidate, LeaderboardCategory,
    LeaderboardSnapshot, Placement, RankingEntry, RecentViewer, Role, Trip, UserId, ViewStats,
};
use crate::store::{ProfileViewStore, SnapshotStore, UserStore};

const RECENT_VIEWER_LIMIT: i64 = 5;

pub async fn init_db(pool: &PgPool) -> StoreResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed implementation of every store trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn trip_from_row(row: &PgRow) -> StoreResult<Trip> {
    Ok(Trip {
        city: CityRef {
            id: CityId(row.try_get("city_id")?),
            name: row.try_get("city_name")?,
        },
        dates: DateRange::new(row.try_get("start_date")?, row.try_get("end_date")?),
    })
}

fn snapshot_from_row(row: &PgRow) -> StoreResult<LeaderboardSnapshot> {
    let category: String = row.try_get("category")?;
    let rankings: Json<Vec<RankingEntry>> = row.try_get("rankings")?;
    Ok(LeaderboardSnapshot {
        category: category.parse().map_err(StoreError::InvalidData)?,
        day: row.try_get("day")?,
        taken_at: row.try_get("taken_at")?,
        rankings: rankings.0,
    })
}

fn raw_ids(ids: &[UserId]) -> Vec<Uuid> {
    ids.iter().map(|id| id.0).collect()
}

#[async_trait]
impl UserStore for PgStore {
    async fn leaderboard_candidates(
        &self,
        role: Option<Role>,
    ) -> StoreResult<Vec<LeaderboardCandidate>> {
        let mut query = String::from(
            "SELECT u.id, \
             (SELECT COUNT(*) FROM dancetribe.user_likes l WHERE l.user_id = u.id) AS like_count, \
             ARRAY(SELECT c.placement FROM dancetribe.jj_competitions c WHERE c.user_id = u.id) AS placements \
             FROM dancetribe.users u \
             WHERE u.is_profile_complete",
        );

        if let Some(role) = role {
            query.push_str(" AND u.");
            query.push_str(role.column());
        }

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        let mut candidates = Vec::with_capacity(rows.len());

        for row in rows {
            let placements: Vec<String> = row.try_get("placements")?;
            candidates.push(LeaderboardCandidate {
                user_id: UserId(row.try_get("id")?),
                like_count: row.try_get("like_count")?,
                placements: placements.iter().map(|raw| Placement::parse(raw)).collect(),
            });
        }

        Ok(candidates)
    }

    async fn digest_user(&self, id: UserId) -> StoreResult<Option<DigestUser>> {
        let Some(row) = sqlx::query(
            "SELECT id, name, username, email FROM dancetribe.users WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let friends = sqlx::query("SELECT friend_id FROM dancetribe.friendships WHERE user_id = $1")
            .bind(id.0)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| row.try_get("friend_id").map(UserId))
            .collect::<Result<Vec<_>, _>>()?;

        let trips = sqlx::query(
            r#"
            SELECT t.start_date, t.end_date, c.id AS city_id, c.name AS city_name
            FROM dancetribe.trips t
            JOIN dancetribe.cities c ON c.id = t.city_id
            WHERE t.user_id = $1
            ORDER BY t.start_date
            "#,
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(trip_from_row)
        .collect::<StoreResult<Vec<_>>>()?;

        Ok(Some(DigestUser {
            id: UserId(row.try_get("id")?),
            name: row.try_get("name")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            friends,
            trips,
        }))
    }

    async fn new_like_count(&self, id: UserId, since: DateTime<Utc>) -> StoreResult<i64> {
        let count: i64 = sqlx::query(
            "SELECT COUNT(*) AS likes FROM dancetribe.user_likes WHERE user_id = $1 AND liked_at >= $2",
        )
        .bind(id.0)
        .bind(since)
        .fetch_one(&self.pool)
        .await?
        .try_get("likes")?;
        Ok(count)
    }

    async fn total_like_count(&self, id: UserId) -> StoreResult<i64> {
        let count: i64 =
            sqlx::query("SELECT COUNT(*) AS likes FROM dancetribe.user_likes WHERE user_id = $1")
                .bind(id.0)
                .fetch_one(&self.pool)
                .await?
                .try_get("likes")?;
        Ok(count)
    }

    async fn friends_upcoming_trips(
        &self,
        friend_ids: &[UserId],
        today: NaiveDate,
    ) -> StoreResult<Vec<FriendTrips>> {
        let ids = raw_ids(friend_ids);

        let mut friends = Vec::new();
        let mut index = HashMap::new();
        for row in sqlx::query("SELECT id, name FROM dancetribe.users WHERE id = ANY($1) ORDER BY name")
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?
        {
            let friend_id: Uuid = row.try_get("id")?;
            index.insert(friend_id, friends.len());
            friends.push(FriendTrips {
                friend_id: UserId(friend_id),
                friend_name: row.try_get("name")?,
                trips: Vec::new(),
            });
        }

        let rows = sqlx::query(
            r#"
            SELECT t.user_id, t.start_date, t.end_date, c.id AS city_id, c.name AS city_name
            FROM dancetribe.trips t
            JOIN dancetribe.cities c ON c.id = t.city_id
            WHERE t.user_id = ANY($1) AND t.start_date >= $2
            ORDER BY t.start_date
            "#,
        )
        .bind(&ids)
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        for row in rows {
            let owner: Uuid = row.try_get("user_id")?;
            if let Some(position) = index.get(&owner) {
                friends[*position].trips.push(trip_from_row(&row)?);
            }
        }

        Ok(friends)
    }

    async fn active_digest_recipients(
        &self,
        admin_email: Option<&str>,
        logged_in_since: DateTime<Utc>,
    ) -> StoreResult<Vec<UserId>> {
        let rows = sqlx::query(
            r#"
            SELECT id FROM dancetribe.users
            WHERE is_profile_complete
              AND email IS NOT NULL
              AND email <> ''
              AND ($1::TEXT IS NULL OR email <> $1)
              AND last_login >= $2
            ORDER BY id
            "#,
        )
        .bind(admin_email)
        .bind(logged_in_since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> StoreResult<UserId> { Ok(UserId(row.try_get("id")?)) })
            .collect()
    }
}

#[async_trait]
impl ProfileViewStore for PgStore {
    async fn weekly_view_stats(&self, id: UserId, since: DateTime<Utc>) -> StoreResult<ViewStats> {
        let totals = sqlx::query(
            r#"
            SELECT COUNT(*) AS total_views, COUNT(DISTINCT viewer_id) AS unique_viewers
            FROM dancetribe.profile_views
            WHERE user_id = $1 AND viewed_at >= $2
            "#,
        )
        .bind(id.0)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        let recent_viewers = sqlx::query(
            r#"
            SELECT v.viewer_id, u.name, MAX(v.viewed_at) AS viewed_at
            FROM dancetribe.profile_views v
            JOIN dancetribe.users u ON u.id = v.viewer_id
            WHERE v.user_id = $1 AND v.viewed_at >= $2
            GROUP BY v.viewer_id, u.name
            ORDER BY viewed_at DESC
            LIMIT $3
            "#,
        )
        .bind(id.0)
        .bind(since)
        .bind(RECENT_VIEWER_LIMIT)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| -> StoreResult<RecentViewer> {
            Ok(RecentViewer {
                viewer_id: UserId(row.try_get("viewer_id")?),
                name: row.try_get("name")?,
                viewed_at: row.try_get("viewed_at")?,
            })
        })
        .collect::<StoreResult<Vec<_>>>()?;

        Ok(ViewStats {
            total_views: totals.try_get("total_views")?,
            unique_viewers: totals.try_get("unique_viewers")?,
            recent_viewers,
        })
    }
}

#[async_trait]
impl SnapshotStore for PgStore {
    async fn upsert_snapshot(&self, snapshot: &LeaderboardSnapshot) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO dancetribe.leaderboard_snapshots
            (id, category, day, taken_at, rankings)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (category, day) DO UPDATE
            SET taken_at = EXCLUDED.taken_at, rankings = EXCLUDED.rankings
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(snapshot.category.as_str())
        .bind(snapshot.day)
        .bind(snapshot.taken_at)
        .bind(Json(&snapshot.rankings))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_between(
        &self,
        category: LeaderboardCategory,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Option<LeaderboardSnapshot>> {
        sqlx::query(
            r#"
            SELECT category, day, taken_at, rankings
            FROM dancetribe.leaderboard_snapshots
            WHERE category = $1 AND taken_at >= $2 AND taken_at <= $3
            ORDER BY taken_at DESC
            LIMIT 1
            "#,
        )
        .bind(category.as_str())
        .bind(from)
        .bind(to)
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(snapshot_from_row)
        .transpose()
    }

    async fn latest_before(
        &self,
        category: LeaderboardCategory,
        before: DateTime<Utc>,
    ) -> StoreResult<Option<LeaderboardSnapshot>> {
        sqlx::query(
            r#"
            SELECT category, day, taken_at, rankings
            FROM dancetribe.leaderboard_snapshots
            WHERE category = $1 AND taken_at < $2
            ORDER BY taken_at DESC
            LIMIT 1
            "#,
        )
        .bind(category.as_str())
        .bind(before)
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(snapshot_from_row)
        .transpose()
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM dancetribe.leaderboard_snapshots WHERE taken_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Loads a small community of dancers, trips and likes around `now` so every
/// report has something to show. Safe to run repeatedly.
pub async fn seed(pool: &PgPool, now: DateTime<Utc>) -> StoreResult<()> {
    let berlin = Uuid::parse_str("6a1c2f0e-5d7b-4c36-9a0e-2b8f1d9c4e11")
        .map_err(|err| StoreError::InvalidData(err.to_string()))?;
    let lisbon = Uuid::parse_str("b4e07a53-91c2-4f5d-8d6a-7c3e2a1f0b22")
        .map_err(|err| StoreError::InvalidData(err.to_string()))?;

    for (id, name, country) in [(berlin, "Berlin", "Germany"), (lisbon, "Lisbon", "Portugal")] {
        sqlx::query(
            r#"
            INSERT INTO dancetribe.cities (id, name, country)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(country)
        .execute(pool)
        .await?;
    }

    let dancers = [
        (Uuid::from_u128(0x5eed_0001), "Ana Souza", "ana", true, false, false),
        (Uuid::from_u128(0x5eed_0002), "Chloe Martin", "chloe", false, true, false),
        (Uuid::from_u128(0x5eed_0003), "Dev Patel", "dev", false, false, true),
        (Uuid::from_u128(0x5eed_0004), "Eli Brooks", "eli", false, false, false),
    ];

    for (id, name, username, is_teacher, is_dj, is_photographer) in dancers {
        sqlx::query(
            r#"
            INSERT INTO dancetribe.users
            (id, name, username, email, city_id, is_teacher, is_dj, is_photographer,
             is_profile_complete, last_login)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, $9)
            ON CONFLICT (id) DO UPDATE
            SET last_login = EXCLUDED.last_login
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(username)
        .bind(format!("{username}@dancetribe.app"))
        .bind(berlin)
        .bind(is_teacher)
        .bind(is_dj)
        .bind(is_photographer)
        .bind(now - Duration::days(2))
        .execute(pool)
        .await?;
    }

    let [ana, chloe, dev, eli] = dancers.map(|dancer| dancer.0);

    for (user_id, friend_id) in [(ana, chloe), (chloe, ana), (ana, dev), (dev, ana), (eli, chloe)] {
        sqlx::query(
            r#"
            INSERT INTO dancetribe.friendships (user_id, friend_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(friend_id)
        .execute(pool)
        .await?;
    }

    let likes = [
        (ana, chloe, Some(now - Duration::days(1))),
        (ana, dev, Some(now - Duration::days(3))),
        (ana, eli, None),
        (chloe, ana, Some(now - Duration::days(12))),
        (dev, eli, Some(now - Duration::days(5))),
    ];
    for (user_id, liker_id, liked_at) in likes {
        sqlx::query(
            r#"
            INSERT INTO dancetribe.user_likes (user_id, liker_id, liked_at)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(liker_id)
        .bind(liked_at)
        .execute(pool)
        .await?;
    }

    let today = now.date_naive();
    let trips = [
        ("seed-trip-001", ana, lisbon, 10, 15),
        ("seed-trip-002", chloe, lisbon, 14, 20),
        ("seed-trip-003", dev, berlin, 30, 33),
        ("seed-trip-004", eli, lisbon, 2, 4),
    ];
    for (source_key, user_id, city_id, start_offset, end_offset) in trips {
        sqlx::query(
            r#"
            INSERT INTO dancetribe.trips (id, user_id, city_id, start_date, end_date, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(city_id)
        .bind(today + Duration::days(start_offset))
        .bind(today + Duration::days(end_offset))
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    let competitions = [
        ("seed-jj-001", ana, "1st", 2025),
        ("seed-jj-002", ana, "3rd", 2026),
        ("seed-jj-003", chloe, "2nd", 2026),
        ("seed-jj-004", eli, "finalist", 2026),
    ];
    for (source_key, user_id, placement, year) in competitions {
        sqlx::query(
            r#"
            INSERT INTO dancetribe.jj_competitions (id, user_id, placement, year, source_key)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(placement)
        .bind(year)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    let views = [
        ("seed-view-001", ana, chloe, 5),
        ("seed-view-002", ana, eli, 30),
        ("seed-view-003", dev, ana, 50),
    ];
    for (source_key, user_id, viewer_id, hours_ago) in views {
        sqlx::query(
            r#"
            INSERT INTO dancetribe.profile_views (id, user_id, viewer_id, viewed_at, source_key)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(viewer_id)
        .bind(now - Duration::hours(hours_ago))
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    info!("seed data loaded");
    Ok(())
}
