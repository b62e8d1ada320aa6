use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CityId(pub Uuid);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CityRef {
    pub id: CityId,
    pub name: String,
}

/// Inclusive calendar-date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trip {
    pub city: CityRef,
    pub dates: DateRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Teacher,
    Dj,
    Photographer,
}

impl Role {
    pub fn column(self) -> &'static str {
        match self {
            Role::Teacher => "is_teacher",
            Role::Dj => "is_dj",
            Role::Photographer => "is_photographer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    First,
    Second,
    Third,
    Other(String),
}

impl Placement {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "1st" => Placement::First,
            "2nd" => Placement::Second,
            "3rd" => Placement::Third,
            other => Placement::Other(other.to_string()),
        }
    }

    pub fn is_podium(&self) -> bool {
        !matches!(self, Placement::Other(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LeaderboardCategory {
    #[serde(rename = "mostLiked")]
    MostLiked,
    #[serde(rename = "jjChampions")]
    JjChampions,
    #[serde(rename = "jjPodium")]
    JjPodium,
    #[serde(rename = "jjParticipation")]
    JjParticipation,
    #[serde(rename = "mostLikedTeachers")]
    MostLikedTeachers,
    #[serde(rename = "mostLikedDJs")]
    MostLikedDjs,
    #[serde(rename = "mostLikedPhotographers")]
    MostLikedPhotographers,
}

impl LeaderboardCategory {
    /// Fixed processing order for snapshot runs.
    pub const ALL: [LeaderboardCategory; 7] = [
        LeaderboardCategory::MostLiked,
        LeaderboardCategory::JjChampions,
        LeaderboardCategory::JjPodium,
        LeaderboardCategory::JjParticipation,
        LeaderboardCategory::MostLikedTeachers,
        LeaderboardCategory::MostLikedDjs,
        LeaderboardCategory::MostLikedPhotographers,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LeaderboardCategory::MostLiked => "mostLiked",
            LeaderboardCategory::JjChampions => "jjChampions",
            LeaderboardCategory::JjPodium => "jjPodium",
            LeaderboardCategory::JjParticipation => "jjParticipation",
            LeaderboardCategory::MostLikedTeachers => "mostLikedTeachers",
            LeaderboardCategory::MostLikedDjs => "mostLikedDJs",
            LeaderboardCategory::MostLikedPhotographers => "mostLikedPhotographers",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LeaderboardCategory::MostLiked => "Most liked dancers",
            LeaderboardCategory::JjChampions => "J&J champions",
            LeaderboardCategory::JjPodium => "J&J podium finishes",
            LeaderboardCategory::JjParticipation => "J&J participation",
            LeaderboardCategory::MostLikedTeachers => "Most liked teachers",
            LeaderboardCategory::MostLikedDjs => "Most liked DJs",
            LeaderboardCategory::MostLikedPhotographers => "Most liked photographers",
        }
    }

    pub fn role(self) -> Option<Role> {
        match self {
            LeaderboardCategory::MostLikedTeachers => Some(Role::Teacher),
            LeaderboardCategory::MostLikedDjs => Some(Role::Dj),
            LeaderboardCategory::MostLikedPhotographers => Some(Role::Photographer),
            _ => None,
        }
    }

    pub fn needs_competitions(self) -> bool {
        matches!(
            self,
            LeaderboardCategory::JjChampions
                | LeaderboardCategory::JjPodium
                | LeaderboardCategory::JjParticipation
        )
    }
}

impl fmt::Display for LeaderboardCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeaderboardCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        LeaderboardCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == value)
            .ok_or_else(|| format!("unknown leaderboard category: {value}"))
    }
}

/// Projection of a user read for leaderboard scoring.
#[derive(Debug, Clone)]
pub struct LeaderboardCandidate {
    pub user_id: UserId,
    pub like_count: i64,
    pub placements: Vec<Placement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub user_id: UserId,
    pub rank: i32,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardSnapshot {
    pub category: LeaderboardCategory,
    pub day: NaiveDate,
    pub taken_at: DateTime<Utc>,
    pub rankings: Vec<RankingEntry>,
}

impl LeaderboardSnapshot {
    pub fn entry_for(&self, user_id: UserId) -> Option<&RankingEntry> {
        self.rankings.iter().find(|entry| entry.user_id == user_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankChange {
    pub current: Option<i32>,
    pub previous: Option<i32>,
    pub score: Option<i64>,
    pub change: i32,
    pub improved: bool,
    pub is_new: bool,
    pub dropped_out: bool,
}

impl RankChange {
    pub fn is_notable(&self) -> bool {
        self.improved || self.is_new || self.dropped_out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlapWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripOverlap {
    pub friend_id: UserId,
    pub friend_name: String,
    pub city: CityRef,
    pub your_trip: DateRange,
    pub friend_trip: DateRange,
    pub overlap: OverlapWindow,
}

/// Projection of the user read by the digest composer.
#[derive(Debug, Clone)]
pub struct DigestUser {
    pub id: UserId,
    pub name: String,
    pub username: String,
    pub email: Option<String>,
    pub friends: Vec<UserId>,
    pub trips: Vec<Trip>,
}

#[derive(Debug, Clone)]
pub struct FriendTrips {
    pub friend_id: UserId,
    pub friend_name: String,
    pub trips: Vec<Trip>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentViewer {
    pub viewer_id: UserId,
    pub name: String,
    pub viewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewStats {
    pub total_views: i64,
    pub unique_viewers: i64,
    pub recent_viewers: Vec<RecentViewer>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyDigestData {
    pub user_id: UserId,
    pub name: String,
    pub username: String,
    pub email: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub views: ViewStats,
    pub new_likes: i64,
    pub total_likes: i64,
    pub leaderboard_changes: std::collections::BTreeMap<LeaderboardCategory, RankChange>,
    pub friends_with_trips: i64,
    pub trip_overlaps: Vec<TripOverlap>,
}
