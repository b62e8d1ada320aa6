use std::fmt::Write;

use crate::models::{LeaderboardSnapshot, RankChange, WeeklyDigestData};
use crate::overlap;

fn describe_rank_change(change: &RankChange) -> Option<String> {
    match (change.current, change.previous) {
        (Some(current), None) if change.is_new => Some(format!("new entry at #{current}")),
        (None, Some(previous)) if change.dropped_out => {
            Some(format!("dropped out (was #{previous})"))
        }
        (Some(current), Some(previous)) if change.improved => Some(format!(
            "up {} to #{current} (was #{previous})",
            change.change
        )),
        _ => None,
    }
}

/// Markdown body of the weekly digest email. Sections mirror the signals
/// checked by `should_send_digest`, so a digest that passes it never renders
/// empty.
pub fn render_digest(data: &WeeklyDigestData) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Your week on DanceTribe");
    let _ = writeln!(
        output,
        "Hi {}, here is what happened between {} and {}.",
        data.name, data.period_start, data.period_end
    );

    if data.views.total_views > 0 {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Profile views");
        let _ = writeln!(
            output,
            "{} views from {} dancers.",
            data.views.total_views, data.views.unique_viewers
        );
        for viewer in data.views.recent_viewers.iter() {
            let _ = writeln!(
                output,
                "- {} on {}",
                viewer.name,
                viewer.viewed_at.date_naive()
            );
        }
    }

    if data.new_likes > 0 {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Likes");
        let _ = writeln!(
            output,
            "{} new likes this week ({} in total).",
            data.new_likes, data.total_likes
        );
    }

    let movements: Vec<(String, String)> = data
        .leaderboard_changes
        .iter()
        .filter_map(|(category, change)| {
            describe_rank_change(change).map(|text| (category.label().to_string(), text))
        })
        .collect();

    if !movements.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Leaderboards");
        for (label, text) in movements.iter() {
            let _ = writeln!(output, "- {label}: {text}");
        }
    }

    if data.friends_with_trips > 0 || !data.trip_overlaps.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Trips");
        if data.friends_with_trips > 0 {
            let _ = writeln!(
                output,
                "{} of your friends have upcoming trips.",
                data.friends_with_trips
            );
        }
        for found in data.trip_overlaps.iter() {
            let _ = writeln!(
                output,
                "- {} is in {} too, {} to {} ({} days together, {})",
                found.friend_name,
                found.city.name,
                found.overlap.start,
                found.overlap.end,
                found.overlap.days,
                overlap::starts_in_label(data.period_end, found.overlap.start)
            );
        }
    }

    output
}

pub fn render_rankings(snapshot: &LeaderboardSnapshot, limit: usize) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "{} (snapshot {})",
        snapshot.category.label(),
        snapshot.day
    );
    for entry in snapshot.rankings.iter().take(limit) {
        let _ = writeln!(output, "{:>4}. {} score {}", entry.rank, entry.user_id, entry.score);
    }
    output
}
