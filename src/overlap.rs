use chrono::NaiveDate;

use crate::models::{DateRange, FriendTrips, OverlapWindow, Trip, TripOverlap};

pub const DIGEST_OVERLAP_LIMIT: usize = 5;

/// Inclusive intersection of two date ranges. Ranges that only touch on the
/// same day still intersect for that one day.
pub fn intersect(a: DateRange, b: DateRange) -> Option<OverlapWindow> {
    if a.start > b.end || a.end < b.start {
        return None;
    }
    let start = a.start.max(b.start);
    let end = a.end.min(b.end);
    Some(OverlapWindow {
        start,
        end,
        days: (end - start).num_days() + 1,
    })
}

pub fn upcoming_trips(trips: &[Trip], today: NaiveDate) -> Vec<&Trip> {
    trips.iter().filter(|trip| trip.dates.start >= today).collect()
}

/// Every pairing of one of `own_trips` with a friend trip to the same city
/// whose dates intersect. Both trip lists are narrowed to upcoming trips first.
/// Pairings are not deduplicated: two own trips overlapping one friend trip
/// yield two entries.
pub fn find_trip_overlaps(
    own_trips: &[Trip],
    friends: &[FriendTrips],
    today: NaiveDate,
    limit: Option<usize>,
) -> Vec<TripOverlap> {
    let own = upcoming_trips(own_trips, today);
    let mut overlaps = Vec::new();
    if own.is_empty() {
        return overlaps;
    }

    for own_trip in own {
        for friend in friends {
            for friend_trip in upcoming_trips(&friend.trips, today) {
                if own_trip.city.id != friend_trip.city.id {
                    continue;
                }
                let Some(window) = intersect(own_trip.dates, friend_trip.dates) else {
                    continue;
                };
                overlaps.push(TripOverlap {
                    friend_id: friend.friend_id,
                    friend_name: friend.friend_name.clone(),
                    city: friend_trip.city.clone(),
                    your_trip: own_trip.dates,
                    friend_trip: friend_trip.dates,
                    overlap: window,
                });
            }
        }
    }

    if let Some(limit) = limit {
        overlaps.truncate(limit);
    }
    overlaps
}

/// Human label for how far away an overlap starts, e.g. "in 3 days".
pub fn starts_in_label(today: NaiveDate, start: NaiveDate) -> String {
    let days = (start - today).num_days();
    match days {
        d if d < 0 => "happening now".to_string(),
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        d if d < 7 => format!("in {d} days"),
        d if d < 30 => plural(d / 7, "week"),
        d => plural(d / 30, "month"),
    }
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("in 1 {unit}")
    } else {
        format!("in {count} {unit}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;
    use crate::store::memory::{date, trip};
    use uuid::Uuid;

    fn friend(name: &str, trips: Vec<Trip>) -> FriendTrips {
        FriendTrips {
            friend_id: UserId(Uuid::new_v4()),
            friend_name: name.to_string(),
            trips,
        }
    }

    #[test]
    fn touching_ranges_overlap_for_one_day() {
        let window = intersect(
            DateRange::new(date(2027, 1, 1), date(2027, 1, 5)),
            DateRange::new(date(2027, 1, 5), date(2027, 1, 10)),
        )
        .unwrap();
        assert_eq!(window.start, date(2027, 1, 5));
        assert_eq!(window.end, date(2027, 1, 5));
        assert_eq!(window.days, 1);
    }

    #[test]
    fn adjacent_ranges_do_not_overlap() {
        assert!(intersect(
            DateRange::new(date(2027, 1, 1), date(2027, 1, 4)),
            DateRange::new(date(2027, 1, 5), date(2027, 1, 10)),
        )
        .is_none());
    }

    #[test]
    fn intersection_is_symmetric() {
        let a = DateRange::new(date(2027, 4, 2), date(2027, 4, 12));
        let b = DateRange::new(date(2027, 4, 8), date(2027, 4, 20));
        assert_eq!(intersect(a, b), intersect(b, a));
        assert_eq!(intersect(a, b).unwrap().days, 5);
    }

    #[test]
    fn overlap_reports_true_intersection() {
        let today = date(2026, 12, 1);
        let own = vec![trip("Berlin", date(2027, 1, 1), date(2027, 1, 5))];
        let friends = vec![friend(
            "Chloe",
            vec![trip("Berlin", date(2027, 1, 5), date(2027, 1, 10))],
        )];

        let overlaps = find_trip_overlaps(&own, &friends, today, None);

        assert_eq!(overlaps.len(), 1);
        let found = &overlaps[0];
        assert_eq!(found.friend_name, "Chloe");
        assert_eq!(found.city.name, "Berlin");
        assert_eq!(found.your_trip, own[0].dates);
        assert_eq!(found.friend_trip.end, date(2027, 1, 10));
        assert_eq!(found.overlap.start, date(2027, 1, 5));
        assert_eq!(found.overlap.days, 1);
    }

    #[test]
    fn different_cities_never_overlap() {
        let today = date(2026, 12, 1);
        let own = vec![trip("Berlin", date(2027, 1, 1), date(2027, 1, 5))];
        let friends = vec![friend(
            "Chloe",
            vec![trip("Paris", date(2027, 1, 1), date(2027, 1, 5))],
        )];
        assert!(find_trip_overlaps(&own, &friends, today, None).is_empty());
    }

    #[test]
    fn past_trips_are_ignored() {
        let today = date(2027, 1, 3);
        let own = vec![trip("Berlin", date(2027, 1, 1), date(2027, 1, 9))];
        let friends = vec![friend(
            "Chloe",
            vec![trip("Berlin", date(2027, 1, 4), date(2027, 1, 6))],
        )];
        assert!(find_trip_overlaps(&own, &friends, today, None).is_empty());
    }

    #[test]
    fn each_pairing_is_kept_and_limit_applies() {
        let today = date(2026, 12, 1);
        let own = vec![
            trip("Lisbon", date(2027, 2, 1), date(2027, 2, 4)),
            trip("Lisbon", date(2027, 2, 3), date(2027, 2, 8)),
        ];
        let friends: Vec<FriendTrips> = (0..4)
            .map(|index| {
                friend(
                    &format!("Friend {index}"),
                    vec![trip("Lisbon", date(2027, 2, 3), date(2027, 2, 5))],
                )
            })
            .collect();

        assert_eq!(find_trip_overlaps(&own, &friends, today, None).len(), 8);
        assert_eq!(
            find_trip_overlaps(&own, &friends, today, Some(DIGEST_OVERLAP_LIMIT)).len(),
            DIGEST_OVERLAP_LIMIT
        );
    }

    #[test]
    fn starts_in_label_boundaries() {
        let today = date(2027, 5, 10);
        let label = |offset: i64| starts_in_label(today, today + chrono::Duration::days(offset));
        assert_eq!(label(-2), "happening now");
        assert_eq!(label(0), "today");
        assert_eq!(label(1), "tomorrow");
        assert_eq!(label(6), "in 6 days");
        assert_eq!(label(7), "in 1 week");
        assert_eq!(label(14), "in 2 weeks");
        assert_eq!(label(29), "in 4 weeks");
        assert_eq!(label(30), "in 1 month");
        assert_eq!(label(95), "in 3 months");
    }
}
