// tests/window_boundary.rs
//
// Calendar-day windows are inclusive of the whole end day.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use fitness_discovery::model::{ContentCandidate, Platform};
use fitness_discovery::window::{filter_recent, parse_day};
use fitness_discovery::DiscoveryWindow;

fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn week() -> DiscoveryWindow {
    DiscoveryWindow::from_days(
        NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
        NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
    )
    .unwrap()
}

fn cand(url: &str, published: DateTime<Utc>) -> ContentCandidate {
    ContentCandidate::new(Platform::Article, "BoxRox", "Hyrox prep", url, published)
}

#[test]
fn last_minute_of_end_day_is_inside() {
    assert!(week().contains(at("2025-01-12T23:59:00Z")));
}

#[test]
fn first_second_after_end_day_is_outside() {
    assert!(!week().contains(at("2025-01-13T00:00:01Z")));
}

#[test]
fn start_midnight_is_inside_and_just_before_is_not() {
    let w = week();
    assert!(w.contains(Utc.with_ymd_and_hms(2025, 1, 6, 0, 0, 0).unwrap()));
    assert!(!w.contains(at("2025-01-05T23:59:59Z")));
}

#[test]
fn filter_keeps_order_and_drops_outside() {
    let kept = filter_recent(
        vec![
            cand("https://x.test/1", at("2025-01-12T23:59:00Z")),
            cand("https://x.test/2", at("2025-01-13T00:00:01Z")),
            cand("https://x.test/3", at("2025-01-06T08:00:00Z")),
        ],
        &week(),
    );
    let urls: Vec<&str> = kept.iter().map(|c| c.canonical_url.as_str()).collect();
    assert_eq!(urls, vec!["https://x.test/1", "https://x.test/3"]);
}

#[test]
fn parse_day_and_reversed_bounds() {
    let d = parse_day("2025-01-06").unwrap();
    assert_eq!(d, NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());
    assert!(parse_day("06/01/2025").is_err());
    assert!(DiscoveryWindow::from_days(
        NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
        NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
    )
    .is_err());
}
