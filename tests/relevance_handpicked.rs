// tests/relevance_handpicked.rs
//
// Hand-picked headlines against fixed keyword sets and the shipped
// config/relevance.toml.

use std::collections::HashSet;

use chrono::Utc;
use fitness_discovery::model::{ContentCandidate, Platform};
use fitness_discovery::relevance::{priority_name_set, Reason, RelevanceClassifier};

fn fixed() -> RelevanceClassifier {
    RelevanceClassifier::from_sets("hyrox", &["hyrox"], &["hybrid athlete"], &["race", "training"])
}

#[test]
fn primary_hit_is_relevant() {
    let v = fixed().classify("Hunter McIntyre wins Hyrox world title");
    assert!(v.relevant);
    assert_eq!(v.reason, Reason::Primary);
    assert_eq!(v.matched, vec!["hyrox".to_string()]);
}

#[test]
fn secondary_alone_is_not_relevant() {
    let v = fixed().classify("I became a hybrid athlete this year");
    assert!(!v.relevant);
    assert_eq!(v.reason, Reason::SecondaryWithoutContext);
}

#[test]
fn secondary_with_context_is_relevant() {
    let v = fixed().classify("I became a hybrid athlete through race training");
    assert!(v.relevant);
    assert_eq!(v.reason, Reason::SecondaryWithContext);
}

#[test]
fn unrelated_text_is_rejected() {
    let v = fixed().classify("Best recipes for marathon week");
    assert!(!v.relevant);
    assert_eq!(v.reason, Reason::NoMatch);
}

#[test]
fn matching_is_case_insensitive_substring() {
    assert!(fixed().is_relevant("HYROXWORLD highlights"));
}

#[test]
fn source_name_containing_topic_bypasses_text() {
    let c = ContentCandidate::new(Platform::Reddit, "r/hyrox", "Anyone else sore today?", "https://r.test/1", Utc::now());
    let v = fixed().decide(&c, &HashSet::new());
    assert!(v.relevant);
    assert_eq!(v.reason, Reason::SourceName);
}

#[test]
fn priority_name_bypasses_text() {
    let c = ContentCandidate::new(Platform::Podcast, "Rox Lyfe Podcast", "Episode 12: mailbag", "https://p.test/12", Utc::now());
    let names = priority_name_set(["  rox lyfe podcast "]);
    let v = fixed().decide(&c, &names);
    assert!(v.relevant);
    assert_eq!(v.reason, Reason::PrioritySource);
}

#[test]
fn shipped_keyword_file_loads() {
    let toml = std::fs::read_to_string("config/relevance.toml").expect("config/relevance.toml present");
    let c = RelevanceClassifier::from_toml_str(&toml).expect("valid relevance config");
    assert_eq!(c.topic(), "hyrox");
    assert!(c.is_relevant("Lauren Weeks takes the Elite 15 title"));
    assert!(c.is_relevant("Functional fitness race prep: 8 week training block"));
    assert!(!c.is_relevant("Life as a hybrid athlete"));
    assert!(!c.is_relevant("Sourdough starter basics"));
}
