// src/ingest/providers/mod.rs
pub mod google_news;
pub mod instagram;
pub mod podcast;
pub mod reddit;
pub mod rss;
pub mod youtube;

use serde_json::Value;

/// `HH:MM:SS`, `MM:SS` or plain seconds (itunes:duration style).
pub fn parse_clock_duration(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let mut total: i64 = 0;
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() > 3 {
        return None;
    }
    for p in parts {
        let n: i64 = p.trim().parse().ok()?;
        if n < 0 {
            return None;
        }
        total = total.checked_mul(60)?.checked_add(n)?;
    }
    Some(total)
}

/// Integer from a JSON number or numeric string (YouTube sends counts as strings).
pub fn json_i64(v: Option<&Value>) -> Option<i64> {
    match v? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// First non-empty string among `paths` (each a `/`-separated JSON pointer without the leading slash).
pub fn first_str<'a>(v: &'a Value, paths: &[&str]) -> Option<&'a str> {
    paths.iter().find_map(|p| {
        v.pointer(&format!("/{p}"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clock_durations() {
        assert_eq!(parse_clock_duration("01:02:03"), Some(3723));
        assert_eq!(parse_clock_duration("45:10"), Some(2710));
        assert_eq!(parse_clock_duration("3600"), Some(3600));
        assert_eq!(parse_clock_duration("1h 2m"), None);
        assert_eq!(parse_clock_duration(""), None);
    }

    #[test]
    fn json_numbers_and_strings() {
        let v = json!({"a": "123", "b": 7, "c": 2.9, "d": null});
        assert_eq!(json_i64(v.get("a")), Some(123));
        assert_eq!(json_i64(v.get("b")), Some(7));
        assert_eq!(json_i64(v.get("c")), Some(2));
        assert_eq!(json_i64(v.get("d")), None);
        assert_eq!(json_i64(v.get("missing")), None);
    }

    #[test]
    fn first_str_skips_blank() {
        let v = json!({"caption": {"text": "  "}, "alt": "x"});
        assert_eq!(first_str(&v, &["caption/text", "alt"]), Some("x"));
        assert_eq!(first_str(&v, &["nope"]), None);
    }
}
