// src/ingest/config.rs
//! Priority-source seed file loader (TOML or JSON).
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::PrioritySource;

const ENV_PATH: &str = "PRIORITY_SOURCES_PATH";

/// Load priority sources from an explicit path. Supports TOML or JSON formats.
pub fn load_priority_sources_from(path: &Path) -> Result<Vec<PrioritySource>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading priority sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_priority_sources(&content, ext.as_str())
}

/// Load priority sources using env var + fallbacks:
/// 1) $PRIORITY_SOURCES_PATH
/// 2) config/priority_sources.toml
/// 3) config/priority_sources.json
pub fn load_priority_sources_default() -> Result<Vec<PrioritySource>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_priority_sources_from(&pb);
        } else {
            return Err(anyhow!("{ENV_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/priority_sources.toml");
    if toml_p.exists() {
        return load_priority_sources_from(&toml_p);
    }
    let json_p = PathBuf::from("config/priority_sources.json");
    if json_p.exists() {
        return load_priority_sources_from(&json_p);
    }
    Ok(Vec::new())
}

fn parse_priority_sources(s: &str, hint_ext: &str) -> Result<Vec<PrioritySource>> {
    let try_toml = hint_ext == "toml" || s.contains("[[sources]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported priority source format"))
}

fn parse_toml(s: &str) -> Result<Vec<PrioritySource>> {
    #[derive(serde::Deserialize)]
    struct TomlSources {
        sources: Vec<PrioritySource>,
    }
    let v: TomlSources = toml::from_str(s)?;
    Ok(clean_list(v.sources))
}

fn parse_json(s: &str) -> Result<Vec<PrioritySource>> {
    let v: Vec<PrioritySource> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

/// Trim names and URLs, drop nameless rows, keep the last row per (platform, name).
fn clean_list(items: Vec<PrioritySource>) -> Vec<PrioritySource> {
    use std::collections::BTreeMap;
    let mut map = BTreeMap::new();
    for mut it in items {
        it.source_name = it.source_name.trim().to_string();
        if it.source_name.is_empty() {
            continue;
        }
        it.source_url = it
            .source_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        it.external_id = it
            .external_id
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        map.insert((it.platform, it.source_name.clone()), it);
    }
    map.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Platform;
    use std::{env, fs};

    #[test]
    fn trims_dedups_and_parses_both_formats() {
        let toml = r#"
[[sources]]
platform = "article"
source_name = " Roxlyfe "
source_url = "https://roxlyfe.substack.com"

[[sources]]
platform = "article"
source_name = ""

[[sources]]
platform = "youtube"
source_name = "HYROX"
external_id = "UC123"
is_active = false
"#;
        let out = parse_toml(toml).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].platform, Platform::Youtube);
        assert!(!out[0].is_active);
        assert_eq!(out[1].source_name, "Roxlyfe");
        assert!(out[1].is_active);

        let json = r#"[{"platform": "podcast", "source_name": "UKHXR", "source_url": " "}]"#;
        let out = parse_json(json).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].source_url.is_none());
    }

    #[test]
    fn unknown_platform_is_an_error() {
        let json = r#"[{"platform": "tiktok", "source_name": "x"}]"#;
        assert!(parse_priority_sources(json, "json").is_err());
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();

        env::remove_var(ENV_PATH);

        let v = load_priority_sources_default().unwrap();
        assert!(v.is_empty());

        let p_json = tmp.path().join("priority.json");
        fs::write(&p_json, r#"[{"platform": "reddit", "source_name": "hyrox"}]"#).unwrap();
        env::set_var(ENV_PATH, p_json.display().to_string());
        let v2 = load_priority_sources_default().unwrap();
        assert_eq!(v2.len(), 1);
        assert_eq!(v2[0].platform, Platform::Reddit);

        env::set_var(ENV_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(load_priority_sources_default().is_err());
        env::remove_var(ENV_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
