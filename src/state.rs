// ABOUTME: Persists CLI settings between runs in ~/.image-asset-migrator/state.json
// ABOUTME: Currently stores the repository REST API URL

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct AppState {
    pub repository_url: Option<String>,
    #[serde(default)]
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

fn get_state_path() -> Result<PathBuf> {
    let home_dir =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
    let state_dir = home_dir.join(".image-asset-migrator");
    if !state_dir.exists() {
        fs::create_dir_all(&state_dir)
            .with_context(|| format!("Failed to create {}", state_dir.display()))?;
    }
    Ok(state_dir.join("state.json"))
}

pub fn load() -> Result<AppState> {
    let state_path = get_state_path()?;
    if !state_path.exists() {
        return Ok(AppState::default());
    }
    let state_file = fs::File::open(&state_path)
        .with_context(|| format!("Failed to open {}", state_path.display()))?;
    let state = serde_json::from_reader(state_file)
        .with_context(|| format!("Failed to parse {}", state_path.display()))?;
    Ok(state)
}

pub fn save(state: &AppState) -> Result<()> {
    let state_path = get_state_path()?;
    let state_file = fs::File::create(&state_path)
        .with_context(|| format!("Failed to write {}", state_path.display()))?;
    serde_json::to_writer_pretty(state_file, state)?;
    Ok(())
}

/// Resolve the repository URL: explicit value first, then the saved state
pub fn resolve_repository_url(explicit: Option<String>) -> Result<String> {
    // The state file is only read when no URL was given
    let state = match explicit {
        Some(_) => AppState::default(),
        None => load()?,
    };
    pick_repository_url(explicit, &state)
}

fn pick_repository_url(explicit: Option<String>, state: &AppState) -> Result<String> {
    explicit
        .or_else(|| state.repository_url.clone())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Repository URL not provided and not set in state. \
                 Use `--repository-url` or `image-asset-migrator repository set <url>`."
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saved(url: &str) -> AppState {
        AppState {
            repository_url: Some(url.to_string()),
            updated_at: Some(chrono::Utc::now()),
        }
    }

    #[test]
    fn test_explicit_url_wins_over_saved_state() {
        let state = saved("https://saved.example.com/api/ezp/v2");
        let url = pick_repository_url(
            Some("https://explicit.example.com/api/ezp/v2".to_string()),
            &state,
        )
        .unwrap();
        assert_eq!(url, "https://explicit.example.com/api/ezp/v2");
    }

    #[test]
    fn test_saved_url_used_without_explicit_value() {
        let state = saved("https://saved.example.com/api/ezp/v2");
        let url = pick_repository_url(None, &state).unwrap();
        assert_eq!(url, "https://saved.example.com/api/ezp/v2");
    }

    #[test]
    fn test_missing_url_is_an_error() {
        let err = pick_repository_url(None, &AppState::default()).unwrap_err();
        assert!(err.to_string().contains("not set in state"));
    }

    #[test]
    fn test_state_without_timestamp_still_parses() {
        let state: AppState =
            serde_json::from_str(r#"{"repository_url":"https://cms.example.com/api/ezp/v2"}"#)
                .unwrap();
        assert!(state.updated_at.is_none());
        assert_eq!(
            state.repository_url.as_deref(),
            Some("https://cms.example.com/api/ezp/v2")
        );
    }
}
