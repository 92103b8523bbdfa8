use std::collections::BTreeSet;

use chrono::Utc;
use rusqlite::Connection;
use serde::de::DeserializeOwned;

use crate::data::repository;
use crate::error::AppError;
use crate::models::filter::FilterSet;
use crate::models::settings::{ActivityEntry, SearchPreset, Theme, UiSettings};

pub const THEME_KEY: &str = "foldertree-theme";
pub const FAVORITES_KEY: &str = "foldertree-favorites";
pub const ACTIVITY_KEY: &str = "foldertree-history";
pub const SETTINGS_KEY: &str = "foldertree-settings";
pub const PRESETS_KEY: &str = "foldertree-presets";

pub const MAX_ACTIVITY_ENTRIES: usize = 50;

/// Reads a JSON value, falling back to the default when the key is absent
/// or holds something unreadable.
fn load_or_default<T>(conn: &Connection, key: &str) -> Result<T, AppError>
where
    T: DeserializeOwned + Default,
{
    match repository::get_json(conn, key) {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Ok(T::default()),
        Err(AppError::Serde(err)) => {
            tracing::warn!(key, %err, "ignoring malformed stored value");
            Ok(T::default())
        }
        Err(err) => Err(err),
    }
}

pub fn get_theme(conn: &Connection) -> Result<Theme, AppError> {
    Ok(repository::get_setting(conn, THEME_KEY)?
        .map(|raw| Theme::parse(&raw))
        .unwrap_or_default())
}

pub fn set_theme(conn: &Connection, theme: Theme) -> Result<Theme, AppError> {
    repository::set_setting(conn, THEME_KEY, theme.as_str())?;
    Ok(theme)
}

pub fn get_favorites(conn: &Connection) -> Result<BTreeSet<String>, AppError> {
    let ids: Vec<String> = load_or_default(conn, FAVORITES_KEY)?;
    Ok(ids.into_iter().collect())
}

/// Flips membership of `id`; returns whether it is now a favorite.
pub fn toggle_favorite(conn: &Connection, id: &str) -> Result<bool, AppError> {
    let mut favorites = get_favorites(conn)?;
    let now_favorite = if favorites.remove(id) {
        false
    } else {
        favorites.insert(id.to_string());
        true
    };
    let ids: Vec<&String> = favorites.iter().collect();
    repository::set_json(conn, FAVORITES_KEY, &ids)?;
    Ok(now_favorite)
}

pub fn get_activity(conn: &Connection) -> Result<Vec<ActivityEntry>, AppError> {
    load_or_default(conn, ACTIVITY_KEY)
}

/// Prepends an entry, keeping the newest `MAX_ACTIVITY_ENTRIES`.
pub fn log_activity(
    conn: &Connection,
    action: &str,
    node_id: Option<&str>,
    details: Option<&str>,
) -> Result<(), AppError> {
    let mut entries = get_activity(conn)?;
    entries.insert(
        0,
        ActivityEntry {
            timestamp: Utc::now(),
            action: action.to_string(),
            node_id: node_id.map(str::to_string),
            details: details.map(str::to_string),
        },
    );
    entries.truncate(MAX_ACTIVITY_ENTRIES);
    repository::set_json(conn, ACTIVITY_KEY, &entries)
}

pub fn clear_activity(conn: &Connection) -> Result<(), AppError> {
    repository::delete_setting(conn, ACTIVITY_KEY)?;
    Ok(())
}

pub fn get_settings(conn: &Connection) -> Result<UiSettings, AppError> {
    load_or_default(conn, SETTINGS_KEY)
}

pub fn save_settings(conn: &Connection, settings: &UiSettings) -> Result<(), AppError> {
    repository::set_json(conn, SETTINGS_KEY, settings)
}

pub fn reset_settings(conn: &Connection) -> Result<UiSettings, AppError> {
    repository::delete_setting(conn, SETTINGS_KEY)?;
    Ok(UiSettings::default())
}

pub fn get_presets(conn: &Connection) -> Result<Vec<SearchPreset>, AppError> {
    load_or_default(conn, PRESETS_KEY)
}

/// Stores a named filter set, replacing any preset with the same name.
pub fn save_preset(conn: &Connection, name: &str, filters: FilterSet) -> Result<Vec<SearchPreset>, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::General("preset name is empty".to_string()));
    }
    let mut presets = get_presets(conn)?;
    presets.retain(|p| p.name != name);
    presets.push(SearchPreset {
        name: name.to_string(),
        filters,
    });
    repository::set_json(conn, PRESETS_KEY, &presets)?;
    Ok(presets)
}

pub fn delete_preset(conn: &Connection, name: &str) -> Result<bool, AppError> {
    let mut presets = get_presets(conn)?;
    let before = presets.len();
    presets.retain(|p| p.name != name);
    if presets.len() == before {
        return Ok(false);
    }
    repository::set_json(conn, PRESETS_KEY, &presets)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::migrations;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrations::run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn absent_keys_use_defaults() {
        let conn = setup_db();
        assert_eq!(get_theme(&conn).unwrap(), Theme::Light);
        assert!(get_favorites(&conn).unwrap().is_empty());
        assert!(get_activity(&conn).unwrap().is_empty());
        assert_eq!(get_settings(&conn).unwrap(), UiSettings::default());
        assert!(get_presets(&conn).unwrap().is_empty());
    }

    #[test]
    fn theme_persists() {
        let conn = setup_db();
        set_theme(&conn, Theme::Dark).unwrap();
        assert_eq!(get_theme(&conn).unwrap(), Theme::Dark);
        assert_eq!(
            repository::get_setting(&conn, THEME_KEY).unwrap().as_deref(),
            Some("dark")
        );
    }

    #[test]
    fn favorites_toggle() {
        let conn = setup_db();
        assert!(toggle_favorite(&conn, "a").unwrap());
        assert!(toggle_favorite(&conn, "b").unwrap());
        assert!(!toggle_favorite(&conn, "a").unwrap());
        let favorites = get_favorites(&conn).unwrap();
        assert_eq!(favorites.into_iter().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn activity_is_newest_first_and_capped() {
        let conn = setup_db();
        for i in 0..(MAX_ACTIVITY_ENTRIES + 5) {
            log_activity(&conn, &format!("step {i}"), None, None).unwrap();
        }
        let entries = get_activity(&conn).unwrap();
        assert_eq!(entries.len(), MAX_ACTIVITY_ENTRIES);
        assert_eq!(entries[0].action, format!("step {}", MAX_ACTIVITY_ENTRIES + 4));

        clear_activity(&conn).unwrap();
        assert!(get_activity(&conn).unwrap().is_empty());
    }

    #[test]
    fn malformed_values_fall_back() {
        let conn = setup_db();
        repository::set_setting(&conn, SETTINGS_KEY, "{not json").unwrap();
        repository::set_setting(&conn, FAVORITES_KEY, "42").unwrap();
        assert_eq!(get_settings(&conn).unwrap(), UiSettings::default());
        assert!(get_favorites(&conn).unwrap().is_empty());
    }

    #[test]
    fn partial_settings_fill_defaults() {
        let conn = setup_db();
        repository::set_setting(&conn, SETTINGS_KEY, r#"{"batchSize": 9}"#).unwrap();
        let settings = get_settings(&conn).unwrap();
        assert_eq!(settings.batch_size, 9);
        assert_eq!(settings.ai_model, "mistral");

        let custom = UiSettings { compact_mode: true, ..settings };
        save_settings(&conn, &custom).unwrap();
        assert!(get_settings(&conn).unwrap().compact_mode);
        assert_eq!(reset_settings(&conn).unwrap(), UiSettings::default());
        assert_eq!(get_settings(&conn).unwrap(), UiSettings::default());
    }

    #[test]
    fn presets_replace_by_name() {
        let conn = setup_db();
        let work = FilterSet { tags: vec!["work".into()], ..Default::default() };
        save_preset(&conn, "work", work.clone()).unwrap();
        let text = FilterSet { text: Some("inv".into()), ..Default::default() };
        let presets = save_preset(&conn, "work", text.clone()).unwrap();
        assert_eq!(presets.len(), 1);
        assert_eq!(presets[0].filters, text);
        assert!(save_preset(&conn, "  ", work).is_err());

        assert!(delete_preset(&conn, "work").unwrap());
        assert!(!delete_preset(&conn, "work").unwrap());
    }
}
