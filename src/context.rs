//! Application context.
//!
//! Everything a view needs besides its own data: the API location, the
//! refresh bus, the theme preference and the selected category. It is built
//! once at startup and passed down explicitly; building fails if a required
//! piece was never provided.

use crate::board::{Selection, TaskBoard};
use crate::categories::CategoryWatcher;
use crate::config::Config;
use crate::events::RefreshBus;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Key under which the theme preference is stored.
pub const THEME_KEY: &str = "themeMode";

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("{0} must be provided before the application context is built")]
    NotInitialized(&'static str),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode state file: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    #[default]
    Dark,
}

impl ThemeMode {
    pub fn toggled(self) -> Self {
        match self {
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::Light,
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThemeMode::Light => f.write_str("light"),
            ThemeMode::Dark => f.write_str("dark"),
        }
    }
}

// * Theme persistence ........................................................

/// A JSON object on disk holding the theme under [`THEME_KEY`]. Other keys
/// in the file are preserved.
#[derive(Debug, Clone)]
pub struct ThemeStore {
    path: PathBuf,
}

impl ThemeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Map<String, Value> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return Map::new(),
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => map,
            _ => {
                warn!(path = %self.path.display(), "ignoring unreadable state file");
                Map::new()
            }
        }
    }

    /// The saved theme; dark when nothing valid is saved.
    pub fn load(&self) -> ThemeMode {
        self.read_map()
            .get(THEME_KEY)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, mode: ThemeMode) -> Result<(), ContextError> {
        let mut map = self.read_map();
        map.insert(THEME_KEY.to_string(), serde_json::to_value(mode)?);
        let content = serde_json::to_string_pretty(&Value::Object(map))?;
        std::fs::write(&self.path, content).map_err(|source| ContextError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(%mode, path = %self.path.display(), "saved theme");
        Ok(())
    }
}

// * Context ..................................................................

pub struct AppContext {
    api_url: String,
    bus: RefreshBus,
    theme_store: ThemeStore,
    theme: ThemeMode,
    selected_category: Option<String>,
}

#[derive(Default)]
pub struct AppContextBuilder {
    api_url: Option<String>,
    bus: Option<RefreshBus>,
    theme_store: Option<ThemeStore>,
}

impl AppContextBuilder {
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    pub fn bus(mut self, bus: RefreshBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn theme_store(mut self, store: ThemeStore) -> Self {
        self.theme_store = Some(store);
        self
    }

    pub fn build(self) -> Result<AppContext, ContextError> {
        let api_url = self.api_url.ok_or(ContextError::NotInitialized("API URL"))?;
        let bus = self.bus.ok_or(ContextError::NotInitialized("refresh bus"))?;
        let theme_store = self
            .theme_store
            .ok_or(ContextError::NotInitialized("theme store"))?;
        let theme = theme_store.load();

        Ok(AppContext {
            api_url,
            bus,
            theme_store,
            theme,
            selected_category: None,
        })
    }
}

impl AppContext {
    pub fn builder() -> AppContextBuilder {
        AppContextBuilder::default()
    }

    pub fn from_config(config: &Config) -> Result<Self, ContextError> {
        Self::builder()
            .api_url(config.api_url.clone())
            .bus(RefreshBus::new())
            .theme_store(ThemeStore::new(config.state_file.clone()))
            .build()
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn bus(&self) -> &RefreshBus {
        &self.bus
    }

    pub fn theme(&self) -> ThemeMode {
        self.theme
    }

    /// Flips the theme and persists it.
    pub fn toggle_theme(&mut self) -> Result<ThemeMode, ContextError> {
        let next = self.theme.toggled();
        self.theme_store.save(next)?;
        self.theme = next;
        Ok(next)
    }

    pub fn selected_category(&self) -> Option<&str> {
        self.selected_category.as_deref()
    }

    pub fn set_selected_category(&mut self, category: Option<String>) {
        self.selected_category = category.filter(|c| !c.is_empty());
    }

    /// A board showing the selected category, sharing this context's bus.
    pub fn board(&self) -> TaskBoard {
        TaskBoard::new(self.api_url.clone(), self.bus.clone()).with_selection(Selection {
            category: self.selected_category.clone(),
            ..Default::default()
        })
    }

    pub fn watch_categories(&self, interval: Duration) -> CategoryWatcher {
        CategoryWatcher::spawn(self.api_url.clone(), &self.bus, interval)
    }
}
