//! Theme selection and search

use std::sync::Arc;
use tracing::{debug, info};
use xext_core::store::{load_typed, KeyValueStore};
use xext_core::{Error, Result};

use crate::extension::{SharedExtension, Theme, ThemeCandidate, ThemeId, ThemeInject, THEME_MATCH_RULES};
use crate::lifecycle::LifecycleController;
use crate::search::{match_score, parse_keys};

/// Store key of the current theme id
pub const CURRENT_THEME_KEY: &str = "EXTENSIONS::theme.current";

/// Stylesheet change to apply after selecting a theme
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeStyle {
    /// Only the default stylesheet
    Default,
    /// Load this stylesheet after the default one
    Append(String),
    /// Load this stylesheet instead of the default one
    Override(String),
}

/// Themes of one extension that matched a search
#[derive(Debug, Clone)]
pub struct ThemeMatches {
    pub extension: SharedExtension,
    /// Matching themes, best first
    pub themes: Vec<(Theme, u32)>,
    /// Sum of the theme scores
    pub score: u32,
}

/// Picks the current theme among enabled theme extensions
pub struct ThemeManager {
    controller: Arc<LifecycleController>,
    store: Arc<dyn KeyValueStore>,
}

impl ThemeManager {
    pub fn new(controller: Arc<LifecycleController>, store: Arc<dyn KeyValueStore>) -> Self {
        Self { controller, store }
    }

    /// Every theme of the enabled theme extensions
    pub fn all(&self) -> Vec<(SharedExtension, Theme)> {
        self.controller
            .themes()
            .into_iter()
            .flat_map(|ext| {
                let themes = ext.themes().to_vec();
                themes.into_iter().map(move |theme| (ext.clone(), theme))
            })
            .collect()
    }

    pub fn find(&self, id: &ThemeId) -> Option<(SharedExtension, Theme)> {
        let ext = self
            .controller
            .themes()
            .into_iter()
            .find(|ext| ext.name() == id.extension)?;
        let theme = ext.get_theme(&id.name)?.clone();
        Some((ext, theme))
    }

    /// Id of the selected theme, if one is stored
    pub fn current_id(&self) -> Option<ThemeId> {
        load_typed(self.store.as_ref(), CURRENT_THEME_KEY)
    }

    /// Selected theme, if it is still available
    pub fn current(&self) -> Option<(SharedExtension, Theme)> {
        self.current_id().and_then(|id| self.find(&id))
    }

    /// Stylesheet of the selected theme
    ///
    /// Falls back to the default style when the theme went away.
    pub fn current_style(&self) -> ThemeStyle {
        self.current()
            .and_then(|(ext, theme)| style_of(&ext, &theme).ok())
            .unwrap_or(ThemeStyle::Default)
    }

    /// Select a theme, or the default style with `None`
    pub fn set_current(&self, id: Option<&ThemeId>) -> Result<ThemeStyle> {
        let Some(id) = id else {
            self.store.remove(CURRENT_THEME_KEY)?;
            info!("Reset to the default theme");
            return Ok(ThemeStyle::Default);
        };

        let (ext, theme) = self
            .find(id)
            .ok_or_else(|| Error::not_found(id.to_string()))?;
        let style = style_of(&ext, &theme)?;
        self.store
            .set(CURRENT_THEME_KEY, serde_json::to_value(id)?)?;
        info!("Switched to theme {}", id);
        Ok(style)
    }

    /// Search themes, grouped by extension
    ///
    /// Groups are ordered by their summed score.
    pub fn search(&self, query: &str) -> Vec<ThemeMatches> {
        let keys = parse_keys(query);
        let mut groups: Vec<ThemeMatches> = self
            .controller
            .themes()
            .into_iter()
            .filter_map(|ext| {
                let mut themes: Vec<(Theme, u32)> = ext
                    .themes()
                    .iter()
                    .filter_map(|theme| {
                        let candidate = ThemeCandidate {
                            theme,
                            extension: &ext,
                        };
                        let score = match_score(THEME_MATCH_RULES, &candidate, &keys);
                        (score > 0).then(|| (theme.clone(), score))
                    })
                    .collect();
                if themes.is_empty() {
                    return None;
                }
                themes.sort_by(|a, b| b.1.cmp(&a.1));
                let score = themes.iter().map(|(_, score)| score).sum();
                Some(ThemeMatches {
                    extension: ext,
                    themes,
                    score,
                })
            })
            .collect();
        groups.sort_by(|a, b| b.score.cmp(&a.score));
        debug!("Theme search '{}' matched {} extensions", query, groups.len());
        groups
    }
}

fn style_of(ext: &SharedExtension, theme: &Theme) -> Result<ThemeStyle> {
    let style = theme
        .style(ext.local_path().as_deref())
        .ok_or_else(|| Error::ThemeHasNoStyle {
            id: theme.id().to_string(),
        })?;
    Ok(match theme.inject() {
        ThemeInject::Append => ThemeStyle::Append(style),
        ThemeInject::Override => ThemeStyle::Override(style),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::{Extension, StaticModuleLoader};
    use crate::registry::ExtensionDatabase;
    use serde_json::json;
    use xext_core::store::MemoryStore;
    use xext_core::types::{PackageManifest, RuntimeData};

    fn manager() -> ThemeManager {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let db = Arc::new(ExtensionDatabase::open(store.clone()));
        let controller = LifecycleController::new(db, Arc::new(StaticModuleLoader::new()));
        let pkg = PackageManifest::from_value(json!({
            "name": "dark-pack",
            "type": "theme",
            "version": "1.0.0",
            "keywords": ["dark"],
            "themes": [
                {"name": "midnight", "displayName": "Midnight", "style": "https://cdn/midnight.css", "inject": "override"},
                {"name": "dusk", "displayName": "Dusk", "style": "https://cdn/dusk.css"},
                {"name": "plain", "displayName": "Plain"}
            ]
        }))
        .unwrap();
        controller.init(vec![Arc::new(Extension::create(pkg, RuntimeData::default()))]);
        ThemeManager::new(controller, store)
    }

    #[test]
    fn test_set_current() {
        let manager = manager();
        assert_eq!(manager.current_style(), ThemeStyle::Default);

        let style = manager
            .set_current(Some(&ThemeId::new("dark-pack", "midnight")))
            .unwrap();
        assert_eq!(style, ThemeStyle::Override("https://cdn/midnight.css".into()));
        assert_eq!(manager.current_id(), Some(ThemeId::new("dark-pack", "midnight")));

        let err = manager
            .set_current(Some(&ThemeId::new("dark-pack", "plain")))
            .unwrap_err();
        assert_eq!(err.code(), "THEME_HAS_NO_CSS_FILE");
        assert_eq!(manager.current_id(), Some(ThemeId::new("dark-pack", "midnight")));

        assert_eq!(manager.set_current(None).unwrap(), ThemeStyle::Default);
        assert_eq!(manager.current_id(), None);
    }

    #[test]
    fn test_search_groups_by_extension() {
        let manager = manager();
        let groups = manager.search("dark");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].themes.len(), 3);
        assert_eq!(groups[0].score, groups[0].themes.iter().map(|(_, s)| s).sum::<u32>());

        let groups = manager.search("dusk");
        assert_eq!(groups[0].themes[0].0.name(), "dusk");
        assert!(manager.search("nothing-like-this").is_empty());
    }
}
