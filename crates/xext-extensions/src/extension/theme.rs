//! Themes declared by theme extensions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;
use xext_core::types::ThemeManifest;

use super::{resolve_asset, Extension};
use crate::pinyin::transliterate;
use crate::search::{FieldValue, MatchRule, Matchable};

/// How a theme stylesheet is applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeInject {
    /// Layered on top of the default stylesheet
    #[default]
    Append,
    /// Replaces the default stylesheet
    Override,
}

impl ThemeInject {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("override") => Self::Override,
            _ => Self::Append,
        }
    }
}

/// Global theme identifier, `<extension>:<theme>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThemeId {
    pub extension: String,
    pub name: String,
}

impl ThemeId {
    pub fn new(extension: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ThemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.extension, self.name)
    }
}

impl FromStr for ThemeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((extension, name)) if !extension.is_empty() && !name.is_empty() => {
                Ok(Self::new(extension, name))
            }
            _ => Err(format!("Invalid theme id '{}', expected <extension>:<theme>", s)),
        }
    }
}

/// One theme owned by a theme extension
#[derive(Debug, Clone)]
pub struct Theme {
    extension: String,
    manifest: ThemeManifest,
    pinyin_names: OnceLock<Vec<String>>,
}

impl Theme {
    pub(crate) fn new(extension: &str, manifest: ThemeManifest) -> Self {
        Self {
            extension: extension.to_string(),
            manifest,
            pinyin_names: OnceLock::new(),
        }
    }

    pub fn id(&self) -> ThemeId {
        ThemeId::new(&self.extension, &self.manifest.name)
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn extension_name(&self) -> &str {
        &self.extension
    }

    pub fn display_name(&self) -> &str {
        self.manifest
            .display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.manifest.name)
    }

    pub fn description(&self) -> Option<&str> {
        self.manifest.description.as_deref()
    }

    pub fn color(&self) -> Option<&str> {
        self.manifest.color.as_deref()
    }

    pub fn inject(&self) -> ThemeInject {
        ThemeInject::parse(self.manifest.inject.as_deref())
    }

    /// Stylesheet location, resolved against the package directory
    pub fn style(&self, local_path: Option<&Path>) -> Option<String> {
        self.manifest
            .style
            .as_deref()
            .filter(|style| !style.is_empty())
            .map(|style| resolve_asset(style, local_path))
    }

    pub fn preview(&self, local_path: Option<&Path>) -> Option<String> {
        self.manifest
            .preview
            .as_deref()
            .filter(|preview| !preview.is_empty())
            .map(|preview| resolve_asset(preview, local_path))
    }

    pub fn pinyin_names(&self) -> &[String] {
        self.pinyin_names
            .get_or_init(|| transliterate(self.display_name()))
    }

    pub fn manifest(&self) -> &ThemeManifest {
        &self.manifest
    }
}

/// Field weights for theme search
pub const THEME_MATCH_RULES: &[MatchRule] = &[
    MatchRule::new("name", 100, 50),
    MatchRule::new("displayName", 100, 50),
    MatchRule::new("pinyinNames", 50, 25).array(),
    MatchRule::new("description", 0, 25),
    MatchRule::new("author", 100, 0).prefixed("@"),
    MatchRule::new("publisher", 100, 0).prefixed("@"),
    MatchRule::new("extKeywords", 50, 10).array(),
    MatchRule::new("extDisplayName", 50, 25),
    MatchRule::new("extName", 50, 25),
    MatchRule::new("extPinyinNames", 50, 25).array(),
];

/// A theme scored together with its owning extension
pub struct ThemeCandidate<'a> {
    pub theme: &'a Theme,
    pub extension: &'a Extension,
}

impl Matchable for ThemeCandidate<'_> {
    fn match_field(&self, field: &str) -> Option<FieldValue> {
        let ext = self.extension;
        match field {
            "name" => Some(self.theme.name().into()),
            "displayName" => Some(self.theme.display_name().into()),
            "pinyinNames" => Some(self.theme.pinyin_names().to_vec().into()),
            "description" => self.theme.description().map(Into::into),
            "author" => ext.author().map(Into::into),
            "publisher" => ext.publisher().map(Into::into),
            "extKeywords" => Some(ext.keywords().to_vec().into()),
            "extDisplayName" => Some(ext.display_name().into()),
            "extName" => Some(ext.name().into()),
            "extPinyinNames" => Some(ext.pinyin_names().to_vec().into()),
            _ => None,
        }
    }
}
