//! App specialization

use serde::{Deserialize, Serialize};

use super::{resolve_asset, resolve_icon, Extension};

/// Default accent color of apps that declare none
pub const DEFAULT_ACCENT_COLOR: &str = "#f50057";

/// How an app renders its content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AppType {
    /// Rendered by a module inside the host view
    InsideView,
    /// Renders a web page
    WebView,
    /// Rendered by the module itself
    Custom,
}

impl AppType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "insideView" => Some(Self::InsideView),
            "webView" => Some(Self::WebView),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsideView => "insideView",
            Self::WebView => "webView",
            Self::Custom => "custom",
        }
    }
}

/// App data resolved from the manifest
#[derive(Debug, Clone, PartialEq)]
pub struct AppProfile {
    pub app_type: AppType,
}

/// Borrowed view of an app extension
#[derive(Clone, Copy)]
pub struct AppView<'a> {
    ext: &'a Extension,
    profile: &'a AppProfile,
}

impl<'a> AppView<'a> {
    pub(crate) fn new(ext: &'a Extension, profile: &'a AppProfile) -> Self {
        Self { ext, profile }
    }

    pub fn extension(&self) -> &'a Extension {
        self.ext
    }

    pub fn app_type(&self) -> AppType {
        self.profile.app_type
    }

    /// Web page URL, resolved against the package directory when relative
    pub fn web_view_url(&self) -> Option<String> {
        let url = self.ext.pkg().web_view_url.as_deref()?;
        if url.is_empty() {
            return None;
        }
        let local_path = self.ext.local_path();
        Some(resolve_asset(url, local_path.as_deref()))
    }

    /// The web page is served from the package rather than the network
    pub fn is_local_web_view(&self) -> bool {
        self.web_view_url()
            .is_some_and(|url| url.starts_with("file://"))
    }

    /// Icon shown for the app, falling back to the extension icon
    pub fn icon(&self) -> String {
        match self.ext.pkg().app_icon.as_deref() {
            Some(icon) if !icon.is_empty() => {
                let local_path = self.ext.local_path();
                resolve_icon(icon, local_path.as_deref())
            }
            _ => self.ext.icon(),
        }
    }

    pub fn accent_color(&self) -> &'a str {
        let pkg = self.ext.pkg();
        pkg.app_accent_color
            .as_deref()
            .or(pkg.accent_color.as_deref())
            .filter(|color| !color.is_empty())
            .unwrap_or(DEFAULT_ACCENT_COLOR)
    }

    pub fn back_color(&self) -> Option<&'a str> {
        self.ext.pkg().app_back_color.as_deref()
    }

    /// Default app shown on startup
    pub fn is_default(&self) -> bool {
        self.ext
            .pkg()
            .build_in
            .as_ref()
            .is_some_and(|build_in| build_in.as_default)
    }

    /// Always pinned, cannot be unpinned
    pub fn is_fixed(&self) -> bool {
        self.ext
            .pkg()
            .build_in
            .as_ref()
            .is_some_and(|build_in| build_in.fixed || build_in.as_default)
    }

    /// Shown in the main menu
    ///
    /// Fixed apps are always pinned. Others follow the stored preference,
    /// which defaults to pinned for built-in apps only.
    pub fn is_pinned_on_menu(&self) -> bool {
        if self.is_fixed() {
            return true;
        }
        self.ext
            .with_data(|data| data.pinned_on_menu)
            .unwrap_or_else(|| self.ext.is_builtin())
    }

    pub fn pinned_on_menu_order(&self) -> Option<i64> {
        self.ext.with_data(|data| data.pinned_on_menu_order)
    }

    /// The user may pin or unpin the app
    pub fn can_pin_on_menu(&self) -> bool {
        !self.is_fixed() && self.ext.is_available()
    }

    pub fn notice_count(&self) -> u32 {
        self.ext.with_data(|data| data.notice_count.unwrap_or(0))
    }
}
