//! Error types for xext-core

use thiserror::Error;

/// Result type alias using xext-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for xext
///
/// Pipeline failures carry a stable code (see [`Error::code`]) so that callers
/// can map them to a single user-facing message.
#[derive(Error, Debug)]
pub enum Error {
    /// Archive could not be extracted
    #[error("Failed to extract extension archive {path}: {message}")]
    Unzip { path: String, message: String },

    /// An extension with the same name is already installed
    #[error("Extension already installed: {name}")]
    AlreadyInstalled { name: String },

    /// Extension is not installed
    #[error("Extension not found: {name}")]
    NotFound { name: String },

    /// The selected file is not an extension package
    #[error("Not an extension source: {path}")]
    NotExtensionSource { path: String },

    /// The user declined a confirmation prompt
    #[error("Installation of {name} was canceled")]
    Canceled { name: String },

    /// A factory was asked to build the wrong specialization
    #[error("Cannot create a {requested} extension from the type '{declared}'")]
    KindMismatch { requested: String, declared: String },

    /// The manifest file is missing or not a JSON object
    #[error("Invalid extension manifest {path}: {message}")]
    InvalidManifest { path: String, message: String },

    /// Package download failed
    #[error("Failed to download {url}: {message}")]
    Download { url: String, message: String },

    /// Downloaded content does not match the declared digest
    #[error("Digest mismatch for {name}: expected {expected}, got {actual}")]
    DigestMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// Request/response channel failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The authenticated session ended while the operation was pending
    #[error("Session closed")]
    SessionClosed,

    /// Theme has no style file to apply
    #[error("Theme {id} has no style file")]
    ThemeHasNoStyle { id: String },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable error code used by callers to pick a user-facing message
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unzip { .. } => "EXT_UNZIP_ERROR",
            Self::AlreadyInstalled { .. } => "EXT_NAME_ALREADY_INSTALLED",
            Self::NotFound { .. } => "EXT_NOT_FOUND",
            Self::NotExtensionSource { .. } => "EXT_NOT_EXT_SOURCE",
            Self::Canceled { .. } => "EXT_INSTALL_CANCELED",
            Self::KindMismatch { .. } => "EXT_KIND_MISMATCH",
            Self::InvalidManifest { .. } => "EXT_MANIFEST_INVALID",
            Self::Download { .. } => "EXT_DOWNLOAD_ERROR",
            Self::DigestMismatch { .. } => "EXT_DIGEST_MISMATCH",
            Self::Transport(_) => "EXT_TRANSPORT_ERROR",
            Self::SessionClosed => "EXT_SESSION_CLOSED",
            Self::ThemeHasNoStyle { .. } => "THEME_HAS_NO_CSS_FILE",
            Self::ConfigNotFound { .. } | Self::InvalidConfig { .. } => "CONFIG_ERROR",
            Self::YamlParse(_) | Self::JsonParse(_) => "PARSE_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Create an unzip error
    pub fn unzip(path: impl Into<String>, message: impl ToString) -> Self {
        Self::Unzip {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create an already-installed error
    pub fn already_installed(name: impl Into<String>) -> Self {
        Self::AlreadyInstalled { name: name.into() }
    }

    /// Create a not found error
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create a not-an-extension-source error
    pub fn not_extension_source(path: impl Into<String>) -> Self {
        Self::NotExtensionSource { path: path.into() }
    }

    /// Create a canceled error
    pub fn canceled(name: impl Into<String>) -> Self {
        Self::Canceled { name: name.into() }
    }

    /// Create a kind mismatch error
    pub fn kind_mismatch(requested: impl Into<String>, declared: impl Into<String>) -> Self {
        Self::KindMismatch {
            requested: requested.into(),
            declared: declared.into(),
        }
    }

    /// Create an invalid manifest error
    pub fn invalid_manifest(path: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidManifest {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a download error
    pub fn download(url: impl Into<String>, message: impl ToString) -> Self {
        Self::Download {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a digest mismatch error
    pub fn digest_mismatch(
        name: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::DigestMismatch {
            name: name.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl ToString) -> Self {
        Self::Transport(message.to_string())
    }

    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_codes() {
        assert_eq!(Error::unzip("a.zip", "bad").code(), "EXT_UNZIP_ERROR");
        assert_eq!(
            Error::already_installed("foo").code(),
            "EXT_NAME_ALREADY_INSTALLED"
        );
        assert_eq!(Error::not_found("foo").code(), "EXT_NOT_FOUND");
        assert_eq!(
            Error::not_extension_source("a.txt").code(),
            "EXT_NOT_EXT_SOURCE"
        );
    }

    #[test]
    fn test_display_includes_name() {
        let err = Error::kind_mismatch("app", "theme");
        assert_eq!(
            err.to_string(),
            "Cannot create a app extension from the type 'theme'"
        );
    }
}
