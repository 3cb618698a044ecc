//! User confirmation prompts raised during installation

use async_trait::async_trait;

/// A question the installer needs answered before continuing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// The package runs code inside the host
    InstallCode { display_name: String },
    /// A newer version of an installed extension
    UpdateInstall {
        display_name: String,
        installed_version: String,
        version: String,
    },
    /// Same or older version, or a different package with a taken name
    OverrideInstall {
        installed_name: String,
        installed_version: String,
        display_name: String,
        version: String,
    },
}

impl Prompt {
    /// Message shown to the user
    pub fn message(&self) -> String {
        match self {
            Self::InstallCode { display_name } => format!(
                "{} contains code that runs inside the application. Only install extensions from sources you trust. Continue?",
                display_name
            ),
            Self::UpdateInstall {
                display_name,
                installed_version,
                version,
            } => format!(
                "{} {} is installed. Update to {}?",
                display_name, installed_version, version
            ),
            Self::OverrideInstall {
                installed_name,
                installed_version,
                display_name,
                version,
            } => format!(
                "{} {} is already installed. Replace it with {} {}?",
                installed_name, installed_version, display_name, version
            ),
        }
    }
}

/// Answers installer prompts
#[async_trait]
pub trait Confirmation: Send + Sync {
    async fn confirm(&self, prompt: &Prompt) -> bool;
}

/// Gives the same answer to every prompt
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

#[async_trait]
impl Confirmation for AutoConfirm {
    async fn confirm(&self, _prompt: &Prompt) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_versions() {
        let prompt = Prompt::UpdateInstall {
            display_name: "Notes".into(),
            installed_version: "1.0.0".into(),
            version: "1.1.0".into(),
        };
        let message = prompt.message();
        assert!(message.contains("1.0.0"));
        assert!(message.contains("1.1.0"));
    }
}
