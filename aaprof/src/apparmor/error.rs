use std::path::PathBuf;

/// Errors produced while managing an instance's AppArmor profile.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Failed to run {program} {}: {reason}", .args.join(" "))]
    ExternalTool {
        program: String,
        args: Vec<String>,
        output: String,
        reason: String,
    },

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to render AppArmor profile template")]
    Template(#[from] std::fmt::Error),

    #[error("Invalid version format '{input}': {reason}")]
    VersionParse { input: String, reason: String },
}

impl ProfileError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProfileError::Io {
            path: path.into(),
            source,
        }
    }

    /// Captured compiler output, when the error came from running it.
    pub fn output(&self) -> Option<&str> {
        match self {
            ProfileError::ExternalTool { output, .. } => Some(output),
            _ => None,
        }
    }
}
