use std::fmt;
use std::time::Duration;

/// Inventory level a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Org,
    Vdc,
    AppGroup,
    Vm,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Org => "org",
            Level::Vdc => "vdc",
            Level::AppGroup => "vapp",
            Level::Vm => "vm",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything that can go wrong while serving one scrape.
///
/// `UnresolvedTarget`, `Auth`, `Connectivity` and `Timeout` end the request
/// without samples. `Traversal` and `Assembly` below the organization listing
/// only skip the affected subtree.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollectError {
    #[error("No Config found for: {0}")]
    UnresolvedTarget(String),
    #[error("login rejected for {user}@{org} on {host}")]
    Auth {
        user: String,
        org: String,
        host: String,
    },
    #[error("cannot reach {host}: {message}")]
    Connectivity { host: String, message: String },
    #[error("{level} traversal failed: {message}")]
    Traversal { level: Level, message: String },
    #[error("{level} record rejected: {message}")]
    Assembly { level: Level, message: String },
    #[error("collection exceeded {0:?}")]
    Timeout(Duration),
}

impl CollectError {
    pub fn traversal(level: Level, message: impl fmt::Display) -> Self {
        CollectError::Traversal {
            level,
            message: message.to_string(),
        }
    }

    pub fn assembly(level: Level, message: impl fmt::Display) -> Self {
        CollectError::Assembly {
            level,
            message: message.to_string(),
        }
    }

    pub fn connectivity(host: &str, message: impl fmt::Display) -> Self {
        CollectError::Connectivity {
            host: host.to_string(),
            message: message.to_string(),
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self {
            CollectError::Traversal { level, .. } | CollectError::Assembly { level, .. } => {
                Some(*level)
            }
            _ => None,
        }
    }

    /// Short, stable name used as a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            CollectError::UnresolvedTarget(_) => "config",
            CollectError::Auth { .. } => "auth",
            CollectError::Connectivity { .. } => "connectivity",
            CollectError::Traversal { .. } => "traversal",
            CollectError::Assembly { .. } => "assembly",
            CollectError::Timeout(_) => "timeout",
        }
    }
}

pub type Result<T, E = CollectError> = std::result::Result<T, E>;
