//! Worker lifecycle states.

use std::fmt;

use serde::Serialize;

/// Where a worker is in its install/activate lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Constructed, nothing cached yet.
    #[default]
    Parsed,
    Installing,
    /// Manifest fully cached; waiting for activation.
    Installed,
    Activating,
    /// Stale generations evicted; the current generation is in control.
    Activated,
    /// Install failed. Another install attempt may follow.
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        }
    }

    /// A lifecycle step is already running.
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Installing | Self::Activating)
    }

    pub fn can_install(&self) -> bool {
        !self.is_transitioning()
    }

    pub fn can_activate(&self) -> bool {
        matches!(self, Self::Installed | Self::Activated)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
