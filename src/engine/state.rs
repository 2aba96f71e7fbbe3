//! Engine lifecycle states and startup policy.

use std::fmt;

use serde::Serialize;

/// Lifecycle of the single engine instance.
///
/// `Uninitialized -> Loading -> Ready -> Draining -> Terminated`, with
/// `Loading -> Failed(reason)` when any load step errors. `Failed` only moves
/// on to `Terminated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum EngineState {
    Uninitialized,
    Loading,
    Ready,
    Draining,
    Terminated,
    Failed(String),
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Loading => "loading",
            EngineState::Ready => "ready",
            EngineState::Draining => "draining",
            EngineState::Terminated => "terminated",
            EngineState::Failed(_) => "failed",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, EngineState::Ready)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Failed(reason) => write!(f, "failed ({})", reason),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// When the engine is loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum StartupPolicy {
    /// Load during bootstrap, before the listener accepts traffic.
    #[default]
    Eager,
    /// Load on the first `acquire`; only the first request pays for it.
    Lazy,
}

impl StartupPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            StartupPolicy::Eager => "eager",
            StartupPolicy::Lazy => "lazy",
        }
    }
}

impl fmt::Display for StartupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
