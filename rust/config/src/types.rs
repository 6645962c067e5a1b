//! Execution mode and forget-mult configuration.

use serde::{Deserialize, Serialize};

/// Which implementation of the forget-mult recurrence to run.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "burn", derive(burn::config::Config))]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Fused lane-parallel kernel when the backend supports it on the
    /// operands' device, per-timestep reference otherwise.
    #[default]
    Auto,
    /// Fused lane-parallel kernel. Fails with a placement error instead of
    /// falling back when it cannot run.
    Fused,
    /// Per-timestep reference loop built from framework tensor ops.
    Reference,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Fused => write!(f, "fused"),
            Self::Reference => write!(f, "reference"),
        }
    }
}

impl std::str::FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "fused" | "kernel" | "cuda" | "gpu" => Ok(Self::Fused),
            "reference" | "ref" | "cpu-loop" | "naive" => Ok(Self::Reference),
            _ => Err(format!(
                "unknown execution mode '{s}'. Use: auto, fused, reference"
            )),
        }
    }
}

impl ExecutionMode {
    /// Whether this mode may run the fused kernel at all.
    #[must_use]
    pub fn allows_fused(self) -> bool {
        matches!(self, Self::Auto | Self::Fused)
    }
}

/// Configuration for a forget-mult layer.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForgetMultConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
}

impl ForgetMultConfig {
    #[must_use]
    pub fn new(mode: ExecutionMode) -> Self {
        Self { mode }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }
}
