// Git LFS setup before the versioning run and finalization after it.

pub mod attributes;
pub mod finalize;
pub mod prepare;

use std::fmt::{Display, Formatter};

use serde::{Serialize, Serializer};

/// How far LFS setup got. Reported as the `lfs-status` step output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LfsStatus {
    Configured,
    /// `git lfs` is not installed on the runner.
    Unavailable,
    /// Setup started but a step failed.
    Degraded { reason: String },
}

impl LfsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LfsStatus::Configured => "configured",
            LfsStatus::Unavailable => "unavailable",
            LfsStatus::Degraded { .. } => "degraded",
        }
    }
}

impl Display for LfsStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LfsStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
