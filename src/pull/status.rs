//! Pull request mergeability status

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Mergeability status of a pull request
///
/// The persisted integer codes match the historical column values so that
/// existing rows keep their meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PullRequestStatus {
    /// Test merge produced conflicts
    Conflict,
    /// Mergeability is being (re)computed
    Checking,
    /// Test merge succeeded
    Mergeable,
    /// Merged outside the automated path
    ManuallyMerged,
}

impl PullRequestStatus {
    /// Integer code stored in the `status` column
    pub const fn code(self) -> i32 {
        match self {
            Self::Conflict => 0,
            Self::Checking => 1,
            Self::Mergeable => 2,
            Self::ManuallyMerged => 3,
        }
    }

    /// Decode a stored `status` column value
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Self::Conflict),
            1 => Ok(Self::Checking),
            2 => Ok(Self::Mergeable),
            3 => Ok(Self::ManuallyMerged),
            other => Err(Error::Store(format!("unknown pull request status {other}"))),
        }
    }
}

impl std::fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conflict => write!(f, "conflict"),
            Self::Checking => write!(f, "checking"),
            Self::Mergeable => write!(f, "mergeable"),
            Self::ManuallyMerged => write!(f, "manually-merged"),
        }
    }
}
