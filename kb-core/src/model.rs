//! The shared vocabulary of the job data model (spec.md §3), kept in
//! `kb-core` because the repository, broker, processors, and HTTP edge all
//! need the same enums without depending on each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What a job asks a processor to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    SubjectAnalysis,
    EmailAnalysis,
    Embedding,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubjectAnalysis => "subject_analysis",
            Self::EmailAnalysis => "email_analysis",
            Self::Embedding => "embedding",
        }
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subject_analysis" => Ok(Self::SubjectAnalysis),
            "email_analysis" => Ok(Self::EmailAnalysis),
            "embedding" => Ok(Self::Embedding),
            other => Err(format!("unknown job type: {other}")),
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where the job's payload originated. Open-ended: unrecognized sources
/// round-trip as `Other(String)` rather than being rejected, since the
/// broker/scheduler route by this value and new connectors shouldn't
/// require an enum change here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Email,
    Sharepoint,
    AwsS3,
    Azure,
    Other(String),
}

impl SourceType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Email => "email",
            Self::Sharepoint => "sharepoint",
            Self::AwsS3 => "aws_s3",
            Self::Azure => "azure",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl From<&str> for SourceType {
    fn from(s: &str) -> Self {
        match s {
            "email" => Self::Email,
            "sharepoint" => Self::Sharepoint,
            "aws_s3" => Self::AwsS3,
            "azure" => Self::Azure,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Job lifecycle state (spec.md §3, §4.7). Transitions are monotonic except
/// `Processing -> Pending` on lock expiry (the janitor sweep).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Scheduled,
    Processing { lock_expires_at: DateTime<Utc> },
    Completed { completed_at: DateTime<Utc> },
    Failed { failed_at: DateTime<Utc>, error: String },
}

impl JobStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
            Self::Processing { .. } => "processing",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }

    pub fn is_claimable(&self) -> bool {
        matches!(self, Self::Pending | Self::Scheduled)
    }

    /// Coarse 0.0-1.0 progress estimate for the `/status/{job_id}` response
    /// (spec.md §4.5). The repository only tracks lifecycle state, not a
    /// finer-grained counter, so this maps state directly to a fraction
    /// rather than interpolating within a state.
    pub fn progress_estimate(&self) -> f32 {
        match self {
            Self::Pending => 0.0,
            Self::Scheduled => 0.1,
            Self::Processing { .. } => 0.5,
            Self::Completed { .. } => 1.0,
            Self::Failed { .. } => 1.0,
        }
    }
}

/// Per-task priority, 1 (lowest) to 10 (highest), defaulting to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobPriority(u8);

impl JobPriority {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;
    pub const DEFAULT: u8 = 5;

    pub fn new(value: u8) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for JobPriority {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl std::fmt::Display for JobPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_type_round_trips_through_str() {
        for jt in [JobType::SubjectAnalysis, JobType::EmailAnalysis, JobType::Embedding] {
            assert_eq!(JobType::from_str(jt.as_str()).unwrap(), jt);
        }
    }

    #[test]
    fn priority_clamps_out_of_range_values() {
        assert_eq!(JobPriority::new(0).value(), 1);
        assert_eq!(JobPriority::new(99).value(), 10);
        assert_eq!(JobPriority::default().value(), 5);
    }

    #[test]
    fn progress_estimate_is_monotonic_towards_terminal_states() {
        assert_eq!(JobStatus::Pending.progress_estimate(), 0.0);
        assert!(JobStatus::Scheduled.progress_estimate() > JobStatus::Pending.progress_estimate());
        let processing = JobStatus::Processing { lock_expires_at: Utc::now() };
        assert!(processing.progress_estimate() > JobStatus::Scheduled.progress_estimate());
        assert_eq!(JobStatus::Completed { completed_at: Utc::now() }.progress_estimate(), 1.0);
    }

    #[test]
    fn status_terminal_and_claimable_are_disjoint() {
        let pending = JobStatus::Pending;
        assert!(pending.is_claimable());
        assert!(!pending.is_terminal());
        let completed = JobStatus::Completed { completed_at: Utc::now() };
        assert!(completed.is_terminal());
        assert!(!completed.is_claimable());
    }
}
