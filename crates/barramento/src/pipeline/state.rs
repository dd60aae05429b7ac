//! Preservation lifecycle of an object.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreservationStatus {
    NotPreserved,
    SipCreated,
    TransferStarted,
    TransferFailed,
    IngestStarted,
    IngestFailed,
    AipStored,
    FullyPreserved,
}

impl PreservationStatus {
    pub const ALL: [PreservationStatus; 8] = [
        Self::NotPreserved,
        Self::SipCreated,
        Self::TransferStarted,
        Self::TransferFailed,
        Self::IngestStarted,
        Self::IngestFailed,
        Self::AipStored,
        Self::FullyPreserved,
    ];

    /// Statuses the pollers re-check against the backend.
    pub const IN_FLIGHT: [PreservationStatus; 2] = [Self::TransferStarted, Self::IngestStarted];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotPreserved => "not_preserved",
            Self::SipCreated => "sip_created",
            Self::TransferStarted => "transfer_started",
            Self::TransferFailed => "transfer_failed",
            Self::IngestStarted => "ingest_started",
            Self::IngestFailed => "ingest_failed",
            Self::AipStored => "aip_stored",
            Self::FullyPreserved => "fully_preserved",
        }
    }

    /// Position on the forward path. Failure states are off the path.
    fn rank(&self) -> Option<u8> {
        match self {
            Self::NotPreserved => Some(0),
            Self::SipCreated => Some(1),
            Self::TransferStarted => Some(2),
            Self::IngestStarted => Some(3),
            Self::AipStored => Some(4),
            Self::FullyPreserved => Some(5),
            Self::TransferFailed | Self::IngestFailed => None,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        Self::IN_FLIGHT.contains(self)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::TransferFailed | Self::IngestFailed)
    }

    /// Stored in the archive; a non-forced enqueue leaves these alone.
    pub fn is_preserved(&self) -> bool {
        matches!(self, Self::AipStored | Self::FullyPreserved)
    }

    /// Whether a tracked transition from `self` to `next` is allowed.
    ///
    /// Forward moves along the path are allowed, staying put is allowed
    /// (a re-stamp), and each failure state is reachable only from its own
    /// in-flight state. Restarting a failed object goes through packaging,
    /// not through here.
    pub fn can_advance_to(&self, next: PreservationStatus) -> bool {
        if *self == next {
            return true;
        }
        match next {
            Self::TransferFailed => *self == Self::TransferStarted,
            Self::IngestFailed => *self == Self::IngestStarted,
            _ => match (self.rank(), next.rank()) {
                (Some(from), Some(to)) => to > from,
                _ => false,
            },
        }
    }
}

impl fmt::Display for PreservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PreservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown preservation status '{}'", s))
    }
}

/// Status strings reported by the backend for transfers and ingests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendStatus {
    Complete,
    Processing,
    Failed,
    Rejected,
    Other(String),
}

impl BackendStatus {
    /// Exact match; `USER_INPUT` (waiting on an approval step) and `QUEUED`
    /// count as processing.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "COMPLETE" => Self::Complete,
            "PROCESSING" | "USER_INPUT" | "QUEUED" => Self::Processing,
            "FAILED" => Self::Failed,
            "REJECTED" => Self::Rejected,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Rejected)
    }
}
