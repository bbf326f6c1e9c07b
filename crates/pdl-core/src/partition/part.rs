//! One fixed-granularity slice of the target resource.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Lifecycle of a part. Serialized lowercase in the control file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartStatus {
    Pending,
    Downloading,
    Stopped,
    Error,
    Complete,
}

impl PartStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartStatus::Pending => "pending",
            PartStatus::Downloading => "downloading",
            PartStatus::Stopped => "stopped",
            PartStatus::Error => "error",
            PartStatus::Complete => "complete",
        }
    }
}

/// Progress record for one part.
///
/// Serialized as a 4-element array `[start_offset, downloaded_bytes, status, retry_count]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRecord {
    /// First byte of the part; fixed once planned.
    pub start_offset: u64,
    /// Bytes of this part already on disk, counted from `start_offset`.
    pub downloaded_bytes: u64,
    pub status: PartStatus,
    /// -1 until first assigned; incremented on every (re)assignment.
    pub retry_count: i32,
}

impl PartRecord {
    pub fn pending(start_offset: u64) -> Self {
        Self {
            start_offset,
            downloaded_bytes: 0,
            status: PartStatus::Pending,
            retry_count: -1,
        }
    }

    /// Filler slot past the last real part: nothing to do.
    pub fn unused(start_offset: u64) -> Self {
        Self {
            start_offset,
            downloaded_bytes: 0,
            status: PartStatus::Complete,
            retry_count: -1,
        }
    }

    /// Absolute file offset where the next byte of this part goes.
    pub fn resume_offset(&self) -> u64 {
        self.start_offset + self.downloaded_bytes
    }
}

impl Serialize for PartRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (
            self.start_offset,
            self.downloaded_bytes,
            self.status,
            self.retry_count,
        )
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PartRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (start_offset, downloaded_bytes, status, retry_count): (u64, u64, PartStatus, i32) =
            Deserialize::deserialize(deserializer)?;
        if retry_count < -1 {
            return Err(de::Error::custom(format!(
                "retry_count {} below -1",
                retry_count
            )));
        }
        Ok(Self {
            start_offset,
            downloaded_bytes,
            status,
            retry_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_array() {
        let r = PartRecord {
            start_offset: 2097152,
            downloaded_bytes: 1024,
            status: PartStatus::Downloading,
            retry_count: 0,
        };
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"[2097152,1024,"downloading",0]"#);
        let back: PartRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn rejects_unknown_status() {
        assert!(serde_json::from_str::<PartRecord>(r#"[0,0,"finished",0]"#).is_err());
    }

    #[test]
    fn rejects_retry_count_below_minus_one() {
        assert!(serde_json::from_str::<PartRecord>(r#"[0,0,"pending",-2]"#).is_err());
    }

    #[test]
    fn resume_offset_adds_progress() {
        let mut r = PartRecord::pending(100);
        r.downloaded_bytes = 50;
        assert_eq!(r.resume_offset(), 150);
    }
}
