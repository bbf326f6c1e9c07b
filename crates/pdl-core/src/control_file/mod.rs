//! The `.persepolis` control file: a JSON checkpoint beside the output file.
//!
//! ```json
//! { "ETag": "abc" | null, "file_name": "x.iso", "file_size": 123 | null,
//!   "number_of_parts": 64,
//!   "download_information_list": [[start, downloaded, "status", retry], ...] }
//! ```
//!
//! Created empty to claim a name, rewritten about once a second while a
//! download runs, read once at startup, and deleted on completion.

mod persister;
mod resolve;

pub use persister::Persister;
pub use resolve::{resolve, Resolution};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::partition::PartRecord;
use crate::scheduler::TableSnapshot;
use crate::session::ResourceDescriptor;

/// Suffix appended to the output file name.
pub const CONTROL_SUFFIX: &str = ".persepolis";

/// Durable snapshot of a download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFile {
    #[serde(rename = "ETag", default)]
    pub etag: Option<String>,
    pub file_name: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    pub number_of_parts: usize,
    pub download_information_list: Vec<PartRecord>,
}

impl ControlFile {
    pub fn from_snapshot(etag: Option<String>, file_name: &str, snap: &TableSnapshot) -> Self {
        Self {
            etag,
            file_name: file_name.to_string(),
            file_size: snap.file_size,
            number_of_parts: snap.number_of_parts,
            download_information_list: snap.parts.clone(),
        }
    }

    /// Same resource as `descriptor`? ETags are compared when either side
    /// has one; otherwise the recorded sizes must agree.
    pub fn matches(&self, descriptor: &ResourceDescriptor) -> bool {
        match (&self.etag, &descriptor.etag) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.file_size == descriptor.size,
            _ => false,
        }
    }

    /// Reads a control file. An empty file (a bare claim) yields `None`.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("read control file {}", path.display()))?;
        if data.trim().is_empty() {
            return Ok(None);
        }
        let cf = serde_json::from_str(&data)
            .with_context(|| format!("parse control file {}", path.display()))?;
        Ok(Some(cf))
    }

    /// Writes the snapshot via a sibling temp file and rename, so a crash
    /// never leaves a half-written control file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec(self)?;
        let tmp = temp_sibling(path);
        {
            let mut f = fs::File::create(&tmp)
                .with_context(|| format!("create {}", tmp.display()))?;
            f.write_all(&json)?;
            f.sync_data()?;
        }
        fs::rename(&tmp, path)
            .with_context(|| format!("rename {} to {}", tmp.display(), path.display()))?;
        Ok(())
    }
}

/// Path of the control file for `file_path` (`<file>.persepolis`).
pub fn control_path(file_path: &Path) -> PathBuf {
    let mut o = file_path.as_os_str().to_owned();
    o.push(CONTROL_SUFFIX);
    PathBuf::from(o)
}

/// Short hidden temp name in the same directory; short so it fits even when
/// the control file name itself is at the length limit.
fn temp_sibling(path: &Path) -> PathBuf {
    let mut h = DefaultHasher::new();
    path.hash(&mut h);
    let name = format!(".{:016x}.pdl-tmp", h.finish());
    match path.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}
