//! Startup decision: resume from an existing control file, start fresh, or
//! move to a new name so unrelated data is never overwritten.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use super::{control_path, ControlFile, CONTROL_SUFFIX};
use crate::download::SetupError;
use crate::session::ResourceDescriptor;
use crate::url_model::fit_to_name_max;

/// Where the download will live and what, if anything, it resumes from.
#[derive(Debug)]
pub struct Resolution {
    pub file_name: String,
    pub file_path: PathBuf,
    pub control_path: PathBuf,
    /// Approved snapshot to resume from; None for a fresh start.
    pub resume: Option<ControlFile>,
}

/// Claims `<dir>/<file_name>.persepolis` and decides how to proceed.
///
/// - No control file: the claim succeeds and the download starts fresh. If
///   an output file of that name already exists, a unique name is used.
/// - Control file present: it is parsed. Resume is allowed when the server
///   supports ranges and the snapshot matches the resource (ETag, or size
///   when neither side has an ETag) and the output file is still there.
///   A matching snapshot without its output file restarts fresh in place.
///   Anything else moves to a unique `name_N.ext`.
pub fn resolve(
    dir: &Path,
    file_name: &str,
    descriptor: &ResourceDescriptor,
) -> Result<Resolution, SetupError> {
    let file_name = fit_to_name_max(file_name, CONTROL_SUFFIX)?;
    let file_path = dir.join(&file_name);
    let ctl_path = control_path(&file_path);

    match claim(&ctl_path) {
        Ok(_) => {
            if file_path.exists() {
                // Our claim is moot: the name belongs to unrelated data.
                if let Err(e) = fs::remove_file(&ctl_path) {
                    tracing::warn!(path = %ctl_path.display(), error = %e, "cannot remove control file claim");
                }
                tracing::info!(file = %file_path.display(), "output exists without control file, renaming");
                return unique(dir, &file_name);
            }
            Ok(fresh(file_name, file_path, ctl_path))
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            let snapshot = match ControlFile::load(&ctl_path) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, "unreadable control file");
                    None
                }
            };
            let approved = snapshot.filter(|s| descriptor.range_support && s.matches(descriptor));
            let output_exists = file_path.exists();
            match approved {
                Some(s) if output_exists => {
                    tracing::info!(file = %file_path.display(), "resuming from control file");
                    Ok(Resolution {
                        file_name,
                        file_path,
                        control_path: ctl_path,
                        resume: Some(s),
                    })
                }
                Some(_) => {
                    tracing::info!(file = %file_path.display(), "output file missing, starting over");
                    Ok(fresh(file_name, file_path, ctl_path))
                }
                None if output_exists => {
                    tracing::info!(file = %file_path.display(), "control file does not match resource, renaming");
                    unique(dir, &file_name)
                }
                None => Ok(fresh(file_name, file_path, ctl_path)),
            }
        }
        Err(e) => Err(SetupError::Io(e)),
    }
}

fn fresh(file_name: String, file_path: PathBuf, control_path: PathBuf) -> Resolution {
    Resolution {
        file_name,
        file_path,
        control_path,
        resume: None,
    }
}

/// Atomically creates an empty control file; fails if it exists.
fn claim(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

/// `name.ext` -> `name_N.ext` for the first N whose output and control
/// files are both free; the control file is claimed before returning.
fn unique(dir: &Path, file_name: &str) -> Result<Resolution, SetupError> {
    let (base, ext) = split_ext(file_name);
    for n in 1u32.. {
        let candidate = fit_to_name_max(&format!("{base}_{n}{ext}"), CONTROL_SUFFIX)?;
        let file_path = dir.join(&candidate);
        let ctl_path = control_path(&file_path);
        if file_path.exists() || ctl_path.exists() {
            continue;
        }
        match claim(&ctl_path) {
            Ok(_) => {
                tracing::info!(name = %candidate, "using new file name");
                return Ok(fresh(candidate, file_path, ctl_path));
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(SetupError::Io(e)),
        }
    }
    Err(SetupError::NameTooLong(file_name.to_string()))
}

fn split_ext(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => file_name.split_at(dot),
        _ => (file_name, ""),
    }
}
