//! Output file naming.
//!
//! Picks the output name (explicit > Content-Disposition > URL path), makes
//! it safe for a Linux filesystem, and shortens it when the control-file
//! name derived from it would not fit in one directory entry.

mod content_disposition;
mod control_name;
mod path;
mod percent;
mod sanitize;

pub use content_disposition::parse_content_disposition_filename;
pub use control_name::{fit_to_name_max, NAME_MAX};
pub use path::filename_from_url_path;
pub use percent::percent_decode;
pub use sanitize::sanitize_filename_for_linux;

/// Default filename when nothing usable is found.
const DEFAULT_FILENAME: &str = "download.bin";

/// Chooses the output filename.
///
/// An explicit name wins; otherwise a `filename`/`filename*` token from
/// `content_disposition`; otherwise the percent-decoded last URL path segment.
///
/// - `derive_filename("https://example.com/a%20b.zip", None, None)` → `"a_b.zip"`
/// - `derive_filename("https://example.com/x", None, Some("attachment; filename=\"r.pdf\""))` → `"r.pdf"`
pub fn derive_filename(url: &str, explicit: Option<&str>, content_disposition: Option<&str>) -> String {
    let candidate = explicit
        .map(str::to_string)
        .filter(|s| !s.trim().is_empty())
        .or_else(|| content_disposition.and_then(parse_content_disposition_filename))
        .or_else(|| filename_from_url_path(url));

    let Some(raw) = candidate else {
        return DEFAULT_FILENAME.to_string();
    };

    let sanitized = sanitize_filename_for_linux(&raw);
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        DEFAULT_FILENAME.to_string()
    } else {
        sanitized
    }
}
