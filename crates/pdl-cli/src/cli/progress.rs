use pdl_core::status::human_readable_size;
use pdl_core::StatusSnapshot;

/// How much progress output to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressView {
    Quiet,
    Line,
    /// The progress line plus one line of per-part progress.
    Parts,
}

/// One-line progress: name, bytes, percent, rate, ETA, connections, state.
pub fn format_progress(s: &StatusSnapshot) -> String {
    format!(
        "{}  {} / {} ({})  {}  ETA {}  [{} conn]  {}",
        s.file_name.as_deref().unwrap_or("-"),
        s.downloaded_human(),
        s.size_human(),
        s.percent_human(),
        s.rate_human(),
        s.eta_human(),
        s.connections,
        s.status,
    )
}

/// Active parts as `#index downloaded`, or None when nothing is in flight.
pub fn format_parts(s: &StatusSnapshot) -> Option<String> {
    if s.parts.is_empty() {
        return None;
    }
    let cells: Vec<String> = s
        .parts
        .iter()
        .map(|p| format!("#{} {}", p.index, human_readable_size(p.downloaded_bytes)))
        .collect();
    Some(format!("  parts: {}", cells.join("  ")))
}
