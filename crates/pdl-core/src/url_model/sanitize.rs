//! Linux-safe filename sanitization.

use super::control_name::NAME_MAX;

/// Makes `name` safe to use as a single path component on Linux.
///
/// Separators, NUL, control characters and whitespace become `_` (runs
/// collapsed); leading/trailing dots, spaces and underscores are trimmed;
/// the result is cut to `NAME_MAX` bytes on a char boundary.
pub fn sanitize_filename_for_linux(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let bad = c == '/' || c == '\\' || c.is_control() || c.is_whitespace();
        if bad {
            if !out.ends_with('_') {
                out.push('_');
            }
        } else {
            out.push(c);
        }
    }

    let mut trimmed = out.trim_matches(|c| c == '.' || c == '_').to_string();
    if trimmed.len() > NAME_MAX {
        let mut cut = NAME_MAX;
        while !trimmed.is_char_boundary(cut) {
            cut -= 1;
        }
        trimmed.truncate(cut);
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_replaced() {
        assert_eq!(sanitize_filename_for_linux("a/b\\c.txt"), "a_b_c.txt");
    }

    #[test]
    fn trims_dots_and_spaces() {
        assert_eq!(sanitize_filename_for_linux("  ..  file.txt  ..  "), "file.txt");
    }

    #[test]
    fn collapses_runs() {
        assert_eq!(sanitize_filename_for_linux("file \t\x00name.txt"), "file_name.txt");
    }

    #[test]
    fn long_names_cut_on_char_boundary() {
        let s = "é".repeat(200);
        let out = sanitize_filename_for_linux(&s);
        assert!(out.len() <= NAME_MAX);
        assert!(out.chars().all(|c| c == 'é'));
    }
}
