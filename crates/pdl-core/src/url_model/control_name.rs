//! Keeping `<file><suffix>` within one directory entry.

use crate::download::SetupError;

/// Maximum bytes in one path component (Linux `NAME_MAX`).
pub const NAME_MAX: usize = 255;

/// Shortens `file_name` so that `file_name + suffix` fits in `NAME_MAX` bytes.
///
/// Exactly the excess number of bytes is removed from the end of the base
/// name (rounded up to a char boundary); the extension is kept. Fails when
/// the base name is too short to absorb the excess.
pub fn fit_to_name_max(file_name: &str, suffix: &str) -> Result<String, SetupError> {
    let total = file_name.len() + suffix.len();
    if total <= NAME_MAX {
        return Ok(file_name.to_string());
    }
    let excess = total - NAME_MAX;

    let (base, ext) = match file_name.rfind('.') {
        Some(dot) if dot > 0 => file_name.split_at(dot),
        _ => (file_name, ""),
    };
    if base.len() <= excess {
        return Err(SetupError::NameTooLong(file_name.to_string()));
    }

    let mut cut = base.len() - excess;
    while !base.is_char_boundary(cut) {
        cut -= 1;
    }
    if cut == 0 {
        return Err(SetupError::NameTooLong(file_name.to_string()));
    }
    Ok(format!("{}{}", &base[..cut], ext))
}
