use std::path::Path;

/// Returns true if the file name's extension equals `extension` (without the dot),
/// compared case-insensitively.
///
/// A bare dotfile such as `.pdf` has no extension and never matches.
pub fn has_extension(file_name: &str, extension: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Returns true if the head bytes carry the PDF signature `%PDF-`.
pub fn looks_like_pdf(head: &[u8]) -> bool {
    head.starts_with(b"%PDF-")
}

/// Largest char boundary of `s` at or below `index`.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut end = index.min(s.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

/// Cuts `s` to at most `max` bytes on a char boundary and appends `suffix` when
/// anything was removed. If `max` leaves no room for the suffix, the string is
/// cut without it.
pub fn safe_truncate_utf8(s: &str, max: usize, suffix: &str) -> String {
    if s.len() <= max {
        return s.to_string();
    }

    if max <= suffix.len() {
        // No room for the suffix; just cut on a char boundary up to max
        return s[..floor_char_boundary(s, max)].to_string();
    }

    let end = floor_char_boundary(s, max - suffix.len());
    format!("{}{}", &s[..end], suffix)
}

/// Shortens a prompt for log lines.
pub fn preview(s: &str) -> String {
    safe_truncate_utf8(s, 80, "...")
}
