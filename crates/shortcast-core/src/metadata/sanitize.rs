//! Platform-safe titles, descriptions and path components.

/// Longest title the platform accepts, in characters.
pub const MAX_TITLE_CHARS: usize = 100;
/// Longest description the platform accepts, in bytes.
pub const MAX_DESCRIPTION_BYTES: usize = 5000;
/// Title used when nothing printable is left.
pub const FALLBACK_TITLE: &str = "Untitled";

fn is_disallowed(c: char) -> bool {
    c == '<' || c == '>'
}

/// Maps raw text to a platform-safe title.
///
/// - Drops `<`, `>` and control characters
/// - Collapses runs of whitespace into one space and trims both ends
/// - Limits the result to [`MAX_TITLE_CHARS`] characters
///
/// Idempotent: sanitizing an already sanitized title returns it unchanged.
pub fn sanitize_title(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;

    for c in raw.chars() {
        if is_disallowed(c) {
            continue;
        }
        if c.is_whitespace() || c.is_control() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }

    let truncated = truncate_chars(&out, MAX_TITLE_CHARS).trim_end();
    if truncated.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        truncated.to_string()
    }
}

/// Title derived from a file stem: underscores read as spaces.
pub fn title_from_stem(stem: &str) -> String {
    sanitize_title(&stem.replace('_', " "))
}

/// Drops `<`/`>` and non-newline control characters, trims, and limits to
/// [`MAX_DESCRIPTION_BYTES`] on a char boundary.
pub fn sanitize_description(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|&c| !is_disallowed(c) && (c == '\n' || !c.is_control()))
        .collect();
    truncate_bytes(cleaned.trim(), MAX_DESCRIPTION_BYTES)
        .trim_end()
        .to_string()
}

/// Appends ` (Part i/N)` when `total > 1`, shortening `base` so the whole
/// title stays within [`MAX_TITLE_CHARS`].
pub fn part_title(base: &str, index: u32, total: u32) -> String {
    if total <= 1 {
        return base.to_string();
    }
    let suffix = format!(" (Part {}/{})", index, total);
    let keep = MAX_TITLE_CHARS.saturating_sub(suffix.chars().count());
    let head = truncate_chars(base, keep).trim_end();
    format!("{}{}", head, suffix)
}

/// Sanitizes a work item id for use as a single Linux path component.
///
/// - Replaces NUL, `/`, `\`, whitespace and control characters with `_`
/// - Collapses consecutive underscores and trims leading/trailing dots and underscores
/// - Limits length to 255 bytes (Linux NAME_MAX)
pub fn sanitize_path_component(name: &str) -> String {
    const NAME_MAX: usize = 255;

    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let unsafe_char = c == '\0' || c == '/' || c == '\\' || c.is_control() || c.is_whitespace();
        let replacement = if unsafe_char { '_' } else { c };
        if replacement == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(replacement);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let limited = truncate_bytes(trimmed, NAME_MAX);
    if limited.is_empty() {
        "_".to_string()
    } else {
        limited.to_string()
    }
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut take = max;
    while take > 0 && !s.is_char_boundary(take) {
        take -= 1;
    }
    &s[..take]
}
