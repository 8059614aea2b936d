/// Split a document into its front-matter block and body.
///
/// Front-matter is a key/value block delimited by `---` lines at the very
/// start of the document:
///
/// ```text
/// ---
/// id: FEAT-001
/// title: Add login
/// ---
/// ## Description
/// ...
/// ```
///
/// Returns `None` if the document does not open with a `---` delimiter
/// line; callers treat that as a parse error but keep going with other
/// files.
pub fn split(content: &str) -> Option<(&str, &str)> {
    let trimmed_start = content.trim_start_matches('\u{feff}');
    let mut lines = trimmed_start.char_indices();
    let first_line_end = trimmed_start.find('\n').unwrap_or(trimmed_start.len());
    let first_line = trimmed_start[..first_line_end].trim_end_matches('\r');
    if first_line.trim() != "---" {
        return None;
    }
    // Consume the newline after the opening delimiter.
    let after_open = match lines.find(|(i, _)| *i == first_line_end) {
        Some(_) => first_line_end + 1,
        None => return None,
    };

    let rest = &trimmed_start[after_open..];
    let mut search_from = 0usize;
    loop {
        let line_start = search_from;
        let line_end = rest[line_start..]
            .find('\n')
            .map(|i| line_start + i)
            .unwrap_or(rest.len());
        let line = rest[line_start..line_end].trim_end_matches('\r');
        if line.trim() == "---" {
            let front_matter = &rest[..line_start];
            let body_start = (line_end + 1).min(rest.len());
            let body = if body_start <= rest.len() {
                &rest[body_start..]
            } else {
                ""
            };
            return Some((front_matter, body));
        }
        if line_end >= rest.len() {
            return None;
        }
        search_from = line_end + 1;
    }
}
