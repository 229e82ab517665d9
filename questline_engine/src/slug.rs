/// Longest slug kept; snapshot file names append a marker and version to it.
pub const MAX_SLUG_LEN: usize = 48;

/// Turn a user-supplied slot or atlas name into a filesystem-safe slug.
///
/// ASCII letters and digits are lowercased, `-` and `_` are kept, and any run of
/// other characters becomes a single `-`. The result is cut to [`MAX_SLUG_LEN`]
/// without a dangling separator. Empty results fall back to `"session"`.
pub fn sanitize_slug(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut gap = false;
    for ch in raw.trim().chars() {
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
        if ch.is_ascii_alphanumeric() {
            if gap && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(ch.to_ascii_lowercase());
            gap = false;
        } else if matches!(ch, '-' | '_') {
            if !slug.is_empty() {
                slug.push(ch);
            }
            gap = false;
        } else {
            gap = true;
        }
    }

    slug.truncate(MAX_SLUG_LEN);
    let slug = slug.trim_matches(['-', '_']);
    if slug.is_empty() {
        "session".to_string()
    } else {
        slug.to_string()
    }
}
