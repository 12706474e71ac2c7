//! Canonicalization of user-supplied paths.

/// The tenant root.
pub const ROOT: &str = "/";

/// Canonicalize a raw path string.
///
/// - empty input yields the root path `/`
/// - a single leading separator is stripped (paths are relative to the tenant root)
/// - the remainder is form-decoded (`+` is a space, `%XX` an encoded byte) and control
///   characters (code points < 32 and 127) are removed from the decoded result
///
/// Structure is not checked here; see [`super::validate_path`].
pub fn normalize(raw: &str) -> String {
    if raw.is_empty() || raw == ROOT {
        return ROOT.to_string();
    }

    let stripped = raw.strip_prefix('/').unwrap_or(raw);
    let spaced = stripped.replace('+', " ");
    let decoded = urlencoding::decode_binary(spaced.as_bytes());

    String::from_utf8_lossy(&decoded)
        .chars()
        .filter(|c| !is_control(*c))
        .collect()
}

fn is_control(c: char) -> bool {
    (c as u32) < 32 || c as u32 == 127
}
