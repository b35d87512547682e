use nexus_core::{PathRewrite, PathStyle};

/// Normalize a source-file path recorded in the ELF's debug info:
/// optionally strip a configured prefix, optionally graft a new root in
/// its place, collapse duplicate separators and resolve `.`/`..` segments,
/// normalize a drive letter's casing, then render with the configured path
/// separator.
///
/// This intentionally does not attempt VCS-aware special-path parsing
/// (Git/Hg/Cargo-registry rewriting): the oracle's inputs are plain
/// ELF-embedded compile-time paths, not a source server's mapped paths, so
/// a literal prefix cut-and-splice is the whole requirement.
pub fn normalize_path(raw: &str, rewrite: &PathRewrite, style: PathStyle) -> String {
    let unix_raw = raw.replace('\\', "/");

    let stripped = match &rewrite.cut_prefix {
        Some(prefix) => {
            let unix_prefix = prefix.replace('\\', "/");
            unix_raw
                .strip_prefix(unix_prefix.as_str())
                .unwrap_or(unix_raw.as_str())
                .trim_start_matches('/')
                .to_string()
        }
        None => unix_raw,
    };

    let joined = match &rewrite.new_root {
        Some(root) => {
            let unix_root = root.replace('\\', "/");
            if unix_root.ends_with('/') || stripped.is_empty() {
                format!("{unix_root}{stripped}")
            } else {
                format!("{unix_root}/{stripped}")
            }
        }
        None => stripped,
    };

    let canonical = canonicalize_segments(&joined);

    match style {
        PathStyle::Unix => canonical,
        PathStyle::Windows => canonical.replace('/', "\\"),
    }
}

/// Split off a leading drive letter (`C:`, normalized to uppercase), if any.
fn split_drive(path: &str) -> (Option<String>, &str) {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        (Some(format!("{}:", (bytes[0] as char).to_ascii_uppercase())), &path[2..])
    } else {
        (None, path)
    }
}

/// Collapse duplicate `/` separators and resolve `.`/`..` segments. A `..`
/// at the root of an absolute path has nothing to pop and is dropped rather
/// than carried through; in a relative path it's kept, since there's no
/// base to resolve it against.
fn canonicalize_segments(path: &str) -> String {
    let (drive, rest) = split_drive(path);
    let is_absolute = rest.starts_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else if !is_absolute {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let mut out = drive.unwrap_or_default();
    if is_absolute {
        out.push('/');
    }
    out.push_str(&segments.join("/"));
    out
}
