//! File names for uploaded avatars and tokens.

use crate::compose::{export::ImageCodec, view::ViewKind};

/// Reduce a display name to a file-name-safe slug.
///
/// Characters other than ASCII letters, digits, `_` and `.` become `_`; runs of two or more
/// underscores are removed entirely.
pub fn slug(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut out = String::with_capacity(replaced.len());
    let mut run = 0usize;
    for c in replaced.chars() {
        if c == '_' {
            run += 1;
            continue;
        }
        if run == 1 {
            out.push('_');
        }
        run = 0;
        out.push(c);
    }
    if run == 1 {
        out.push('_');
    }
    out
}

/// `{slug}.{Avatar|Token}{suffix}.{ext}`.
pub fn file_name(slug: &str, kind: ViewKind, suffix: &str, codec: ImageCodec) -> String {
    let role = match kind {
        ViewKind::Avatar => "Avatar",
        ViewKind::Token => "Token",
    };
    format!("{slug}.{role}{suffix}.{}", codec.extension())
}

/// Pattern matching every numbered wildcard token of `slug` in `dir`.
pub fn wildcard_pattern(dir: &str, slug: &str, codec: ImageCodec) -> String {
    let name = format!("{slug}.Token-*.{}", codec.extension());
    if dir.is_empty() {
        name
    } else {
        format!("{dir}/{name}")
    }
}

/// File name for the next wildcard token: every `*` in `pattern` becomes `existing + 1`,
/// zero-padded to three digits, and only the last path segment is kept.
pub fn numbered_wildcard_name(pattern: &str, existing: usize) -> String {
    let num = format!("{:03}", existing + 1);
    let filled = pattern.replace('*', &num);
    match filled.rsplit_once('/') {
        Some((_, name)) => name.to_string(),
        None => filled,
    }
}

/// Match `candidate` against `pattern`, where `*` matches any run of characters.
pub fn wildcard_match(pattern: &str, candidate: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let c: Vec<char> = candidate.chars().collect();
    let (mut pi, mut ci) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ci < c.len() {
        if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ci));
            pi += 1;
        } else if pi < p.len() && p[pi] == c[ci] {
            pi += 1;
            ci += 1;
        } else if let Some((sp, sc)) = star {
            pi = sp + 1;
            ci = sc + 1;
            star = Some((sp, sc + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&ch| ch == '*')
}

/// Drop a `?query` cache buster.
pub fn strip_cache_buster(path: &str) -> &str {
    path.split_once('?').map_or(path, |(p, _)| p)
}

/// Replace any cache buster on `path` with `tag`.
pub fn with_cache_buster(path: &str, tag: &str) -> String {
    format!("{}?{tag}", strip_cache_buster(path))
}

/// Remove leading and trailing `/`.
pub fn trim_slashes(path: &str) -> &str {
    path.trim_matches('/')
}

/// Parent directory of a `/`-separated path, if it has one.
pub fn parent_dir(path: &str) -> Option<&str> {
    strip_cache_buster(path)
        .rsplit_once('/')
        .map(|(dir, _)| dir)
        .filter(|d| !d.is_empty())
}

#[cfg(test)]
#[path = "../../tests/unit/session/naming.rs"]
mod tests;
