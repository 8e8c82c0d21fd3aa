use std::path::{Component, Path, PathBuf};

/// Sanitizes an attacker-controlled relative path for use under a working
/// root.
///
/// Neutralizes rather than rejects:
/// 1. Every `../` and `..\` occurrence is removed, repeatedly, so nested
///    forms like `./../` collapse too.
/// 2. Leading `/` and `\` are stripped.
/// 3. The remainder is rebuilt from its components, dropping any surviving
///    parent-dir, root, or prefix component (covers a trailing bare `..`).
///
/// The result always resolves inside the directory it is joined to. An empty
/// result means the input had no usable component and must not be used.
pub fn sanitize_relative(raw: &str) -> PathBuf {
    let mut cleaned = raw.to_string();
    loop {
        let next = cleaned.replace("../", "").replace("..\\", "");
        if next == cleaned {
            break;
        }
        cleaned = next;
    }
    let trimmed = cleaned.trim_start_matches(['/', '\\']);

    let mut safe = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => safe.push(part),
            Component::CurDir
            | Component::ParentDir
            | Component::RootDir
            | Component::Prefix(_) => {}
        }
    }
    safe
}
