pub fn normalize(path: &str) -> String {
    let mut normalized = path.replace('\\', "/");
    while normalized.ends_with('/') && normalized.len() > 1 {
        normalized.pop();
    }
    normalized
}

/// Splits a path on either separator and drops empty segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .collect()
}

pub fn join(base: &str, tail: &str) -> String {
    let base = normalize(base);
    let tail = normalize(tail);
    let tail = tail.trim_start_matches('/');
    if base.is_empty() {
        return tail.to_string();
    }
    if tail.is_empty() {
        return base;
    }
    if base == "/" {
        return format!("/{tail}");
    }
    format!("{base}/{tail}")
}

pub fn relative_to(root: &str, absolute: &str) -> Option<String> {
    let root = normalize(root);
    let absolute = normalize(absolute);
    if root == absolute {
        return Some(String::new());
    }
    if root == "/" {
        return absolute.strip_prefix('/').map(|s| s.to_string());
    }
    absolute
        .strip_prefix(&(root + "/"))
        .map(|s| s.to_string())
}

pub fn is_within_scope(path: &str, root: &str) -> bool {
    let path = normalize(path);
    let root = normalize(root);

    if path == root {
        return true;
    }

    if root == "/" {
        return path.starts_with('/');
    }

    if cfg!(windows) {
        let path_lower = path.to_ascii_lowercase();
        let root_lower = root.to_ascii_lowercase();
        return path_lower.starts_with(&(root_lower + "/"));
    }

    path.starts_with(&(root + "/"))
}
