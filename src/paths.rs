//! Device path helpers. Device paths always use `/` and are absolute.

use crate::config::EngineConfig;

pub const ROOT: &str = "/";

/// Make `dir` absolute, collapse `.` and `..` segments and strip trailing slashes.
pub fn normalize_dir(dir: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in dir.trim().split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            name => segments.push(name),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Join a child name onto a directory; absolute names are returned as-is.
pub fn join(dir: &str, name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else if dir == ROOT {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

pub fn parent(dir: &str) -> String {
    match dir.rfind('/') {
        Some(0) | None => ROOT.to_string(),
        Some(idx) => dir[..idx].to_string(),
    }
}

pub fn base_name(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

/// File name without its extension, used as the song label.
pub fn display_name(path: &str) -> &str {
    let name = base_name(path);
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}

/// True when `path` equals `dir` or lies anywhere below it.
pub fn in_directory(path: &str, dir: &str) -> bool {
    if dir == ROOT {
        return path.starts_with('/');
    }
    path == dir
        || path
            .strip_prefix(dir)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub fn is_audio_file(path: &str, config: &EngineConfig) -> bool {
    let name = base_name(path);
    name.rsplit_once('.')
        .is_some_and(|(_, ext)| config.is_audio_extension(ext))
}
