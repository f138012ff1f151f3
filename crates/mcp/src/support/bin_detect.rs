#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

/// Searched after `PATH`; editors and agents often launch the server with a trimmed `PATH`.
const COMMON_BIN_DIRS: [&str; 4] = ["/bin", "/usr/bin", "/usr/local/bin", "/opt/homebrew/bin"];

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && (m.permissions().mode() & 0o111 != 0))
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file())
        .unwrap_or(false)
}

fn path_contains_separator(cmd: &str) -> bool {
    cmd.contains(std::path::MAIN_SEPARATOR) || cmd.contains('/')
}

fn find_executable_in_dirs(name: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    if name.trim().is_empty() {
        return None;
    }
    dirs.iter()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).collect::<Vec<_>>())
        .unwrap_or_default();
    dirs.extend(COMMON_BIN_DIRS.iter().map(PathBuf::from));
    dirs
}

/// Resolves a program name the way replay launches it: a path must point at an
/// executable file, a bare name is looked up on `PATH` and then the common bin dirs.
pub(crate) fn resolve_command(cmd: &str) -> Option<PathBuf> {
    let trimmed = cmd.trim();
    if trimmed.is_empty() {
        return None;
    }
    if path_contains_separator(trimmed) {
        let path = PathBuf::from(trimmed);
        return is_executable(&path).then_some(path);
    }
    find_executable_in_dirs(trimmed, &search_dirs())
}
