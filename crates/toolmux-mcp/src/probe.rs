//! Command resolution used before spawning a stdio server.

use std::path::{Path, PathBuf};

/// Find `command` the way a shell would.
///
/// A command containing a path separator is checked directly; a bare name is
/// searched for on `PATH` (with `PATHEXT` suffixes on Windows).
pub fn resolve_command(command: &str) -> Option<PathBuf> {
    let command = command.trim();
    if command.is_empty() {
        return None;
    }

    let path = Path::new(command);
    if path.components().count() > 1 || path.is_absolute() {
        return is_executable(path).then(|| path.to_path_buf());
    }

    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .flat_map(|dir| candidates(&dir, command))
        .find(|candidate| is_executable(candidate))
}

/// Whether `command` can be launched from this process.
pub fn command_exists(command: &str) -> bool {
    resolve_command(command).is_some()
}

#[cfg(windows)]
fn candidates(dir: &Path, command: &str) -> Vec<PathBuf> {
    let exts = std::env::var("PATHEXT").unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string());
    std::iter::once(dir.join(command))
        .chain(
            exts.split(';')
                .filter(|e| !e.is_empty())
                .map(|ext| dir.join(format!("{command}{ext}"))),
        )
        .collect()
}

#[cfg(not(windows))]
fn candidates(dir: &Path, command: &str) -> Vec<PathBuf> {
    vec![dir.join(command)]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn finds_sh_on_path() {
        let resolved = resolve_command("sh").unwrap();
        assert!(resolved.ends_with("sh"));
        assert!(command_exists("sh"));
    }

    #[test]
    fn missing_command_is_not_found() {
        assert!(!command_exists("doesnotexist123"));
        assert!(!command_exists(""));
        assert!(!command_exists("   "));
    }

    #[cfg(unix)]
    #[test]
    fn explicit_paths_need_the_executable_bit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("server.sh");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        let script_str = script.to_str().unwrap();

        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(!command_exists(script_str));

        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(command_exists(script_str));
    }

    #[test]
    fn directories_are_not_commands() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!command_exists(dir.path().to_str().unwrap()));
    }
}
