//! Enumerating the programs reachable through `PATH`.

use std::collections::BTreeSet;
use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::Path;

/// Names of the executable files found on the current `PATH`.
pub fn available_programs() -> BTreeSet<String> {
    env::var_os("PATH")
        .map(|path| programs_in(&path))
        .unwrap_or_default()
}

/// Names of the executable files found in the directories of `search_path`.
///
/// Unreadable directories are skipped. Names are reported once even when
/// several directories provide them.
pub fn programs_in(search_path: &OsStr) -> BTreeSet<String> {
    let mut programs = BTreeSet::new();
    for dir in env::split_paths(search_path) {
        let Ok(entries) = fs::read_dir(&dir) else {
            tracing::trace!(dir = %dir.display(), "skipping unreadable PATH entry");
            continue;
        };
        for entry in entries.flatten() {
            if is_executable(&entry.path()) {
                programs.insert(entry.file_name().to_string_lossy().into_owned());
            }
        }
    }
    programs
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn touch(dir: &Path, name: &str, mode: u32) -> anyhow::Result<()> {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\n")?;
        fs::set_permissions(&path, fs::Permissions::from_mode(mode))?;
        Ok(())
    }

    #[test]
    fn lists_executables_once_and_sorted() -> anyhow::Result<()> {
        let first = tempfile::tempdir()?;
        let second = tempfile::tempdir()?;
        touch(first.path(), "zeta", 0o755)?;
        touch(first.path(), "alpha", 0o700)?;
        touch(first.path(), "notes.txt", 0o644)?;
        touch(second.path(), "alpha", 0o755)?;
        fs::create_dir(second.path().join("subdir"))?;

        let search = env::join_paths([first.path(), second.path(), Path::new("/nonexistent")])?;
        let programs: Vec<_> = programs_in(&search).into_iter().collect();
        assert_eq!(programs, ["alpha", "zeta"]);
        Ok(())
    }

    #[test]
    fn current_path_contains_sh() {
        assert!(available_programs().contains("sh"));
    }
}
