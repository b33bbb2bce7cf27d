use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{ProvisionError, ProvisionResult};

/// Delete `dir` if present, then recreate it empty.
///
/// Refuses `/`, relative paths, and any directory that overlaps the
/// source tree.
pub fn reset(dir: &Path, source: &Path) -> ProvisionResult<()> {
    guard(dir, source)?;

    if dir.exists() {
        debug!(dir = %dir.display(), "removing install directory");
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Recursively copy the source tree into `dir`. Top-level hidden
/// entries are skipped; symlinks are recreated as links and file
/// permissions are preserved. Returns the number of files copied.
pub fn deploy(source: &Path, dir: &Path) -> ProvisionResult<usize> {
    if !source.is_dir() {
        return Err(ProvisionError::FileNotFound(source.display().to_string()));
    }
    guard(dir, source)?;

    let mut copied = 0;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        copied += copy_entry(&entry.path(), &dir.join(entry.file_name()))?;
    }
    Ok(copied)
}

fn copy_entry(from: &Path, to: &Path) -> ProvisionResult<usize> {
    let meta = fs::symlink_metadata(from)?;
    let file_type = meta.file_type();

    if file_type.is_symlink() {
        let target = fs::read_link(from)?;
        symlink(&target, to)?;
        Ok(1)
    } else if file_type.is_dir() {
        fs::create_dir_all(to)?;
        fs::set_permissions(to, meta.permissions())?;
        let mut copied = 0;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            copied += copy_entry(&entry.path(), &to.join(entry.file_name()))?;
        }
        Ok(copied)
    } else {
        // fs::copy carries the permission bits over.
        fs::copy(from, to)?;
        Ok(1)
    }
}

#[cfg(unix)]
pub(crate) fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
pub(crate) fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    fs::copy(target, link).map(drop)
}

/// Warn when the deployed tree does not contain the Python module the
/// service will import. The service start stays the authoritative
/// failure.
pub fn check_app_module(dir: &Path, module: &str) -> bool {
    let module_path = module.replace('.', "/");
    let file = dir.join(format!("{module_path}.py"));
    let package = dir.join(&module_path).join("__init__.py");

    let found = file.is_file() || package.is_file();
    if !found {
        warn!(
            module,
            dir = %dir.display(),
            "application module not found in deployed tree; the service will fail to start"
        );
    }
    found
}

/// Write `contents` to `path` via a temp file in the same directory
/// followed by a rename, so readers never see a partial file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> ProvisionResult<()> {
    let parent = parent_dir(path)?;
    fs::create_dir_all(&parent)?;

    let mut tmp = NamedTempFile::new_in(&parent)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    set_world_readable(tmp.path())?;
    tmp.persist(path).map_err(|e| ProvisionError::Io(e.error))?;
    Ok(())
}

// NamedTempFile starts out 0600; config files are read by daemons.
#[cfg(unix)]
fn set_world_readable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_world_readable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Atomically replace `to` with a copy of `from`.
pub fn copy_atomic(from: &Path, to: &Path) -> ProvisionResult<()> {
    if !from.is_file() {
        return Err(ProvisionError::FileNotFound(from.display().to_string()));
    }
    let contents = fs::read(from)?;
    write_atomic(to, &contents)?;
    let perms = fs::metadata(from)?.permissions();
    fs::set_permissions(to, perms)?;
    Ok(())
}

fn parent_dir(path: &Path) -> ProvisionResult<PathBuf> {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .ok_or_else(|| ProvisionError::UnsafePath(path.display().to_string()))
}

/// Refuse `path` if it is `dir` or lies inside it, since resetting
/// `dir` would destroy it.
pub fn ensure_outside(path: &Path, dir: &Path) -> ProvisionResult<()> {
    let path = normalize(path);
    let dir = normalize(dir);
    if path.starts_with(&dir) {
        return Err(ProvisionError::UnsafePath(format!(
            "{} lies inside the install directory {}",
            path.display(),
            dir.display()
        )));
    }
    Ok(())
}

fn guard(dir: &Path, source: &Path) -> ProvisionResult<()> {
    if !dir.is_absolute() || dir.parent().is_none() {
        return Err(ProvisionError::UnsafePath(dir.display().to_string()));
    }

    let dir = normalize(dir);
    let source = normalize(source);
    if source.starts_with(&dir) || dir.starts_with(&source) {
        return Err(ProvisionError::UnsafePath(format!(
            "{} overlaps the source tree {}",
            dir.display(),
            source.display()
        )));
    }
    Ok(())
}

// Canonicalize the longest existing prefix; the install directory
// usually does not exist yet on a first run.
fn normalize(path: &Path) -> PathBuf {
    if let Ok(real) = fs::canonicalize(path) {
        return real;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => normalize(parent).join(name),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_refused() {
        let err = reset(Path::new("/"), Path::new("/src")).unwrap_err();
        assert!(matches!(err, ProvisionError::UnsafePath(_)));
    }

    #[test]
    fn relative_is_refused() {
        let err = reset(Path::new("opt/app"), Path::new("/src")).unwrap_err();
        assert!(matches!(err, ProvisionError::UnsafePath(_)));
    }

    #[test]
    fn ancestor_of_source_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();

        let err = reset(tmp.path(), &src).unwrap_err();

        assert!(matches!(err, ProvisionError::UnsafePath(_)));
        assert!(src.exists());
    }

    #[test]
    fn holding_area_inside_install_dir_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let install = tmp.path().join("opt/app");

        assert!(ensure_outside(&install.join("hold"), &install).is_err());
        assert!(ensure_outside(&install, &install).is_err());
        assert!(ensure_outside(&tmp.path().join("hold"), &install).is_ok());
    }

    #[test]
    fn write_atomic_leaves_no_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("unit.service");

        write_atomic(&target, b"first").unwrap();
        write_atomic(&target, b"second").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "second");
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }
}
