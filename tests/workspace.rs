use std::fs;
use std::os::unix::fs::PermissionsExt;

use ancora::ProvisionError;
use ancora::workspace::{check_app_module, deploy, reset};

fn source_tree(root: &std::path::Path) -> std::path::PathBuf {
    let src = root.join("src");
    fs::create_dir_all(src.join("templates/partials")).unwrap();
    fs::create_dir_all(src.join(".venv")).unwrap();
    fs::write(src.join("webapp.py"), "app = None\n").unwrap();
    fs::write(src.join("templates/partials/row.html"), "<tr></tr>\n").unwrap();
    fs::write(src.join(".env"), "SECRET=1\n").unwrap();
    fs::write(src.join("run.sh"), "#!/bin/sh\n").unwrap();
    fs::set_permissions(src.join("run.sh"), fs::Permissions::from_mode(0o755)).unwrap();
    std::os::unix::fs::symlink("webapp.py", src.join("app.py")).unwrap();
    src
}

#[test]
fn reset_wipes_existing_content() {
    let tmp = tempfile::tempdir().unwrap();
    let src = source_tree(tmp.path());
    let install = tmp.path().join("opt/app");
    fs::create_dir_all(install.join("old")).unwrap();
    fs::write(install.join("old/stale.txt"), "stale").unwrap();

    reset(&install, &src).unwrap();

    assert!(install.is_dir());
    assert_eq!(fs::read_dir(&install).unwrap().count(), 0);
}

#[test]
fn deploy_copies_tree() {
    let tmp = tempfile::tempdir().unwrap();
    let src = source_tree(tmp.path());
    let install = tmp.path().join("opt/app");
    reset(&install, &src).unwrap();

    let copied = deploy(&src, &install).unwrap();

    assert_eq!(copied, 4);
    assert_eq!(
        fs::read_to_string(install.join("templates/partials/row.html")).unwrap(),
        "<tr></tr>\n"
    );
    assert!(!install.join(".env").exists());
    assert!(!install.join(".venv").exists());
}

#[test]
fn deploy_preserves_exec_bit_and_links() {
    let tmp = tempfile::tempdir().unwrap();
    let src = source_tree(tmp.path());
    let install = tmp.path().join("opt/app");
    reset(&install, &src).unwrap();

    deploy(&src, &install).unwrap();

    let mode = fs::metadata(install.join("run.sh")).unwrap().permissions().mode();
    assert_eq!(mode & 0o111, 0o111);
    assert_eq!(
        fs::read_link(install.join("app.py")).unwrap(),
        std::path::PathBuf::from("webapp.py")
    );
}

#[test]
fn deploy_into_source_is_refused() {
    let tmp = tempfile::tempdir().unwrap();
    let src = source_tree(tmp.path());

    let err = deploy(&src, &src.join("build")).unwrap_err();

    assert!(matches!(err, ProvisionError::UnsafePath(_)));
}

#[test]
fn deploy_missing_source() {
    let tmp = tempfile::tempdir().unwrap();

    let err = deploy(&tmp.path().join("nope"), &tmp.path().join("opt")).unwrap_err();

    assert!(matches!(err, ProvisionError::FileNotFound(_)));
}

#[test]
fn app_module_as_file_or_package() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("webapp.py"), "").unwrap();
    fs::create_dir_all(tmp.path().join("api/v1")).unwrap();
    fs::write(tmp.path().join("api/v1/__init__.py"), "").unwrap();

    assert!(check_app_module(tmp.path(), "webapp"));
    assert!(check_app_module(tmp.path(), "api.v1"));
    assert!(!check_app_module(tmp.path(), "missing"));
}
