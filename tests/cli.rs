use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn assetpipe(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("assetpipe").expect("assetpipe binary build failed");
    cmd.current_dir(dir).env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[test]
fn list_prints_tasks_and_plans() {
    let dir = tempdir().unwrap();

    assetpipe(dir.path())
        .arg("list")
        .assert()
        .success()
        .stderr(
            contains("styles")
                .and(contains("fonts"))
                .and(contains("serve"))
                .and(contains("default"))
                .and(contains("build")),
        );
}

#[test]
fn unknown_task_is_rejected() {
    let dir = tempdir().unwrap();

    assetpipe(dir.path())
        .arg("deploy")
        .assert()
        .failure()
        .stderr(contains("deploy"));
}

#[test]
fn failing_task_exits_nonzero() {
    let dir = tempdir().unwrap();

    assetpipe(dir.path())
        .arg("scripts")
        .assert()
        .failure()
        .stderr(contains("main.js"));
}

#[test]
fn init_then_pages_assembles_index() {
    let dir = tempdir().unwrap();

    assetpipe(dir.path()).arg("init").assert().success();
    assert!(dir.path().join("assetpipe.toml").is_file());

    assetpipe(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(contains("--force"));

    assetpipe(dir.path()).arg("pages").assert().success();

    let index = fs::read_to_string(dir.path().join("app/index.html")).unwrap();
    assert!(index.contains("<header>"));
    assert!(!index.contains("include"));
}

#[test]
fn build_copies_manifest_into_dist() {
    let dir = tempdir().unwrap();
    let app = dir.path().join("app");
    write(&app.join("css/style.min.css"), "body{margin:0}");
    write(&app.join("js/main.min.js"), "var a=1;");
    write(&app.join("images/sprite.svg"), "<svg></svg>");
    write(&app.join("images/logo.svg"), "<svg></svg>");
    write(&app.join("images/photo.webp"), "webp");
    write(&app.join("fonts/Inter.woff2"), "wOF2");
    write(&app.join("index.html"), "<html></html>");
    write(&app.join("scss/style.scss"), "body { margin: 0 }");
    write(&dir.path().join("dist/old.css"), "stale");

    assetpipe(dir.path())
        .arg("build")
        .assert()
        .success()
        .stderr(contains("clean").and(contains("copy")));

    let dist = dir.path().join("dist");
    for file in [
        "css/style.min.css",
        "js/main.min.js",
        "images/sprite.svg",
        "images/photo.webp",
        "fonts/Inter.woff2",
        "index.html",
    ] {
        assert!(dist.join(file).is_file(), "{} missing from dist", file);
    }
    assert!(!dist.join("images/logo.svg").exists());
    assert!(!dist.join("scss").exists());
    assert!(!dist.join("old.css").exists());
}

#[test]
fn build_fails_when_listed_file_is_missing() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("app/index.html"), "<html></html>");

    assetpipe(dir.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(contains("css/style.min.css"));
}
