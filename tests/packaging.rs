//! Checks on the distribution files under packaging/

use std::path::PathBuf;

fn packaging_file(rel: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("packaging").join(rel);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {}: {}", path.display(), e))
}

#[test]
fn test_desktop_entry_matches_bundled_binary() {
    let desktop = packaging_file("linux/JDS6600Controller.desktop");
    let lines: Vec<&str> = desktop.lines().map(str::trim).collect();

    assert_eq!(lines[0], "[Desktop Entry]");
    assert!(lines.contains(&"Exec=JDS6600Controller"));
    assert!(lines.contains(&"Icon=JDS6600Controller"));
    assert!(lines.contains(&"Type=Application"));
}

#[test]
fn test_apprun_execs_binary() {
    let apprun = packaging_file("linux/AppRun");
    assert!(apprun.starts_with("#!"));
    assert!(apprun.contains("exec \"$HERE/usr/bin/JDS6600Controller\" \"$@\""));
}

#[test]
fn test_build_scripts_abort_on_error() {
    let linux = packaging_file("linux/build-appimage.sh");
    assert!(linux.contains("set -euo pipefail"));
    assert!(linux.contains("JDS6600Controller-x86_64.AppImage"));
    assert!(linux.contains("target/release/jds6600-controller"));

    let windows = packaging_file("windows/build.ps1");
    assert!(windows.contains("$ErrorActionPreference = \"Stop\""));
    assert!(windows.contains("JDS6600Controller-win64.exe"));
}

#[test]
fn test_build_scripts_work_without_lockfile() {
    // No Cargo.lock is committed, so a clean checkout must be able to create one
    for script in ["linux/build-appimage.sh", "windows/build.ps1"] {
        let text = packaging_file(script);
        assert!(text.contains("cargo build --release"), "{script}");
        assert!(!text.contains("--locked"), "{script}");
        assert!(!text.contains("--frozen"), "{script}");
    }
}

#[test]
fn test_missing_icon_gets_a_real_png() {
    let linux = packaging_file("linux/build-appimage.sh");
    let icon = linux
        .lines()
        .find_map(|l| l.strip_prefix("PLACEHOLDER_ICON="))
        .expect("placeholder icon defined")
        .trim_matches('"');
    // base64 of the PNG signature followed by an IHDR chunk
    assert!(icon.starts_with("iVBORw0KGgoAAAANSUhEUg"));
    assert!(icon.len() > 40);
    assert!(linux.contains("base64 -d > \"$APPDIR/JDS6600Controller.png\""));
}

#[test]
fn test_example_commands_parse() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("commands.example.csv");
    let steps = jds6600_controller::parse_commands_file(&path).expect("example should parse");
    assert!(!steps.is_empty());
}
