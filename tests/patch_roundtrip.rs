//! Patch synthesis and validation round trip
//!
//! Exercises the full patch lifecycle against a fabricated upstream tree:
//! synthesis into a patch set, dry-run validation, real application, and the
//! no-op behavior on trees that are already branded or have no target files.
//!
//! These tests shell out to `git` and are skipped when it is unavailable.

use meshforge::patch::{self, PatchError, SynthesisOptions, SynthesisOutcome, ValidateMode};
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Each test gets its own scratch directory so parallel tests never share
/// the process-scoped default.
fn options_in(workdir: &TempDir) -> SynthesisOptions {
    SynthesisOptions {
        keep_workcopy: false,
        workdir: Some(workdir.path().join("scratch")),
    }
}

const AGENTCORE: &str = "#include \"agentcore.h\"\n\n\
void MeshAgent_Create(struct MeshAgentHost *agentHost)\n{\n\
    agentHost->meshServiceName = \"Mesh Agent\";\n}\n";

const SERVICEMAIN: &str = "#include <windows.h>\n#include <WtsApi32.h>\n\n\
void ServiceMain(void)\n{\n\
    TCHAR* serviceFile = TEXT(\"Mesh Agent\");\n\
    TCHAR* serviceName = TEXT(\"Mesh Agent background service\");\n}\n";

const RC: &str = "#include \"resource.h\"\n\nVS_VERSION_INFO VERSIONINFO\nBEGIN\n\
            VALUE \"FileDescription\", \"Mesh Agent\"\n\
            VALUE \"ProductName\", \"MeshCentral Agent\"\nEND\n";

/// Lay out an upstream tree containing three of the four target files.
fn fabricate_upstream(root: &Path) {
    fs::create_dir_all(root.join("meshcore")).unwrap();
    fs::create_dir_all(root.join("meshservice")).unwrap();
    fs::write(root.join("meshcore/agentcore.c"), AGENTCORE).unwrap();
    fs::write(root.join("meshservice/ServiceMain.c"), SERVICEMAIN).unwrap();
    fs::write(root.join("meshservice/MeshService.rc"), RC).unwrap();
}

#[test]
fn test_synthesize_exports_one_patch_per_changed_file() {
    if !git_available() {
        return;
    }
    let upstream = TempDir::new().unwrap();
    fabricate_upstream(upstream.path());
    let out = TempDir::new().unwrap();
    let workdir = TempDir::new().unwrap();

    let options = SynthesisOptions {
        keep_workcopy: false,
        workdir: Some(workdir.path().join("scratch")),
    };
    let outcome = patch::synthesize(upstream.path(), out.path(), &options).unwrap();

    let names = match outcome {
        SynthesisOutcome::Patches(names) => names,
        SynthesisOutcome::NoChanges => panic!("expected patches"),
    };
    assert_eq!(names.len(), 3, "one patch per changed file: {names:?}");
    assert!(names.iter().all(|n| n.ends_with(".patch")));

    // scratch working copy is removed
    assert!(!workdir.path().join("scratch").exists());

    // upstream itself was never touched
    assert_eq!(
        fs::read_to_string(upstream.path().join("meshcore/agentcore.c")).unwrap(),
        AGENTCORE
    );
}

#[test]
fn test_check_then_apply_round_trip() {
    if !git_available() {
        return;
    }
    let source = TempDir::new().unwrap();
    fabricate_upstream(source.path());
    let out = TempDir::new().unwrap();

    let wd = TempDir::new().unwrap();
    patch::synthesize(source.path(), out.path(), &options_in(&wd)).unwrap();

    // validate against a second pristine copy
    let target = TempDir::new().unwrap();
    fabricate_upstream(target.path());

    let checked = patch::validate(out.path(), target.path(), ValidateMode::Check).unwrap();
    assert_eq!(checked, 3);
    // dry run leaves the tree untouched
    assert_eq!(
        fs::read_to_string(target.path().join("meshcore/agentcore.c")).unwrap(),
        AGENTCORE
    );

    let applied = patch::validate(out.path(), target.path(), ValidateMode::Apply).unwrap();
    assert_eq!(applied, 3);
    let branded = fs::read_to_string(target.path().join("meshcore/agentcore.c")).unwrap();
    assert!(branded.contains("agentHost->meshServiceName = MESH_AGENT_SERVICE_FILE_A;"));
    let rc = fs::read_to_string(target.path().join("meshservice/MeshService.rc")).unwrap();
    assert!(rc.contains("VALUE \"FileDescription\", MESH_AGENT_FILE_DESCRIPTION"));
}

#[test]
fn test_synthesis_on_branded_tree_is_a_no_op() {
    if !git_available() {
        return;
    }
    let upstream = TempDir::new().unwrap();
    fabricate_upstream(upstream.path());
    let out = TempDir::new().unwrap();

    let wd = TempDir::new().unwrap();
    patch::synthesize(upstream.path(), out.path(), &options_in(&wd)).unwrap();
    patch::validate(out.path(), upstream.path(), ValidateMode::Apply).unwrap();

    // a second synthesis against the now-branded tree changes nothing
    let out2 = TempDir::new().unwrap();
    let wd2 = TempDir::new().unwrap();
    let outcome = patch::synthesize(upstream.path(), out2.path(), &options_in(&wd2)).unwrap();
    assert_eq!(outcome, SynthesisOutcome::NoChanges);
    assert!(fs::read_dir(out2.path()).unwrap().next().is_none());
}

#[test]
fn test_synthesis_without_target_files_produces_no_patches() {
    if !git_available() {
        return;
    }
    let upstream = TempDir::new().unwrap();
    fs::write(upstream.path().join("README.md"), "unrelated\n").unwrap();
    let out = TempDir::new().unwrap();

    let wd = TempDir::new().unwrap();
    let outcome = patch::synthesize(upstream.path(), out.path(), &options_in(&wd)).unwrap();
    assert_eq!(outcome, SynthesisOutcome::NoChanges);
}

#[test]
fn test_kept_workcopy_survives() {
    if !git_available() {
        return;
    }
    let upstream = TempDir::new().unwrap();
    fabricate_upstream(upstream.path());
    let out = TempDir::new().unwrap();
    let workdir = TempDir::new().unwrap();
    let scratch = workdir.path().join("scratch");

    let options = SynthesisOptions {
        keep_workcopy: true,
        workdir: Some(scratch.clone()),
    };
    patch::synthesize(upstream.path(), out.path(), &options).unwrap();

    assert!(scratch.join(".git").exists());
    let kept = fs::read_to_string(scratch.join("meshcore/agentcore.c")).unwrap();
    assert!(kept.contains("MESH_AGENT_SERVICE_FILE_A"));
}

#[test]
fn test_regenerating_replaces_stale_patches() {
    if !git_available() {
        return;
    }
    let upstream = TempDir::new().unwrap();
    fabricate_upstream(upstream.path());
    let out = TempDir::new().unwrap();
    fs::write(out.path().join("0009-stale.patch"), "stale\n").unwrap();

    let wd = TempDir::new().unwrap();
    patch::synthesize(upstream.path(), out.path(), &options_in(&wd)).unwrap();
    assert!(!out.path().join("0009-stale.patch").exists());
}

fn write_patch(dir: &Path, name: &str, target: &str, old: &str, new: &str) {
    let body = format!(
        "--- a/{target}\n+++ b/{target}\n@@ -1 +1 @@\n-{old}\n+{new}\n"
    );
    fs::write(dir.join(name), body).unwrap();
}

#[test]
fn test_dry_run_stops_at_first_failure() {
    if !git_available() {
        return;
    }
    let upstream = TempDir::new().unwrap();
    fs::write(upstream.path().join("a.txt"), "alpha\n").unwrap();
    fs::write(upstream.path().join("c.txt"), "gamma\n").unwrap();

    let patches = TempDir::new().unwrap();
    write_patch(patches.path(), "0001-a.patch", "a.txt", "alpha", "ALPHA");
    // b.txt does not exist, so this one cannot apply
    write_patch(patches.path(), "0002-b.patch", "b.txt", "beta", "BETA");
    write_patch(patches.path(), "0003-c.patch", "c.txt", "gamma", "GAMMA");

    let err = patch::validate(patches.path(), upstream.path(), ValidateMode::Check).unwrap_err();
    match err {
        PatchError::Apply { failed } => {
            assert_eq!(failed, vec!["0002-b.patch".to_string()]);
        }
        other => panic!("expected Apply error, got {other:?}"),
    }
}

#[test]
fn test_apply_mode_collects_all_failures() {
    if !git_available() {
        return;
    }
    let upstream = TempDir::new().unwrap();
    fs::write(upstream.path().join("a.txt"), "alpha\n").unwrap();

    let patches = TempDir::new().unwrap();
    write_patch(patches.path(), "0001-a.patch", "a.txt", "alpha", "ALPHA");
    write_patch(patches.path(), "0002-b.patch", "b.txt", "beta", "BETA");
    write_patch(patches.path(), "0003-c.patch", "c.txt", "gamma", "GAMMA");

    let err = patch::validate(patches.path(), upstream.path(), ValidateMode::Apply).unwrap_err();
    match err {
        PatchError::Apply { failed } => {
            assert_eq!(
                failed,
                vec!["0002-b.patch".to_string(), "0003-c.patch".to_string()]
            );
        }
        other => panic!("expected Apply error, got {other:?}"),
    }

    // the successful first patch really applied
    assert_eq!(
        fs::read_to_string(upstream.path().join("a.txt")).unwrap(),
        "ALPHA\n"
    );
}
