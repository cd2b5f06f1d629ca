//! Patch synthesis and validation against an upstream MeshAgent tree
//!
//! Synthesis never touches the upstream working copy: it clones the tree into
//! a disposable scratch repository, applies the branding transforms one commit
//! per changed file and exports `git format-patch` output. Validation applies
//! an exported patch set against a separate upstream tree, either as a
//! `git apply --check` dry run or for real.

mod transforms;
mod workcopy;

pub use transforms::{PatchRule, RULES};
pub use workcopy::WorkingCopy;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

/// Patch subsystem errors
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("upstream tree not found: {path}")]
    UpstreamNotFound { path: PathBuf },

    #[error("{command} exited with status {status}: {stderr}")]
    Subprocess {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("failed patches: {}", failed.join(", "))]
    Apply { failed: Vec<String> },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Options for [`synthesize`].
#[derive(Debug, Clone, Default)]
pub struct SynthesisOptions {
    /// Keep the scratch working copy instead of removing it.
    pub keep_workcopy: bool,
    /// Scratch directory override; defaults to a process-scoped directory
    /// under the system temp dir.
    pub workdir: Option<PathBuf>,
}

/// Result of a synthesis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisOutcome {
    /// No target file existed or no transform changed anything; no patch was
    /// written.
    NoChanges,
    /// Patch file names exported into the output directory, sorted.
    Patches(Vec<String>),
}

/// Whether validation dry-runs or really applies the patches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidateMode {
    Check,
    Apply,
}

/// Synthesize branding patches from `upstream` into `out_dir`.
///
/// Each transformed file is committed individually; missing files and no-op
/// transforms are skipped. When nothing changed, no patch is produced and the
/// output directory is left untouched. Otherwise prior `*.patch` files in
/// `out_dir` are deleted before the new set is exported.
pub fn synthesize(
    upstream: &Path,
    out_dir: &Path,
    options: &SynthesisOptions,
) -> Result<SynthesisOutcome, PatchError> {
    if !upstream.exists() {
        return Err(PatchError::UpstreamNotFound {
            path: upstream.to_path_buf(),
        });
    }

    let scratch = options.workdir.clone().unwrap_or_else(|| {
        std::env::temp_dir().join(format!("meshforge-patchbuild-{}", std::process::id()))
    });

    let workcopy = WorkingCopy::create(upstream, scratch)?;

    let mut changed_any = false;
    for rule in RULES {
        let target = workcopy.root().join(rule.path);
        if !target.exists() {
            continue;
        }
        let text = String::from_utf8_lossy(&fs::read(&target)?).into_owned();
        let (new_text, changed) = (rule.transform)(&text);
        if changed {
            fs::write(&target, new_text)?;
            workcopy.commit_file(rule.path, rule.message)?;
            changed_any = true;
        }
    }

    if !changed_any {
        if options.keep_workcopy {
            workcopy.keep();
        }
        return Ok(SynthesisOutcome::NoChanges);
    }

    fs::create_dir_all(out_dir)?;
    for stale in patch_files(out_dir) {
        let _ = fs::remove_file(stale);
    }
    let names = workcopy.export_patches(out_dir)?;

    if options.keep_workcopy {
        workcopy.keep();
    }
    Ok(SynthesisOutcome::Patches(names))
}

/// Validate a patch set against an upstream tree.
///
/// Patches are taken in sorted order. In [`ValidateMode::Check`] the first
/// failure aborts the run and is reported alone; in [`ValidateMode::Apply`]
/// every patch is attempted and all failures are reported together. Success
/// returns the number of patches processed.
pub fn validate(
    patch_dir: &Path,
    upstream: &Path,
    mode: ValidateMode,
) -> Result<usize, PatchError> {
    if !upstream.exists() {
        return Err(PatchError::UpstreamNotFound {
            path: upstream.to_path_buf(),
        });
    }

    let mut checked = 0usize;
    let mut failed = Vec::new();
    for patch in patch_files(patch_dir) {
        // git runs inside the upstream tree, patch paths must be absolute
        let patch_abs = patch.canonicalize()?;
        let name = patch
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| patch.display().to_string());

        let applied = apply_one(&patch_abs, upstream, mode)?;
        checked += 1;
        if !applied {
            failed.push(name);
            if mode == ValidateMode::Check {
                break;
            }
        }
    }

    if failed.is_empty() {
        Ok(checked)
    } else {
        Err(PatchError::Apply { failed })
    }
}

fn apply_one(patch: &Path, upstream: &Path, mode: ValidateMode) -> Result<bool, PatchError> {
    let mut command = Command::new("git");
    command.arg("apply");
    if mode == ValidateMode::Check {
        command.arg("--check");
    }
    command.arg(patch).current_dir(upstream);
    let status = command.status()?;
    Ok(status.success())
}

/// All `*.patch` files under `dir`, recursively, sorted by path.
fn patch_files(dir: &Path) -> Vec<PathBuf> {
    let mut patches: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "patch"))
        .collect();
    patches.sort();
    patches
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_patch_files_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("branding")).unwrap();
        fs::write(dir.path().join("branding/0002-b.patch"), "").unwrap();
        fs::write(dir.path().join("branding/0001-a.patch"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let found = patch_files(dir.path());
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["0001-a.patch", "0002-b.patch"]);
    }

    #[test]
    fn test_synthesize_missing_upstream() {
        let out = TempDir::new().unwrap();
        let err = synthesize(
            Path::new("/nonexistent/upstream"),
            out.path(),
            &SynthesisOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PatchError::UpstreamNotFound { .. }));
    }

    #[test]
    fn test_validate_missing_upstream() {
        let patches = TempDir::new().unwrap();
        let err = validate(
            patches.path(),
            Path::new("/nonexistent/upstream"),
            ValidateMode::Check,
        )
        .unwrap_err();
        assert!(matches!(err, PatchError::UpstreamNotFound { .. }));
    }

    #[test]
    fn test_validate_empty_patch_dir_is_ok() {
        let patches = TempDir::new().unwrap();
        let upstream = TempDir::new().unwrap();
        let checked = validate(patches.path(), upstream.path(), ValidateMode::Check).unwrap();
        assert_eq!(checked, 0);
    }
}
