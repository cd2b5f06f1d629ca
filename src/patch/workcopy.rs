//! Disposable git working copy
//!
//! A `WorkingCopy` is a scoped scratch checkout: the upstream tree copied
//! without its `.git`, re-initialized as a fresh repository with a baseline
//! commit. It is removed on drop unless the caller explicitly keeps it, so
//! every exit path of synthesis cleans up after itself.

use super::PatchError;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

pub struct WorkingCopy {
    root: PathBuf,
    baseline: String,
    keep: bool,
}

impl WorkingCopy {
    /// Copy `upstream` (minus version-control metadata) into `scratch`,
    /// initialize a repository there and commit the untouched copy.
    pub fn create(upstream: &Path, scratch: PathBuf) -> Result<Self, PatchError> {
        if scratch.exists() {
            fs::remove_dir_all(&scratch)?;
        }
        copy_tree(upstream, &scratch)?;

        run_git(&scratch, &["init"])?;
        run_git(&scratch, &["add", "."])?;
        run_git(
            &scratch,
            &[
                "-c",
                "user.email=patchbot@example.com",
                "-c",
                "user.name=patchbot",
                "commit",
                "-m",
                "baseline",
            ],
        )?;
        let baseline = run_git(&scratch, &["rev-parse", "HEAD"])?;

        Ok(Self {
            root: scratch,
            baseline,
            keep: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stage and commit one file, with identity pinned for reproducibility.
    pub fn commit_file(&self, relative: &str, message: &str) -> Result<(), PatchError> {
        run_git(&self.root, &["add", relative])?;
        run_git(
            &self.root,
            &[
                "-c",
                "user.email=patchbot@example.com",
                "-c",
                "user.name=patchbot",
                "commit",
                "-m",
                message,
            ],
        )?;
        Ok(())
    }

    /// Export every commit past the baseline as a patch file into `out_dir`,
    /// returning the written file names.
    pub fn export_patches(&self, out_dir: &Path) -> Result<Vec<String>, PatchError> {
        fs::create_dir_all(out_dir)?;
        // format-patch runs inside the working copy, so the output directory
        // must be absolute.
        let out_abs = out_dir.canonicalize()?;
        let range = format!("{}..HEAD", self.baseline);
        let stdout = run_git(
            &self.root,
            &[
                "format-patch",
                "-o",
                &out_abs.to_string_lossy(),
                "--no-signature",
                &range,
            ],
        )?;

        let mut names: Vec<String> = stdout
            .lines()
            .filter(|line| !line.is_empty())
            .filter_map(|line| {
                Path::new(line.trim())
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .collect();
        names.sort();
        Ok(names)
    }

    /// Disarm the drop guard and hand the scratch path to the caller.
    pub fn keep(mut self) -> PathBuf {
        self.keep = true;
        self.root.clone()
    }
}

impl Drop for WorkingCopy {
    fn drop(&mut self) {
        if !self.keep && self.root.exists() {
            let _ = fs::remove_dir_all(&self.root);
        }
    }
}

fn copy_tree(src: &Path, dst: &Path) -> Result<(), PatchError> {
    for entry in WalkDir::new(src).into_iter().filter_entry(|e| {
        !(e.file_type().is_dir() && e.file_name() == ".git")
    }) {
        let entry = entry.map_err(|e| {
            PatchError::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::Other, "walk failed")
            }))
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .expect("walked path is under its root");
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Run a git subcommand in `cwd`, returning trimmed stdout.
pub(crate) fn run_git(cwd: &Path, args: &[&str]) -> Result<String, PatchError> {
    let output = Command::new("git").args(args).current_dir(cwd).output()?;
    if !output.status.success() {
        return Err(PatchError::Subprocess {
            command: format!("git {}", args.join(" ")),
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
