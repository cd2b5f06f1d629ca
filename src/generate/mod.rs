//! Artifact generation fan-out
//!
//! Each generator is a pure function from profile views to a named artifact.
//! A generator whose input is not applicable produces nothing and never
//! errors for that reason. The pipeline owns all filesystem writes.

pub mod header;
pub mod install;
pub mod network;
pub mod persistence;
pub mod provisioning;
pub mod ps;
pub mod version_info;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// An opaque named output with text contents, written by the pipeline into
/// the invocation's output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub contents: String,
}

impl Artifact {
    pub fn new(file_name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            contents: contents.into(),
        }
    }

    /// Write the artifact under `dir`, creating the directory if needed.
    pub fn write_to(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        fs::write(&path, &self.contents)?;
        Ok(path)
    }
}

/// Errors for artifact generation
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_artifact_write_creates_directory() {
        let dir = TempDir::new().unwrap();
        let artifact = Artifact::new("nested.txt", "payload");
        let out = dir.path().join("a/b");

        let written = artifact.write_to(&out).unwrap();
        assert_eq!(fs::read_to_string(written).unwrap(), "payload");
    }
}
