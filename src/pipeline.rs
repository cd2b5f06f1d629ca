//! Pipeline orchestration
//!
//! Wires the stages together for the CLI: resolve the configuration, gate on
//! the compliance report, fan out the generators, write artifacts and stage
//! packaging inputs. Validation failures carry the full violation list so the
//! report is never truncated; everything else is fail-fast.

use crate::compliance::{self, Violation};
use crate::config::{self, ConfigError, FlatConfig};
use crate::generate::{
    header, install, network, persistence, provisioning, version_info, Artifact, GenerateError,
};
use crate::package::{self, PackageError, PackageOptions};
use crate::patch::PatchError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Top-level pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("validation failed with {} violation(s)", .0.len())]
    ValidationFailed(Vec<Violation>),

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl PipelineError {
    /// Process exit code: validation failures are distinguishable from hard
    /// errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::ValidationFailed(_) => 2,
            _ => 1,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Resolve a configuration and report its compliance violations.
pub fn validate(config_path: &Path) -> PipelineResult<Vec<Violation>> {
    let config = config::resolve(config_path)?;
    Ok(compliance::validate(&config))
}

/// Resolve, gate on compliance and write the full artifact set into
/// `out_dir`. Returns the written paths.
pub fn generate(config_path: &Path, out_dir: &Path) -> PipelineResult<Vec<PathBuf>> {
    let config = resolve_gated(config_path)?;
    let artifacts = build_artifacts(&config)?;

    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in &artifacts {
        let path = artifact.write_to(out_dir).map_err(GenerateError::Io)?;
        println!("[meshforge] wrote {}", path.display());
        written.push(path);
    }

    if let Some(icon) = copy_icon(&config, config_path, out_dir)? {
        written.push(icon);
    }

    Ok(written)
}

/// Run the generate fan-out, then stage the prebuilt binary and optional
/// installer script next to the artifacts.
pub fn package(
    config_path: &Path,
    out_dir: &Path,
    binary: &Path,
    options: &PackageOptions,
) -> PipelineResult<Vec<PathBuf>> {
    let mut written = generate(config_path, out_dir)?;

    let config = config::resolve(config_path)?;
    let branding = config.branding()?;
    let staged = package::stage(&branding, out_dir, binary, options)?;
    for path in &staged {
        println!("[meshforge] staged {}", path.display());
    }
    written.extend(staged);
    Ok(written)
}

fn resolve_gated(config_path: &Path) -> PipelineResult<FlatConfig> {
    let config = config::resolve(config_path)?;
    let violations = compliance::validate(&config);
    if !violations.is_empty() {
        return Err(PipelineError::ValidationFailed(violations));
    }
    Ok(config)
}

fn build_artifacts(config: &FlatConfig) -> PipelineResult<Vec<Artifact>> {
    let branding = config.branding()?;
    let network_profile = config.network()?;
    let persistence_profile = config.persistence()?;
    let provisioning_profile = config.provisioning()?;
    let artifact_names = config.artifact_names()?;
    let proxy = network_profile.proxy.clone();

    let mut artifacts = vec![
        header::generate(&branding, &network_profile, &persistence_profile),
        version_info::generate(&branding),
        network::generate(&network_profile)?,
        persistence::generate(&branding, &persistence_profile),
        install::generate(&branding, &artifact_names),
    ];
    artifacts.extend(provisioning::generate(
        &branding,
        &provisioning_profile,
        proxy.as_ref(),
    ));
    Ok(artifacts)
}

/// Copy the configured icon asset next to the artifacts. A missing icon is a
/// declared soft failure: logged and skipped.
fn copy_icon(
    config: &FlatConfig,
    config_path: &Path,
    out_dir: &Path,
) -> PipelineResult<Option<PathBuf>> {
    let branding = config.branding()?;
    let Some(icon) = branding.icon.as_deref().filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let candidate = PathBuf::from(icon);
    let source = if candidate.is_absolute() {
        candidate
    } else {
        config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(candidate)
    };

    if !source.exists() {
        eprintln!(
            "[meshforge] warning: icon not found, skipping: {}",
            source.display()
        );
        return Ok(None);
    }

    let file_name = source
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "icon.ico".into());
    let dest = out_dir.join(file_name);
    fs::create_dir_all(out_dir)?;
    fs::copy(&source, &dest)?;
    println!("[meshforge] copied icon {}", dest.display());
    Ok(Some(dest))
}
