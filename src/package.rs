//! Packaging of prebuilt agent binaries
//!
//! Stages a prebuilt binary next to the generated artifact set under its
//! branded name, optionally adds an architecture-named copy, and optionally
//! emits (and compiles) an NSIS installer script. The generate fan-out is run
//! by the pipeline before staging; this module only handles the binary and
//! installer side.

use crate::config::BrandingProfile;
use crate::generate::install;
use crate::generate::Artifact;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const INSTALLER_FILE_NAME: &str = "installer.nsi";

/// Packaging errors
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("asset not found: {path}")]
    AssetNotFound { path: PathBuf },

    #[error("{command} exited with status {status}")]
    Subprocess { command: String, status: i32 },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Options for [`stage`].
#[derive(Debug, Clone, Default)]
pub struct PackageOptions {
    /// Target architecture; when set, an architecture-named copy of the
    /// binary is staged additionally.
    pub arch: Option<String>,
    /// Emit an NSIS installer script.
    pub installer_script: bool,
    /// Path to the `makensis` compiler; implies the installer script and
    /// compiles it.
    pub makensis: Option<PathBuf>,
}

/// Stage the prebuilt binary (and optional extras) into `artifact_dir`.
///
/// The binary itself is required; the architecture-named copy is a declared
/// soft failure, logged and skipped. Returns the staged paths.
pub fn stage(
    branding: &BrandingProfile,
    artifact_dir: &Path,
    binary: &Path,
    options: &PackageOptions,
) -> Result<Vec<PathBuf>, PackageError> {
    if !binary.exists() {
        return Err(PackageError::AssetNotFound {
            path: binary.to_path_buf(),
        });
    }
    fs::create_dir_all(artifact_dir)?;

    let mut staged = Vec::new();

    let branded = artifact_dir.join(branding.binary());
    fs::copy(binary, &branded)?;
    staged.push(branded);

    if let Some(arch) = options.arch.as_deref() {
        let arch_name = arch_binary_name(branding.binary(), arch);
        let arch_path = artifact_dir.join(&arch_name);
        match fs::copy(binary, &arch_path) {
            Ok(_) => staged.push(arch_path),
            Err(err) => {
                eprintln!("[meshforge] warning: skipping {arch_name}: {err}");
            }
        }
    }

    if options.installer_script || options.makensis.is_some() {
        let script = installer_script(branding);
        let script_path = script.write_to(artifact_dir)?;

        if let Some(makensis) = &options.makensis {
            compile_installer(makensis, &script_path)?;
        }
        staged.push(script_path);
    }

    Ok(staged)
}

/// `<stem>-<arch>.<ext>` next to the branded binary name.
fn arch_binary_name(binary: &str, arch: &str) -> String {
    match binary.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}-{arch}.{ext}"),
        None => format!("{binary}-{arch}"),
    }
}

/// Emit the NSIS installer script driving `install.ps1` out of the staged
/// artifact directory.
pub fn installer_script(branding: &BrandingProfile) -> Artifact {
    let product = branding.product();
    let mut out = String::new();
    out.push_str(&format!("Name \"{}\"\n", product));
    out.push_str(&format!(
        "OutFile \"{}-setup.exe\"\n",
        product.replace(' ', "-").to_lowercase()
    ));
    out.push_str(&format!(
        "InstallDir \"{}\"\n",
        branding.install_directory().replace('/', "\\")
    ));
    out.push_str("RequestExecutionLevel admin\n\n");
    out.push_str("Section \"Install\"\n");
    out.push_str("    SetOutPath \"$INSTDIR\"\n");
    out.push_str(&format!("    File \"{}\"\n", branding.binary()));
    out.push_str(&format!("    File \"{}\"\n", install::FILE_NAME));
    out.push_str("    File /nonfatal \"*.msh\"\n");
    out.push_str(&format!(
        "    ExecWait 'powershell -NoProfile -ExecutionPolicy Bypass -File \"$INSTDIR\\{}\" -SourceDir \"$INSTDIR\"'\n",
        install::FILE_NAME
    ));
    out.push_str("SectionEnd\n");

    Artifact::new(INSTALLER_FILE_NAME, out)
}

fn compile_installer(makensis: &Path, script: &Path) -> Result<(), PackageError> {
    let status = Command::new(makensis).arg(script).status()?;
    if !status.success() {
        return Err(PackageError::Subprocess {
            command: format!("{} {}", makensis.display(), script.display()),
            status: status.code().unwrap_or(-1),
        });
    }
    Ok(())
}
