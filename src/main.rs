//! meshforge CLI
//!
//! Entry point for the `meshforge` command-line tool.

use clap::{Parser, Subcommand};
use meshforge::package::PackageOptions;
use meshforge::patch::{self, SynthesisOptions, SynthesisOutcome, ValidateMode};
use meshforge::pipeline::{self, PipelineError};
use std::path::{Path, PathBuf};
use std::process::{self, Command};

#[derive(Parser)]
#[command(name = "meshforge")]
#[command(about = "Branding and packaging pipeline for custom MeshAgent builds", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a config and report compliance violations
    Validate {
        /// Path to the branding config document
        #[arg(long, short = 'c')]
        config: PathBuf,
    },

    /// Check that the upstream tree and required tooling are present
    Prepare {
        /// Path to the upstream MeshAgent source tree
        #[arg(long)]
        upstream: PathBuf,

        /// Installer compiler to probe (optional)
        #[arg(long)]
        makensis: Option<PathBuf>,
    },

    /// Patch synthesis and validation
    Patch {
        #[command(subcommand)]
        action: PatchCommands,
    },

    /// Generate the branding artifact set from a config
    Generate {
        /// Path to the branding config document
        #[arg(long, short = 'c')]
        config: PathBuf,

        /// Output directory for generated artifacts
        #[arg(long, short = 'o')]
        out: PathBuf,
    },

    /// Generate artifacts and stage a prebuilt binary for packaging
    Package {
        /// Path to the branding config document
        #[arg(long, short = 'c')]
        config: PathBuf,

        /// Output directory for generated artifacts
        #[arg(long, short = 'o')]
        out: PathBuf,

        /// Path to the prebuilt agent binary
        #[arg(long)]
        binary: PathBuf,

        /// Target architecture; stages an extra arch-named binary copy
        #[arg(long)]
        arch: Option<String>,

        /// Emit an NSIS installer script
        #[arg(long)]
        installer_script: bool,

        /// Path to makensis; compiles the installer script
        #[arg(long)]
        makensis: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum PatchCommands {
    /// Synthesize branding patches from an upstream tree
    Make {
        /// Path to the upstream MeshAgent source tree
        #[arg(long)]
        upstream: PathBuf,

        /// Output directory for patch files
        #[arg(long, short = 'o')]
        out: PathBuf,

        /// Keep the scratch working copy for inspection
        #[arg(long)]
        keep_workcopy: bool,

        /// Scratch directory override
        #[arg(long)]
        workdir: Option<PathBuf>,
    },

    /// Dry-run a patch set against an upstream tree
    Check {
        /// Directory holding the patch files
        #[arg(long)]
        patches: PathBuf,

        /// Path to the upstream MeshAgent source tree
        #[arg(long)]
        upstream: PathBuf,
    },

    /// Apply a patch set to an upstream tree
    Apply {
        /// Directory holding the patch files
        #[arg(long)]
        patches: PathBuf,

        /// Path to the upstream MeshAgent source tree
        #[arg(long)]
        upstream: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => run_validate(&config),
        Commands::Prepare { upstream, makensis } => run_prepare(&upstream, makensis.as_deref()),
        Commands::Patch { action } => match action {
            PatchCommands::Make {
                upstream,
                out,
                keep_workcopy,
                workdir,
            } => run_patch_make(&upstream, &out, keep_workcopy, workdir),
            PatchCommands::Check { patches, upstream } => {
                run_patch_validate(&patches, &upstream, ValidateMode::Check)
            }
            PatchCommands::Apply { patches, upstream } => {
                run_patch_validate(&patches, &upstream, ValidateMode::Apply)
            }
        },
        Commands::Generate { config, out } => run_generate(&config, &out),
        Commands::Package {
            config,
            out,
            binary,
            arch,
            installer_script,
            makensis,
        } => {
            let options = PackageOptions {
                arch,
                installer_script,
                makensis,
            };
            run_package(&config, &out, &binary, &options);
        }
    }
}

fn run_validate(config: &Path) {
    match pipeline::validate(config) {
        Ok(violations) if violations.is_empty() => {
            println!("[meshforge] validated {}", config.display());
        }
        Ok(violations) => {
            for violation in &violations {
                eprintln!("[meshforge] {}", violation);
            }
            eprintln!(
                "[meshforge] validation failed with {} violation(s)",
                violations.len()
            );
            process::exit(2);
        }
        Err(e) => fail(&e),
    }
}

fn run_prepare(upstream: &Path, makensis: Option<&Path>) {
    let mut ready = true;

    if upstream.exists() {
        println!("[meshforge] upstream tree: {}", upstream.display());
        for rule in patch::RULES {
            let target = upstream.join(rule.path);
            let marker = if target.exists() { "found" } else { "missing" };
            println!("[meshforge]   {} ({})", rule.path, marker);
        }
    } else {
        eprintln!("[meshforge] upstream tree not found: {}", upstream.display());
        ready = false;
    }

    match probe(Command::new("git").arg("--version")) {
        Some(version) => println!("[meshforge] git: {}", version),
        None => {
            eprintln!("[meshforge] git not available on PATH");
            ready = false;
        }
    }

    if let Some(makensis) = makensis {
        match probe(Command::new(makensis).arg("-VERSION")) {
            Some(version) => println!("[meshforge] makensis: {}", version),
            None => {
                eprintln!("[meshforge] makensis not runnable: {}", makensis.display());
                ready = false;
            }
        }
    }

    if !ready {
        process::exit(1);
    }
    println!("[meshforge] environment ready");
}

fn run_patch_make(upstream: &Path, out: &Path, keep_workcopy: bool, workdir: Option<PathBuf>) {
    let options = SynthesisOptions {
        keep_workcopy,
        workdir,
    };
    match patch::synthesize(upstream, out, &options) {
        Ok(SynthesisOutcome::NoChanges) => {
            println!("[meshforge] no changes were made; no patches created");
        }
        Ok(SynthesisOutcome::Patches(names)) => {
            for name in &names {
                println!("[meshforge] wrote {}", name);
            }
            println!("[meshforge] {} patch(es) written to {}", names.len(), out.display());
        }
        Err(e) => fail(&PipelineError::Patch(e)),
    }
}

fn run_patch_validate(patches: &Path, upstream: &Path, mode: ValidateMode) {
    let verb = match mode {
        ValidateMode::Check => "checked",
        ValidateMode::Apply => "applied",
    };
    match patch::validate(patches, upstream, mode) {
        Ok(count) => println!("[meshforge] {} {} patch(es)", verb, count),
        Err(e) => fail(&PipelineError::Patch(e)),
    }
}

fn run_generate(config: &Path, out: &Path) {
    match pipeline::generate(config, out) {
        Ok(written) => println!("[meshforge] {} artifact(s) in {}", written.len(), out.display()),
        Err(e) => fail(&e),
    }
}

fn run_package(config: &Path, out: &Path, binary: &Path, options: &PackageOptions) {
    match pipeline::package(config, out, binary, options) {
        Ok(written) => println!("[meshforge] packaged {} file(s) in {}", written.len(), out.display()),
        Err(e) => fail(&e),
    }
}

/// Print the full diagnostic for a fatal error and exit with its code.
fn fail(error: &PipelineError) -> ! {
    if let PipelineError::ValidationFailed(violations) = error {
        for violation in violations {
            eprintln!("[meshforge] {}", violation);
        }
    }
    eprintln!("[meshforge] error: {}", error);
    process::exit(error.exit_code());
}

fn probe(command: &mut Command) -> Option<String> {
    let output = command.output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Some(stdout.lines().next().unwrap_or_default().trim().to_string())
}
