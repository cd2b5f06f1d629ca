//! Install script generation
//!
//! Emits `install.ps1`, the single administrative script that stages the
//! binary and provisioning bundle, recreates the Windows service, creates the
//! optional placeholder files and mirrors the branding into the registry.
//! The `icacls` grants fall back to a programmatic ACL edit when the primary
//! method fails; a failure of the fallback itself is swallowed.

use super::ps::{quote, PsParam, PsScript, PsStatement};
use super::provisioning::{FILE_NAME as DIRECT_BUNDLE, PROXY_FILE_NAME as PROXY_BUNDLE};
use super::Artifact;
use crate::config::{ArtifactNames, BrandingProfile};

pub const FILE_NAME: &str = "install.ps1";

const SYSTEM_PRINCIPAL: &str = r"NT AUTHORITY\SYSTEM";
const ADMINS_PRINCIPAL: &str = r"BUILTIN\Administrators";

pub fn generate(branding: &BrandingProfile, artifacts: &ArtifactNames) -> Artifact {
    let service_name = branding.service_file();
    let display_name = branding.service_display();

    let mut script = PsScript::new()
        .with_header("Requires administrative privileges.")
        .param(PsParam::mandatory("SourceDir"))
        .param(PsParam::string("InstallRoot", Some(branding.install_directory())))
        .param(PsParam::string("BinaryName", Some(branding.binary())))
        .param(PsParam::switch("UseProxy"));

    script.push(PsStatement::Function {
        name: "Assert-Admin".to_string(),
        body: vec![
            PsStatement::Assign {
                variable: "id".to_string(),
                expression: "[Security.Principal.WindowsIdentity]::GetCurrent()".to_string(),
            },
            PsStatement::Assign {
                variable: "p".to_string(),
                expression: "New-Object Security.Principal.WindowsPrincipal($id)".to_string(),
            },
            PsStatement::If {
                condition: "-not $p.IsInRole([Security.Principal.WindowsBuiltInRole]::Administrator)".to_string(),
                body: vec![PsStatement::Command(
                    "throw \"This script requires administrative privileges.\"".to_string(),
                )],
            },
        ],
    });
    script.push(PsStatement::Blank);
    script.push(PsStatement::Command("Assert-Admin".to_string()));
    script.push(PsStatement::Blank);

    // Path normalization and directory creation
    script.push(PsStatement::Assign {
        variable: "InstallRoot".to_string(),
        expression: "$InstallRoot -replace '/', '\\'".to_string(),
    });
    script.push(PsStatement::Assign {
        variable: "SourceDir".to_string(),
        expression: "(Resolve-Path $SourceDir)".to_string(),
    });
    script.push(PsStatement::Assign {
        variable: "LogPath".to_string(),
        expression: format!("{} -replace '/', '\\'", quote(branding.log_directory())),
    });
    script.push(PsStatement::Blank);
    script.push(PsStatement::Command(
        "New-Item -ItemType Directory -Path $InstallRoot -Force | Out-Null".to_string(),
    ));
    script.push(PsStatement::If {
        condition: "-not (Test-Path $LogPath)".to_string(),
        body: vec![PsStatement::Command(
            "New-Item -ItemType Directory -Path $LogPath -Force | Out-Null".to_string(),
        )],
    });

    script.push(PsStatement::Blank);
    script.extend(acl_grant_block());

    script.push(PsStatement::Blank);
    script.extend(staging_block());

    script.push(PsStatement::Blank);
    script.extend(service_block(service_name, display_name, branding.file_description()));

    let placeholders = placeholder_block(artifacts);
    if !placeholders.is_empty() {
        script.push(PsStatement::Blank);
        script.push(PsStatement::Comment(
            "Optional artifacts: create database, config and log files".to_string(),
        ));
        script.extend(placeholders);
    }

    script.push(PsStatement::Blank);
    script.extend(registry_block(branding, artifacts, service_name, display_name));

    script.push(PsStatement::Blank);
    script.push(PsStatement::Command(
        "Write-Host \"[install] Completed\"".to_string(),
    ));

    Artifact::new(FILE_NAME, script.render())
}

/// Full-control grants for the system and administrators principals, with a
/// programmatic fallback when icacls fails.
fn acl_grant_block() -> Vec<PsStatement> {
    let grant_dir = |dir: &str| PsStatement::Try {
        body: vec![
            PsStatement::Command(format!(
                "icacls {dir} /grant '{}:(OI)(CI)(F)' /T /C | Out-Null",
                SYSTEM_PRINCIPAL
            )),
            PsStatement::Command(format!(
                "icacls {dir} /grant '{}:(OI)(CI)(F)' /T /C | Out-Null",
                ADMINS_PRINCIPAL
            )),
        ],
        catch: vec![PsStatement::Try {
            body: vec![
                PsStatement::Assign {
                    variable: "acl".to_string(),
                    expression: format!("Get-Acl {dir}"),
                },
                PsStatement::Assign {
                    variable: "systemRule".to_string(),
                    expression: format!(
                        "New-Object System.Security.AccessControl.FileSystemAccessRule('{}', 'FullControl', 'ContainerInherit,ObjectInherit', 'None', 'Allow')",
                        SYSTEM_PRINCIPAL
                    ),
                },
                PsStatement::Assign {
                    variable: "adminRule".to_string(),
                    expression: format!(
                        "New-Object System.Security.AccessControl.FileSystemAccessRule('{}', 'FullControl', 'ContainerInherit,ObjectInherit', 'None', 'Allow')",
                        ADMINS_PRINCIPAL
                    ),
                },
                PsStatement::Command("$acl.AddAccessRule($systemRule)".to_string()),
                PsStatement::Command("$acl.AddAccessRule($adminRule)".to_string()),
                PsStatement::Command(format!("Set-Acl -Path {dir} -AclObject $acl")),
            ],
            catch: Vec::new(),
        }],
    };

    vec![
        PsStatement::Comment(
            "ACL: grant SYSTEM and Administrators full control (recursive) on install and log directories".to_string(),
        ),
        grant_dir("$InstallRoot"),
        grant_dir("$LogPath"),
    ]
}

/// Stage the binary and the bundle variant selected by the -UseProxy switch.
fn staging_block() -> Vec<PsStatement> {
    vec![
        PsStatement::Assign {
            variable: "BinaryPath".to_string(),
            expression: "Join-Path $InstallRoot $BinaryName".to_string(),
        },
        PsStatement::Command(
            "Copy-Item -Path (Join-Path $SourceDir $BinaryName) -Destination $BinaryPath -Force"
                .to_string(),
        ),
        PsStatement::Assign {
            variable: "directMsh".to_string(),
            expression: format!("Join-Path $SourceDir '{}'", DIRECT_BUNDLE),
        },
        PsStatement::Assign {
            variable: "proxyMsh".to_string(),
            expression: format!("Join-Path $SourceDir '{}'", PROXY_BUNDLE),
        },
        PsStatement::IfElse {
            condition: "$UseProxy.IsPresent -and (Test-Path $proxyMsh)".to_string(),
            then_body: vec![PsStatement::Command(format!(
                "Copy-Item -Path $proxyMsh -Destination (Join-Path $InstallRoot '{}') -Force",
                DIRECT_BUNDLE
            ))],
            else_body: vec![PsStatement::If {
                condition: "Test-Path $directMsh".to_string(),
                body: vec![PsStatement::Command(format!(
                    "Copy-Item -Path $directMsh -Destination (Join-Path $InstallRoot '{}') -Force",
                    DIRECT_BUNDLE
                ))],
            }],
        },
    ]
}

/// Stop, delete, recreate and start the Windows service.
fn service_block(service_name: &str, display_name: &str, description: &str) -> Vec<PsStatement> {
    vec![
        PsStatement::Command("Write-Host \"[install] Registering Windows service\"".to_string()),
        PsStatement::Try {
            body: vec![PsStatement::Command(format!(
                "sc.exe stop {} | Out-Null",
                quote(service_name)
            ))],
            catch: Vec::new(),
        },
        PsStatement::Try {
            body: vec![PsStatement::Command(format!(
                "sc.exe delete {} | Out-Null",
                quote(service_name)
            ))],
            catch: Vec::new(),
        },
        PsStatement::Command(format!(
            "sc.exe create {} binPath= ('\"' + $BinaryPath + '\" --service') DisplayName= {} start= auto | Out-Null",
            quote(service_name),
            quote(display_name)
        )),
        PsStatement::Command(format!(
            "sc.exe description {} {} | Out-Null",
            quote(service_name),
            quote(description)
        )),
        PsStatement::Command(format!(
            "sc.exe start {} | Out-Null",
            quote(service_name)
        )),
    ]
}

/// Placeholder database/config/log files, gated on the configured names.
fn placeholder_block(artifacts: &ArtifactNames) -> Vec<PsStatement> {
    let mut statements = Vec::new();

    if let Some(db_name) = artifacts.database_name.as_deref().filter(|s| !s.is_empty()) {
        statements.push(PsStatement::Assign {
            variable: "dbPath".to_string(),
            expression: format!("Join-Path $InstallRoot '{}'", db_name),
        });
        statements.push(PsStatement::If {
            condition: "-not (Test-Path $dbPath)".to_string(),
            body: vec![PsStatement::Command(
                "New-Item -Path $dbPath -ItemType File -Force | Out-Null".to_string(),
            )],
        });
    }

    if let Some(cfg_name) = artifacts.config_file_name.as_deref().filter(|s| !s.is_empty()) {
        statements.push(PsStatement::Assign {
            variable: "cfgPath".to_string(),
            expression: format!("Join-Path $InstallRoot '{}'", cfg_name),
        });
        statements.push(PsStatement::If {
            condition: "-not (Test-Path $cfgPath)".to_string(),
            body: vec![PsStatement::Command(
                "New-Item -Path $cfgPath -ItemType File -Force | Out-Null".to_string(),
            )],
        });
    }

    if let Some(log_name) = artifacts.log_file_name.as_deref().filter(|s| !s.is_empty()) {
        statements.push(PsStatement::Assign {
            variable: "lfPath".to_string(),
            expression: format!("Join-Path $LogPath '{}'", log_name),
        });
        statements.push(PsStatement::If {
            condition: "-not (Test-Path $lfPath)".to_string(),
            body: vec![PsStatement::Command(
                "New-Item -Path $lfPath -ItemType File -Force | Out-Null".to_string(),
            )],
        });
        statements.push(PsStatement::Try {
            body: vec![
                PsStatement::Command(format!(
                    "icacls $lfPath /grant '{}:(F)' /C | Out-Null",
                    SYSTEM_PRINCIPAL
                )),
                PsStatement::Command(format!(
                    "icacls $lfPath /grant '{}:(F)' /C | Out-Null",
                    ADMINS_PRINCIPAL
                )),
            ],
            catch: Vec::new(),
        });
    }

    statements
}

/// Service-parameter and application registry keys mirroring the branding,
/// stamped with the install timestamp.
fn registry_block(
    branding: &BrandingProfile,
    artifacts: &ArtifactNames,
    service_name: &str,
    display_name: &str,
) -> Vec<PsStatement> {
    let set_string = |key: &str, name: &str, value: &str| {
        PsStatement::Command(format!(
            "New-ItemProperty -Path {} -Name {} -Value {} -PropertyType String -Force | Out-Null",
            key, name, value
        ))
    };

    let mut statements = vec![
        PsStatement::Comment("Registry: service parameters".to_string()),
        PsStatement::Assign {
            variable: "svcKey".to_string(),
            expression: quote(&format!(
                r"HKLM:SYSTEM\CurrentControlSet\Services\{}",
                service_name
            )),
        },
        PsStatement::Assign {
            variable: "paramsKey".to_string(),
            expression: "Join-Path $svcKey 'Parameters'".to_string(),
        },
        PsStatement::Command("New-Item -Path $paramsKey -Force | Out-Null".to_string()),
        set_string("$paramsKey", "InstallRoot", "$InstallRoot"),
        set_string("$paramsKey", "BinaryName", "$BinaryName"),
        set_string("$paramsKey", "LogPath", "$LogPath"),
        set_string("$paramsKey", "CompanyName", &quote(branding.company())),
        set_string("$paramsKey", "ProductName", &quote(branding.product())),
    ];

    if let Some(version) = branding.product_version() {
        statements.push(set_string("$paramsKey", "ProductVersion", &quote(version)));
    }

    statements.push(PsStatement::Blank);
    statements.push(PsStatement::Comment("Registry: application key".to_string()));
    statements.push(PsStatement::Assign {
        variable: "appKey".to_string(),
        expression: quote(&format!(
            r"HKLM:Software\{}\{}",
            branding.company(),
            branding.product()
        )),
    });
    statements.push(PsStatement::Command(
        "New-Item -Path $appKey -Force | Out-Null".to_string(),
    ));
    statements.push(set_string("$appKey", "InstallRoot", "$InstallRoot"));
    statements.push(set_string("$appKey", "BinaryName", "$BinaryName"));
    statements.push(set_string("$appKey", "ServiceName", &quote(service_name)));
    statements.push(set_string("$appKey", "DisplayName", &quote(display_name)));
    statements.push(set_string("$appKey", "LogPath", "$LogPath"));

    if let Some(version) = branding.product_version() {
        statements.push(set_string("$appKey", "ProductVersion", &quote(version)));
    }

    statements.push(set_string(
        "$appKey",
        "InstallDate",
        "(Get-Date).ToString('s')",
    ));

    if let Some(db_name) = artifacts.database_name.as_deref().filter(|s| !s.is_empty()) {
        statements.push(set_string(
            "$appKey",
            "DatabasePath",
            &format!("(Join-Path $InstallRoot '{}')", db_name),
        ));
    }
    if let Some(cfg_name) = artifacts.config_file_name.as_deref().filter(|s| !s.is_empty()) {
        statements.push(set_string(
            "$appKey",
            "ConfigPath",
            &format!("(Join-Path $InstallRoot '{}')", cfg_name),
        ));
    }
    if let Some(log_name) = artifacts.log_file_name.as_deref().filter(|s| !s.is_empty()) {
        statements.push(set_string(
            "$appKey",
            "LogFilePath",
            &format!("(Join-Path $LogPath '{}')", log_name),
        ));
    }

    statements
}
