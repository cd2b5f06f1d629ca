//! Version-info include generation
//!
//! Emits `meshagent_version.h` with version and copyright defines derived
//! from the branding profile. File and product versions fall back to each
//! other when one is absent; a comma-separated numeric form is derived for
//! resource scripts when a version is available.

use super::Artifact;
use crate::config::BrandingProfile;

pub const FILE_NAME: &str = "meshagent_version.h";

const GUARD: &str = "GENERATED_MESHAGENT_VERSION_H";

pub fn generate(branding: &BrandingProfile) -> Artifact {
    let file_version = branding.file_version();
    let product_version = branding.product_version();

    let mut lines: Vec<String> = vec![
        "/* Generated file - do not edit. */".to_string(),
        format!("#ifndef {}", GUARD),
        format!("#define {}", GUARD),
        String::new(),
        format!("#define MESH_AGENT_FILE_VERSION {}", str_literal(file_version)),
        format!(
            "#define MESH_AGENT_PRODUCT_VERSION {}",
            str_literal(product_version)
        ),
        format!(
            "#define MESH_AGENT_LEGAL_COPYRIGHT \"{}\"",
            escape_c(branding.copyright())
        ),
    ];

    if let Some(version) = file_version {
        lines.push(format!(
            "#define MESH_AGENT_FILE_VERSION_RC {}",
            comma_form(version)
        ));
    }
    if let Some(version) = product_version {
        lines.push(format!(
            "#define MESH_AGENT_PRODUCT_VERSION_RC {}",
            comma_form(version)
        ));
    }

    lines.push(String::new());
    lines.push(format!("#endif /* {} */", GUARD));
    lines.push(String::new());

    Artifact::new(FILE_NAME, lines.join("\n"))
}

fn str_literal(value: Option<&str>) -> String {
    match value {
        None => "NULL".to_string(),
        Some(v) => format!("\"{}\"", escape_c(v)),
    }
}

fn escape_c(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Convert a dotted version into the four-part comma form used by resource
/// scripts, padding with zeros: "2.1.3" -> "2,1,3,0".
fn comma_form(version: &str) -> String {
    let mut parts: Vec<String> = version
        .split('.')
        .take(4)
        .map(|part| {
            part.chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
        })
        .map(|digits| if digits.is_empty() { "0".to_string() } else { digits })
        .collect();
    while parts.len() < 4 {
        parts.push("0".to_string());
    }
    parts.join(",")
}
