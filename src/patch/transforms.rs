//! Branding transforms for upstream source files
//!
//! Each transform is a pure function from source text to (new text, changed)
//! and is a fixed point on its own output: re-running a transform over an
//! already-branded file changes nothing. Insertions are guarded by anchor
//! presence, replacements target exact literals or whole RC value lines.

/// One (file, transform) pair, applied in order during synthesis.
pub struct PatchRule {
    /// Path of the target file, relative to the upstream root.
    pub path: &'static str,
    /// Commit message used when the transform changed the file.
    pub message: &'static str,
    pub transform: fn(&str) -> (String, bool),
}

/// The fixed, ordered transform list.
pub const RULES: &[PatchRule] = &[
    PatchRule {
        path: "meshcore/agentcore.c",
        message: "agentcore: include branding header and macro defaults",
        transform: transform_agentcore,
    },
    PatchRule {
        path: "meshservice/ServiceMain.c",
        message: "meshservice: include branding header and use macros",
        transform: transform_servicemain,
    },
    PatchRule {
        path: "meshservice/MeshService.rc",
        message: "rc: use branding macros for FileDescription/ProductName",
        transform: transform_rc,
    },
    PatchRule {
        path: "meshservice/MeshService64.rc",
        message: "rc64: use branding macros for FileDescription/ProductName",
        transform: transform_rc,
    },
];

const AGENTCORE_ANCHOR: &str = "#include \"agentcore.h\"";
const AGENTCORE_INCLUDE: &str = "#if defined(_MSC_VER)\n\
#if defined(__has_include)\n\
#  if __has_include(\"generated/meshagent_branding.h\")\n\
#    include \"generated/meshagent_branding.h\"\n\
#  endif\n\
#endif\n\
#endif\n\n\
#ifndef MESH_AGENT_SERVICE_FILE_A\n\
#define MESH_AGENT_SERVICE_FILE_A \"Mesh Agent\"\n\
#endif\n";

fn transform_agentcore(text: &str) -> (String, bool) {
    let mut out = insert_after(text, AGENTCORE_ANCHOR, AGENTCORE_INCLUDE);
    out = out.replace(
        "agentHost->meshServiceName = \"Mesh Agent\";",
        "agentHost->meshServiceName = MESH_AGENT_SERVICE_FILE_A;",
    );
    let changed = out != text;
    (out, changed)
}

const SERVICEMAIN_ANCHOR: &str = "#include <WtsApi32.h>";
const SERVICEMAIN_INCLUDE: &str = "#if defined(_MSC_VER)\n\
#if defined(__has_include)\n\
#  if __has_include(\"../meshcore/generated/meshagent_branding.h\")\n\
#    include \"../meshcore/generated/meshagent_branding.h\"\n\
#  endif\n\
#endif\n\
#endif\n\n\
#ifndef MESH_AGENT_SERVICE_FILE\n\
#define MESH_AGENT_SERVICE_FILE TEXT(\"Mesh Agent\")\n\
#endif\n\
#ifndef MESH_AGENT_SERVICE_NAME\n\
#define MESH_AGENT_SERVICE_NAME TEXT(\"Mesh Agent background service\")\n\
#endif\n";

fn transform_servicemain(text: &str) -> (String, bool) {
    let mut out = insert_after(text, SERVICEMAIN_ANCHOR, SERVICEMAIN_INCLUDE);
    out = out.replace(
        "TCHAR* serviceFile = TEXT(\"Mesh Agent\");",
        "TCHAR* serviceFile = MESH_AGENT_SERVICE_FILE;",
    );
    out = out.replace(
        "TCHAR* serviceName = TEXT(\"Mesh Agent background service\");",
        "TCHAR* serviceName = MESH_AGENT_SERVICE_NAME;",
    );
    out = out.replace(
        "\"meshServiceName\", \"Mesh Agent\"",
        "\"meshServiceName\", MESH_AGENT_SERVICE_FILE_A",
    );
    let changed = out != text;
    (out, changed)
}

const RC_ANCHOR: &str = "#include \"resource.h\"";
const RC_INCLUDE: &str = "#if defined(_MSC_VER)\n\
#include \"../meshcore/generated/meshagent_branding.h\"\n\
#endif\n";

fn transform_rc(text: &str) -> (String, bool) {
    let mut out = insert_after(text, RC_ANCHOR, RC_INCLUDE);
    out = set_rc_value(&out, "FileDescription", "MESH_AGENT_FILE_DESCRIPTION");
    out = set_rc_value(&out, "ProductName", "MESH_AGENT_PRODUCT_NAME");
    let changed = out != text;
    (out, changed)
}

/// Insert `block` on the line after the first occurrence of `anchor`, unless
/// the block is already present or the anchor is missing.
fn insert_after(text: &str, anchor: &str, block: &str) -> String {
    if !text.contains(anchor) || text.contains(block) {
        return text.to_string();
    }
    text.replacen(anchor, &format!("{anchor}\n{block}"), 1)
}

/// Rewrite every `VALUE "<name>", ...` line of a version-info resource to
/// reference `macro_name` instead of its literal, preserving the line's
/// indentation. Lines already carrying the macro are left untouched, so the
/// rewrite is a fixed point.
fn set_rc_value(text: &str, name: &str, macro_name: &str) -> String {
    let needle = format!("VALUE \"{name}\",");
    let trailing_newline = text.ends_with('\n');

    let lines: Vec<String> = text
        .lines()
        .map(|line| {
            if line.contains(&needle) && !line.contains(macro_name) {
                let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
                format!("{indent}{needle} {macro_name}")
            } else {
                line.to_string()
            }
        })
        .collect();

    let mut out = lines.join("\n");
    if trailing_newline {
        out.push('\n');
    }
    out
}
