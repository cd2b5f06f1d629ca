//! Provisioning bundle generation
//!
//! Emits the MeshCentral-compatible `.msh` bundle as line-oriented key=value
//! text. When a forward proxy with both host and port is configured, a second
//! "proxied" variant identical to the first plus one `WebProxy=` line is
//! emitted alongside it. An unset provisioning section produces no bundle.

use super::Artifact;
use crate::config::{BrandingProfile, ProvisioningProfile, ProxyConfig};

pub const FILE_NAME: &str = "meshagent.msh";
pub const PROXY_FILE_NAME: &str = "meshagent_proxy.msh";

pub fn generate(
    branding: &BrandingProfile,
    provisioning: &ProvisioningProfile,
    proxy: Option<&ProxyConfig>,
) -> Vec<Artifact> {
    if !provisioning.is_configured() {
        return Vec::new();
    }

    let mut lines = vec![
        format!("MeshName={}", provisioning.mesh_name.as_deref().unwrap_or("")),
        format!("MeshType={}", provisioning.mesh_type.as_deref().unwrap_or("")),
        format!("MeshID={}", provisioning.mesh_id.as_deref().unwrap_or("")),
        format!("ServerID={}", provisioning.server_id.as_deref().unwrap_or("")),
        format!("MeshServer={}", provisioning.server_url.as_deref().unwrap_or("")),
    ];

    if let Some(service) = branding.service_name.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("meshServiceName={}", service));
    }
    if let Some(display) = branding.display_name.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("displayName={}", display));
    }

    let direct = format!("{}\n", lines.join("\n"));
    let mut artifacts = vec![Artifact::new(FILE_NAME, direct.clone())];

    if let Some(proxy) = proxy {
        if let (Some(host), Some(port)) = (proxy.host.as_deref(), proxy.port) {
            let proxied = format!("{}WebProxy={}://{}:{}\n", direct, proxy.scheme, host, port);
            artifacts.push(Artifact::new(PROXY_FILE_NAME, proxied));
        }
    }

    artifacts
}
