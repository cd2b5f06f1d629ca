//! Typed profile views of the configuration sections
//!
//! Each profile is a derived, read-only view of one section of a resolved
//! configuration, consumed (never mutated) by the artifact generators. Wire
//! names are camelCase to match the configuration documents.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};
use url::Url;

/// Service identity and version metadata derived from the `branding` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrandingProfile {
    pub service_name: Option<String>,
    pub display_name: Option<String>,
    pub company_name: Option<String>,
    pub product_name: Option<String>,
    pub description: Option<String>,
    pub binary_name: Option<String>,
    pub install_root: Option<String>,
    pub log_path: Option<String>,
    pub icon: Option<String>,
    pub version_info: VersionInfo,
}

/// Version metadata nested under `branding.versionInfo`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VersionInfo {
    pub file_version: Option<String>,
    pub product_version: Option<String>,
    pub legal_copyright: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl BrandingProfile {
    /// Service file name, defaulting to the upstream value.
    pub fn service_file(&self) -> &str {
        non_empty(&self.service_name).unwrap_or("Mesh Agent")
    }

    /// Service display name.
    pub fn service_display(&self) -> &str {
        non_empty(&self.display_name).unwrap_or("Mesh Agent background service")
    }

    pub fn company(&self) -> &str {
        non_empty(&self.company_name).unwrap_or("MeshCentral")
    }

    pub fn product(&self) -> &str {
        non_empty(&self.product_name).unwrap_or("MeshCentral Agent")
    }

    pub fn file_description(&self) -> &str {
        non_empty(&self.description).unwrap_or("Mesh Agent")
    }

    pub fn binary(&self) -> &str {
        non_empty(&self.binary_name).unwrap_or("meshagent.exe")
    }

    pub fn copyright(&self) -> &str {
        non_empty(&self.version_info.legal_copyright).unwrap_or("Apache 2.0 License")
    }

    pub fn log_directory(&self) -> &str {
        non_empty(&self.log_path).unwrap_or(r"%ProgramData%\Mesh Agent")
    }

    pub fn install_directory(&self) -> &str {
        non_empty(&self.install_root).unwrap_or("C:/Program Files/Mesh Agent")
    }

    /// File version, falling back to the product version when absent.
    pub fn file_version(&self) -> Option<&str> {
        non_empty(&self.version_info.file_version)
            .or_else(|| non_empty(&self.version_info.product_version))
    }

    /// Product version, falling back to the file version when absent.
    pub fn product_version(&self) -> Option<&str> {
        non_empty(&self.version_info.product_version)
            .or_else(|| non_empty(&self.version_info.file_version))
    }
}

/// Endpoint and client-hello hints derived from the `network` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkProfile {
    pub primary_endpoint: Option<String>,
    pub sni: Option<String>,
    pub host_header: Option<String>,
    pub alpn: Vec<String>,
    pub user_agent: Option<String>,
    /// TLS-fingerprint hint forwarded to the agent, never interpreted here.
    pub ja3: Option<String>,
    pub use_ip_only: bool,
    pub proxy: Option<ProxyConfig>,
}

/// Optional forward-proxy descriptor under `network.proxy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub scheme: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            scheme: "http".to_string(),
        }
    }
}

/// A computed effective endpoint: the primary endpoint with its hostname
/// replaced by a resolved IPv4 literal when `useIpOnly` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveEndpoint {
    pub endpoint: String,
    pub resolved_ip: Option<Ipv4Addr>,
}

impl NetworkProfile {
    /// Compute the effective endpoint using the system resolver.
    ///
    /// The lookup happens at most once, only when `useIpOnly` is set and the
    /// hostname is not already an IPv4 literal.
    pub fn effective_endpoint(&self) -> Option<EffectiveEndpoint> {
        self.effective_endpoint_with(&resolve_ipv4)
    }

    /// Compute the effective endpoint with an injected DNS lookup.
    ///
    /// A failed lookup is swallowed: the result falls back to the unmodified
    /// primary endpoint with `resolved_ip` unset.
    pub fn effective_endpoint_with(
        &self,
        lookup: &dyn Fn(&str) -> Option<Ipv4Addr>,
    ) -> Option<EffectiveEndpoint> {
        let primary = self.primary_endpoint.as_deref()?;

        let unchanged = EffectiveEndpoint {
            endpoint: primary.to_string(),
            resolved_ip: None,
        };

        if !self.use_ip_only {
            return Some(unchanged);
        }

        let mut url = match Url::parse(primary) {
            Ok(url) => url,
            Err(_) => return Some(unchanged),
        };

        let host = match url.host_str() {
            Some(host) => host.to_string(),
            None => return Some(unchanged),
        };

        if host.parse::<Ipv4Addr>().is_ok() {
            return Some(unchanged);
        }

        match lookup(&host) {
            Some(ip) if url.set_host(Some(&ip.to_string())).is_ok() => Some(EffectiveEndpoint {
                endpoint: url.to_string(),
                resolved_ip: Some(ip),
            }),
            _ => Some(unchanged),
        }
    }
}

/// Resolve a hostname to its first IPv4 answer, if any.
pub fn resolve_ipv4(host: &str) -> Option<Ipv4Addr> {
    (host, 443u16)
        .to_socket_addrs()
        .ok()?
        .find_map(|addr| match addr.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
}

/// Four independent boolean-gated persistence mechanism descriptors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistenceProfile {
    pub run_key: bool,
    pub scheduled_task: ScheduledTask,
    pub wmi: WmiSubscription,
    pub watchdog: Watchdog,
}

impl PersistenceProfile {
    pub fn any_enabled(&self) -> bool {
        self.run_key || self.scheduled_task.enabled || self.wmi.enabled || self.watchdog.enabled
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduledTask {
    pub enabled: bool,
    pub name: Option<String>,
    pub trigger: Option<String>,
}

impl ScheduledTask {
    pub fn trigger_or_default(&self) -> &str {
        non_empty(&self.trigger).unwrap_or("ONLOGON")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WmiSubscription {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Watchdog {
    pub enabled: bool,
    pub interval_seconds: Option<u64>,
}

impl Watchdog {
    /// Configured interval, default 300 seconds, clamped to a 60 second floor.
    pub fn interval_seconds_clamped(&self) -> u64 {
        self.interval_seconds.unwrap_or(300).max(60)
    }

    /// Interval in whole minutes, floored, minimum 1.
    pub fn interval_minutes(&self) -> u64 {
        (self.interval_seconds_clamped() / 60).max(1)
    }
}

/// Mesh identity fields from the `provisioning` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvisioningProfile {
    pub mesh_name: Option<String>,
    pub mesh_type: Option<String>,
    pub mesh_id: Option<String>,
    pub server_id: Option<String>,
    pub server_url: Option<String>,
}

impl ProvisioningProfile {
    /// Whether any provisioning field is set; an unset section produces no
    /// bundle.
    pub fn is_configured(&self) -> bool {
        self.mesh_name.is_some()
            || self.mesh_type.is_some()
            || self.mesh_id.is_some()
            || self.server_id.is_some()
            || self.server_url.is_some()
    }
}

/// Optional placeholder-file names from the `artifacts` section, consumed by
/// the install-script generator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArtifactNames {
    pub database_name: Option<String>,
    pub config_file_name: Option<String>,
    pub log_file_name: Option<String>,
}
