//! Network profile document generation
//!
//! Emits `network_profile.json` with the full NetworkProfile plus the
//! computed `effectiveEndpoint`. The single optional DNS lookup happens here;
//! a resolution failure is swallowed and the effective endpoint falls back to
//! the unmodified primary endpoint. This generator never fails the pipeline
//! on a resolution error.

use super::{Artifact, GenerateError};
use crate::config::{resolve_ipv4, NetworkProfile};
use serde::Serialize;
use std::net::Ipv4Addr;

pub const FILE_NAME: &str = "network_profile.json";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NetworkProfileDocument<'a> {
    primary_endpoint: Option<&'a str>,
    sni: Option<&'a str>,
    host_header: Option<&'a str>,
    alpn: &'a [String],
    user_agent: Option<&'a str>,
    ja3: Option<&'a str>,
    use_ip_only: bool,
    effective_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved_ip: Option<String>,
}

/// Generate the document using the system resolver.
pub fn generate(network: &NetworkProfile) -> Result<Artifact, GenerateError> {
    generate_with(network, &resolve_ipv4)
}

/// Generate the document with an injected DNS lookup.
pub fn generate_with(
    network: &NetworkProfile,
    lookup: &dyn Fn(&str) -> Option<Ipv4Addr>,
) -> Result<Artifact, GenerateError> {
    let effective = network.effective_endpoint_with(lookup);

    let document = NetworkProfileDocument {
        primary_endpoint: network.primary_endpoint.as_deref(),
        sni: network.sni.as_deref(),
        host_header: network.host_header.as_deref(),
        alpn: &network.alpn,
        user_agent: network.user_agent.as_deref(),
        ja3: network.ja3.as_deref(),
        use_ip_only: network.use_ip_only,
        effective_endpoint: effective.as_ref().map(|e| e.endpoint.clone()),
        resolved_ip: effective
            .as_ref()
            .and_then(|e| e.resolved_ip)
            .map(|ip| ip.to_string()),
    };

    let json = serde_json::to_string_pretty(&document)?;
    Ok(Artifact::new(FILE_NAME, json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn parse(artifact: &Artifact) -> Value {
        serde_json::from_str(&artifact.contents).unwrap()
    }

    #[test]
    fn test_document_fields() {
        let network = NetworkProfile {
            primary_endpoint: Some("wss://relay.acme.example/agent.ashx".to_string()),
            sni: Some("relay.acme.example".to_string()),
            alpn: vec!["http/1.1".to_string()],
            user_agent: Some("AcmeAgent/2.1".to_string()),
            ..Default::default()
        };

        let artifact = generate_with(&network, &|_| None).unwrap();
        assert_eq!(artifact.file_name, FILE_NAME);

        let doc = parse(&artifact);
        assert_eq!(doc["primaryEndpoint"], "wss://relay.acme.example/agent.ashx");
        assert_eq!(doc["sni"], "relay.acme.example");
        assert_eq!(doc["alpn"][0], "http/1.1");
        assert_eq!(doc["useIpOnly"], false);
        assert_eq!(doc["effectiveEndpoint"], "wss://relay.acme.example/agent.ashx");
        assert!(doc.get("resolvedIp").is_none());
    }

    #[test]
    fn test_resolution_success_rewrites_endpoint() {
        let network = NetworkProfile {
            primary_endpoint: Some("wss://relay.acme.example/agent.ashx".to_string()),
            use_ip_only: true,
            ..Default::default()
        };

        let artifact =
            generate_with(&network, &|_| Some(Ipv4Addr::new(203, 0, 113, 40))).unwrap();
        let doc = parse(&artifact);
        assert_eq!(doc["effectiveEndpoint"], "wss://203.0.113.40/agent.ashx");
        assert_eq!(doc["resolvedIp"], "203.0.113.40");
    }

    #[test]
    fn test_resolution_failure_is_swallowed() {
        let network = NetworkProfile {
            primary_endpoint: Some("wss://relay.acme.example/agent.ashx".to_string()),
            use_ip_only: true,
            ..Default::default()
        };

        let artifact = generate_with(&network, &|_| None).unwrap();
        let doc = parse(&artifact);
        assert_eq!(doc["effectiveEndpoint"], "wss://relay.acme.example/agent.ashx");
        assert!(doc.get("resolvedIp").is_none());
    }

    #[test]
    fn test_empty_profile_still_generates() {
        let artifact = generate_with(&NetworkProfile::default(), &|_| None).unwrap();
        let doc = parse(&artifact);
        assert_eq!(doc["primaryEndpoint"], Value::Null);
        assert_eq!(doc["effectiveEndpoint"], Value::Null);
    }
}
