//! Compliance validation
//!
//! Evaluates a flattened configuration against a fixed rule set and returns
//! every violation found. Evaluation is stateless, deterministic and
//! order-independent; violations are aggregated, never fail-fast, and the
//! caller decides whether any of them is fatal. Field absence never produces
//! a violation.
//!
//! The term and domain sets are fixed, small, case-insensitive substring
//! matches. That is faithful to the source behavior and a known source of
//! false positives (a legitimate name containing a blocked substring trips
//! the rule).

use crate::config::FlatConfig;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::net::Ipv4Addr;
use url::Url;

/// Reserved OS/vendor process terms that must not appear in branding
/// identity fields.
pub const RESERVED_TERMS: &[&str] = &[
    "microsoft",
    "defender",
    "svchost",
    "lsass",
    "csrss",
    "winlogon",
    "smss",
    "wininit",
    "trustedinstaller",
];

/// Vendor domains that must not appear in the endpoint host, SNI or host
/// header.
pub const VENDOR_DOMAINS: &[&str] = &[
    "meshcentral.com",
    "microsoft.com",
    "windows.com",
    "windowsupdate.com",
];

/// Terms that make a user agent impersonate vendor tooling.
pub const IMPERSONATION_TERMS: &[&str] = &["microsoft", "windows-update", "cryptoapi", "defender"];

/// Required endpoint scheme.
pub const REQUIRED_SCHEME: &str = "wss";

/// Branding identity fields checked by the reserved-term rule.
const BRANDING_IDENTITY_FIELDS: &[&str] = &[
    "companyName",
    "serviceName",
    "displayName",
    "productName",
    "description",
    "binaryName",
];

/// The rule a violation was produced by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    ReservedTerm,
    Transport,
    IpLiteral,
    VendorDomain,
    UserAgent,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::ReservedTerm => "reserved-term",
            RuleKind::Transport => "transport",
            RuleKind::IpLiteral => "ip-literal",
            RuleKind::VendorDomain => "vendor-domain",
            RuleKind::UserAgent => "user-agent",
        }
    }
}

/// A single compliance violation.
#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    pub rule: RuleKind,
    pub field: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.rule.as_str(), self.field, self.message)
    }
}

/// Evaluate the full rule set against a flattened configuration.
pub fn validate(config: &FlatConfig) -> Vec<Violation> {
    let mut violations = Vec::new();

    check_branding(config.section("branding"), &mut violations);
    check_network(config.section("network"), &mut violations);

    violations
}

fn check_branding(branding: Option<&Value>, violations: &mut Vec<Violation>) {
    let Some(branding) = branding else {
        return;
    };

    for field in BRANDING_IDENTITY_FIELDS {
        let Some(value) = branding.get(*field).and_then(Value::as_str) else {
            continue;
        };
        if let Some(term) = contains_term(value, RESERVED_TERMS) {
            violations.push(Violation {
                rule: RuleKind::ReservedTerm,
                field: format!("branding.{}", field),
                message: format!("value '{}' contains reserved term '{}'", value, term),
            });
        }
    }
}

fn check_network(network: Option<&Value>, violations: &mut Vec<Violation>) {
    let Some(network) = network else {
        return;
    };

    let use_ip_only = network
        .get("useIpOnly")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if let Some(endpoint) = network.get("primaryEndpoint").and_then(Value::as_str) {
        check_endpoint(endpoint, use_ip_only, violations);
    }

    for field in ["sni", "hostHeader"] {
        let Some(value) = network.get(field).and_then(Value::as_str) else {
            continue;
        };
        if let Some(domain) = contains_term(value, VENDOR_DOMAINS) {
            violations.push(Violation {
                rule: RuleKind::VendorDomain,
                field: format!("network.{}", field),
                message: format!("value '{}' contains vendor domain '{}'", value, domain),
            });
        }
    }

    if let Some(user_agent) = network.get("userAgent").and_then(Value::as_str) {
        if let Some(term) = contains_term(user_agent, IMPERSONATION_TERMS) {
            violations.push(Violation {
                rule: RuleKind::UserAgent,
                field: "network.userAgent".to_string(),
                message: format!(
                    "user agent '{}' contains impersonation term '{}'",
                    user_agent, term
                ),
            });
        }
    }
}

fn check_endpoint(endpoint: &str, use_ip_only: bool, violations: &mut Vec<Violation>) {
    let scheme = endpoint.split("://").next().unwrap_or("");
    if !scheme.eq_ignore_ascii_case(REQUIRED_SCHEME) {
        violations.push(Violation {
            rule: RuleKind::Transport,
            field: "network.primaryEndpoint".to_string(),
            message: format!(
                "endpoint '{}' must use the {} scheme",
                endpoint, REQUIRED_SCHEME
            ),
        });
    }

    let host = Url::parse(endpoint)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string));

    if use_ip_only {
        let is_ipv4 = host
            .as_deref()
            .map(|h| h.parse::<Ipv4Addr>().is_ok())
            .unwrap_or(false);
        if !is_ipv4 {
            violations.push(Violation {
                rule: RuleKind::IpLiteral,
                field: "network.primaryEndpoint".to_string(),
                message: format!(
                    "useIpOnly is set but endpoint host '{}' is not an IPv4 literal",
                    host.as_deref().unwrap_or("")
                ),
            });
        }
    }

    if let Some(host) = host.as_deref() {
        if let Some(domain) = contains_term(host, VENDOR_DOMAINS) {
            violations.push(Violation {
                rule: RuleKind::VendorDomain,
                field: "network.primaryEndpoint".to_string(),
                message: format!("endpoint host '{}' contains vendor domain '{}'", host, domain),
            });
        }
    }
}

fn contains_term(value: &str, terms: &[&'static str]) -> Option<&'static str> {
    let lowered = value.to_lowercase();
    terms.iter().copied().find(|term| lowered.contains(term))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use std::path::PathBuf;

    fn flat(document: serde_json::Value) -> FlatConfig {
        FlatConfig {
            origin: PathBuf::from("test.json"),
            document,
            resolved_at: Utc::now(),
            sources: Vec::new(),
        }
    }

    #[test]
    fn test_clean_config_has_no_violations() {
        let config = flat(json!({
            "branding": {"companyName": "Acme Remote", "serviceName": "Acme Agent"},
            "network": {
                "primaryEndpoint": "wss://relay.acme.example/agent.ashx",
                "sni": "relay.acme.example",
                "userAgent": "AcmeAgent/2.1"
            }
        }));
        assert!(validate(&config).is_empty());
    }

    #[test]
    fn test_empty_config_is_clean() {
        assert!(validate(&flat(json!({}))).is_empty());
    }

    #[test]
    fn test_reserved_term_in_company_name() {
        let config = flat(json!({
            "branding": {"companyName": "Microsoft Corp"}
        }));
        let violations = validate(&config);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, RuleKind::ReservedTerm);
        assert_eq!(violations[0].field, "branding.companyName");
    }

    #[test]
    fn test_reserved_term_case_insensitive() {
        let config = flat(json!({
            "branding": {"binaryName": "SvcHost-helper.exe"}
        }));
        let violations = validate(&config);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "branding.binaryName");
    }

    #[test]
    fn test_transport_rule() {
        let config = flat(json!({
            "network": {"primaryEndpoint": "https://relay.acme.example/"}
        }));
        let violations = validate(&config);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, RuleKind::Transport);
    }

    #[test]
    fn test_transport_scheme_case_insensitive() {
        let config = flat(json!({
            "network": {"primaryEndpoint": "WSS://relay.acme.example/"}
        }));
        assert!(validate(&config).is_empty());
    }

    #[test]
    fn test_ip_literal_rule_passes_for_dotted_quad() {
        let config = flat(json!({
            "network": {"primaryEndpoint": "wss://203.0.113.5/", "useIpOnly": true}
        }));
        let violations = validate(&config);
        assert!(!violations.iter().any(|v| v.rule == RuleKind::IpLiteral));
    }

    #[test]
    fn test_ip_literal_rule_fails_for_hostname() {
        let config = flat(json!({
            "network": {"primaryEndpoint": "wss://example.com/", "useIpOnly": true}
        }));
        let violations = validate(&config);
        assert!(violations.iter().any(|v| v.rule == RuleKind::IpLiteral));
    }

    #[test]
    fn test_ip_literal_not_checked_without_flag() {
        let config = flat(json!({
            "network": {"primaryEndpoint": "wss://example.com/"}
        }));
        assert!(validate(&config).is_empty());
    }

    #[test]
    fn test_vendor_domain_in_endpoint() {
        let config = flat(json!({
            "network": {"primaryEndpoint": "wss://relay.meshcentral.com/agent.ashx"}
        }));
        let violations = validate(&config);
        assert!(violations
            .iter()
            .any(|v| v.rule == RuleKind::VendorDomain
                && v.field == "network.primaryEndpoint"));
    }

    #[test]
    fn test_vendor_domain_in_headers() {
        let config = flat(json!({
            "network": {
                "primaryEndpoint": "wss://relay.acme.example/",
                "sni": "login.microsoft.com",
                "hostHeader": "cdn.windowsupdate.com"
            }
        }));
        let violations = validate(&config);
        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert!(fields.contains(&"network.sni"));
        assert!(fields.contains(&"network.hostHeader"));
    }

    #[test]
    fn test_user_agent_impersonation() {
        let config = flat(json!({
            "network": {
                "primaryEndpoint": "wss://relay.acme.example/",
                "userAgent": "Windows-Update-Agent/10.0"
            }
        }));
        let violations = validate(&config);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, RuleKind::UserAgent);
    }

    #[test]
    fn test_violations_aggregate() {
        let config = flat(json!({
            "branding": {"companyName": "Microsoft Corp", "serviceName": "Defender Shield"},
            "network": {
                "primaryEndpoint": "http://example.com/",
                "useIpOnly": true,
                "userAgent": "Microsoft-CryptoAPI/10.0"
            }
        }));
        let violations = validate(&config);
        // two reserved-term + transport + ip-literal + user-agent
        assert_eq!(violations.len(), 5);
    }

    #[test]
    fn test_validate_is_deterministic() {
        let doc = json!({
            "branding": {"companyName": "Microsoft Corp"},
            "network": {"primaryEndpoint": "http://a.example/"}
        });
        let first = validate(&flat(doc.clone()));
        let second = validate(&flat(doc));
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.field, b.field);
            assert_eq!(a.rule, b.rule);
        }
    }
}
