//! Tenant IP allowlists
//!
//! Entries are CIDR blocks or exact addresses, stored as a JSON array on
//! the tenant. A malformed entry fails closed outside development and
//! fails open (with a warning) in development; both behaviors yield to the
//! explicit `IP_ALLOWLIST_FAIL_OPEN` override. Parse failures are counted
//! for the metrics endpoint.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use ipnetwork::IpNetwork;

use origin_types::Environment;

/// How to treat unparseable allowlist entries
#[derive(Debug, Clone, Copy)]
pub struct IpCheckConfig {
    pub fail_open: bool,
}

impl IpCheckConfig {
    /// Default behavior follows the environment unless overridden.
    pub fn for_environment(environment: Environment, override_fail_open: Option<bool>) -> Self {
        Self {
            fail_open: override_fail_open.unwrap_or(environment.is_development()),
        }
    }
}

/// Count of allowlist entries that failed to parse, for /metrics
pub static IP_ALLOWLIST_PARSE_ERRORS: AtomicU64 = AtomicU64::new(0);

/// A tenant's parsed allowlist
#[derive(Debug, Clone)]
pub struct IpAllowlist {
    entries: Vec<IpNetwork>,
    had_parse_errors: bool,
}

impl IpAllowlist {
    /// Parse the JSON array stored on the tenant row. Unparseable entries
    /// are dropped and counted; `had_parse_errors` records that the stored
    /// list was not fully honored.
    pub fn parse(value: &serde_json::Value) -> Self {
        let mut entries = Vec::new();
        let mut had_parse_errors = false;

        let items = match value.as_array() {
            Some(items) => items,
            None => {
                IP_ALLOWLIST_PARSE_ERRORS.fetch_add(1, Ordering::Relaxed);
                return Self {
                    entries,
                    had_parse_errors: true,
                };
            }
        };

        for item in items {
            let text = match item.as_str() {
                Some(text) => text,
                None => {
                    had_parse_errors = true;
                    IP_ALLOWLIST_PARSE_ERRORS.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            };
            // Exact IPs parse as /32 (or /128) networks.
            match text.parse::<IpNetwork>() {
                Ok(network) => entries.push(network),
                Err(_) => match text.parse::<IpAddr>() {
                    Ok(addr) => entries.push(IpNetwork::from(addr)),
                    Err(_) => {
                        had_parse_errors = true;
                        IP_ALLOWLIST_PARSE_ERRORS.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(entry = %text, "unparseable IP allowlist entry");
                    }
                },
            }
        }

        Self {
            entries,
            had_parse_errors,
        }
    }

    /// Whether a client IP is admitted under this allowlist.
    pub fn permits(&self, client_ip: IpAddr, config: IpCheckConfig) -> bool {
        if self.entries.iter().any(|network| network.contains(client_ip)) {
            return true;
        }
        // Nothing matched. If entries were dropped during parsing the list
        // may have been truncated, so the failure mode decides.
        if self.had_parse_errors {
            if config.fail_open {
                tracing::warn!(client_ip = %client_ip, "allowlist unparseable, failing open");
                return true;
            }
            return false;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_cidr_and_exact_entries() {
        let list = IpAllowlist::parse(&json!(["10.0.0.0/8", "192.168.1.5"]));
        let closed = IpCheckConfig { fail_open: false };
        assert!(list.permits(ip("10.1.2.3"), closed));
        assert!(list.permits(ip("192.168.1.5"), closed));
        assert!(!list.permits(ip("192.168.1.6"), closed));
        assert!(!list.permits(ip("8.8.8.8"), closed));
    }

    #[test]
    fn test_corrupt_list_fails_closed_in_production() {
        let list = IpAllowlist::parse(&json!(["not-an-ip"]));
        let config = IpCheckConfig::for_environment(Environment::Production, None);
        assert!(!list.permits(ip("10.0.0.1"), config));
    }

    #[test]
    fn test_corrupt_list_fails_open_in_development() {
        let list = IpAllowlist::parse(&json!(["not-an-ip"]));
        let config = IpCheckConfig::for_environment(Environment::Development, None);
        assert!(list.permits(ip("10.0.0.1"), config));
    }

    #[test]
    fn test_explicit_override_beats_environment() {
        let list = IpAllowlist::parse(&json!(["not-an-ip"]));
        let config = IpCheckConfig::for_environment(Environment::Production, Some(true));
        assert!(list.permits(ip("10.0.0.1"), config));
    }

    #[test]
    fn test_valid_entries_still_match_despite_errors() {
        let list = IpAllowlist::parse(&json!(["garbage", "10.0.0.0/24"]));
        let closed = IpCheckConfig { fail_open: false };
        assert!(list.permits(ip("10.0.0.9"), closed));
    }

    #[test]
    fn test_ipv6_entries() {
        let list = IpAllowlist::parse(&json!(["2001:db8::/32"]));
        let closed = IpCheckConfig { fail_open: false };
        assert!(list.permits(ip("2001:db8::1"), closed));
        assert!(!list.permits(ip("2001:db9::1"), closed));
    }
}
