//! SSRF guard: URL validation plus DNS resolve-and-validate.
//!
//! Every URL the gateway dereferences passes through here: initial targets,
//! every redirect hop, browser sub-requests, and webhook callback hosts.

mod dns;
mod ranges;

pub use dns::DnsCache;
pub use ranges::{is_private_ip, is_private_ipv4, is_private_ipv6};

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tidemark_types::{ConvertError, Result};
use tracing::debug;
use url::{Host, Url};

/// Hostnames that reach cloud metadata services regardless of DNS.
const METADATA_HOSTS: &[&str] = &[
    "metadata.google.internal",
    "metadata.goog",
    "instance-data.ec2.internal",
];

/// Validates URLs against the SSRF policy. Syntactic checks are pure; the
/// full check also resolves non-literal hosts through a 5 s DNS cache.
#[derive(Clone)]
pub struct UrlGuard {
    dns: Arc<DnsCache>,
}

impl Default for UrlGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlGuard {
    pub fn new() -> Self {
        Self {
            dns: Arc::new(DnsCache::new()),
        }
    }

    /// Pure validation: scheme, host shape, literal IPs, metadata names.
    /// Does not touch the network.
    pub fn check_syntactic(url: &Url) -> Result<()> {
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(blocked(format!("unsupported scheme {other}"))),
        }

        let host = match url.host() {
            Some(h) => h,
            None => return Err(blocked("empty host")),
        };

        match host {
            Host::Ipv4(addr) => {
                if ranges::is_private_ipv4(addr) {
                    return Err(blocked("private address"));
                }
            }
            // Bracketed IPv6 literals are rejected outright.
            Host::Ipv6(_) => return Err(blocked("IPv6 literal host")),
            Host::Domain(name) => check_domain(name)?,
        }

        Ok(())
    }

    /// Full check: syntactic rules plus DNS resolution for non-literal
    /// hosts. Resolution failures are NOT guard failures; unresolvable
    /// hosts fall through so the fetcher can fail naturally.
    pub async fn check(&self, url: &Url) -> Result<()> {
        Self::check_syntactic(url)?;

        if let Some(Host::Domain(name)) = url.host() {
            match self.dns.resolve(name).await {
                Some(addrs) => {
                    if let Some(private) = addrs.iter().find(|ip| ranges::is_private_ip(**ip)) {
                        debug!(host = name, ip = %private, "blocked by DNS resolution");
                        return Err(blocked("resolves to private address"));
                    }
                }
                None => {
                    debug!(host = name, "DNS resolution failed, deferring to fetcher");
                }
            }
        }

        Ok(())
    }

    /// Variant used on redirect hops; the reason names the redirect so
    /// operators can tell an initial block from a hop block.
    pub async fn check_redirect(&self, url: &Url) -> Result<()> {
        self.check(url).await.map_err(|err| match err {
            ConvertError::BlockedUrl(_) => {
                ConvertError::BlockedUrl("redirect to private address".to_string())
            }
            other => other,
        })
    }
}

fn blocked(reason: impl Into<String>) -> ConvertError {
    ConvertError::BlockedUrl(reason.into())
}

fn check_domain(name: &str) -> Result<()> {
    let name = name.trim_end_matches('.').to_ascii_lowercase();

    if name.is_empty() {
        return Err(blocked("empty host"));
    }
    if name == "localhost" || name.ends_with(".localhost") {
        return Err(blocked("loopback host"));
    }
    if METADATA_HOSTS.contains(&name.as_str()) {
        return Err(blocked("metadata hostname"));
    }

    // Obfuscated IPv4 forms the URL parser did not normalise. A host that is
    // all digits or a 0x-prefixed hex string addresses an IP, not a name.
    if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
        return Err(match decimal_host_to_ipv4(&name) {
            Some(addr) if !ranges::is_private_ipv4(addr) => blocked("decimal IP literal"),
            _ => blocked("private address"),
        });
    }
    if let Some(hex) = name.strip_prefix("0x") {
        return Err(match u32::from_str_radix(hex, 16).ok().map(Ipv4Addr::from) {
            Some(addr) if !ranges::is_private_ipv4(addr) => blocked("hex IP literal"),
            _ => blocked("private address"),
        });
    }

    // Dotted IPv4 with leading-zero padding (octal ambiguity).
    if looks_like_padded_ipv4(&name) {
        return Err(blocked("zero-padded IP literal"));
    }

    Ok(())
}

fn decimal_host_to_ipv4(host: &str) -> Option<Ipv4Addr> {
    host.parse::<u32>().ok().map(Ipv4Addr::from)
}

/// Extract the host portion of a raw URL string without normalising it.
/// The WHATWG parser folds octal/hex IP forms into canonical IPv4, so the
/// padded-octet check has to run against the original input.
fn raw_host(raw_url: &str) -> Option<&str> {
    let after_scheme = raw_url.split_once("://").map(|(_, rest)| rest)?;
    let authority = after_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(after_scheme);
    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    if host.starts_with('[') {
        return Some(host);
    }
    Some(host.split(':').next().unwrap_or(host))
}

/// True when the raw URL's host is a dotted IPv4 with a zero-padded octet
/// (`010.0.0.1`, `192.168.001.1`), a form parsers disagree on.
pub fn raw_host_is_padded_ip(raw_url: &str) -> bool {
    raw_host(raw_url).map_or(false, looks_like_padded_ipv4)
}

/// Parse and syntactically validate a raw URL string, including the checks
/// that only work pre-normalisation.
pub fn parse_and_check(raw: &str) -> Result<Url> {
    if raw_host_is_padded_ip(raw) {
        return Err(blocked("zero-padded IP literal"));
    }
    let url = Url::parse(raw)?;
    UrlGuard::check_syntactic(&url)?;
    Ok(url)
}

/// True for hosts shaped like dotted IPv4 where any octet carries a leading
/// zero (`010.0.0.1`, `192.168.001.1`).
fn looks_like_padded_ipv4(host: &str) -> bool {
    let parts: Vec<&str> = host.split('.').collect();
    if parts.len() != 4 {
        return false;
    }
    if !parts
        .iter()
        .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
    {
        return false;
    }
    parts.iter().any(|p| p.len() > 1 && p.starts_with('0'))
}

/// Convenience check for callback URLs: HTTPS only, then the usual host
/// rules. DNS validation is left to the caller (async context).
pub fn check_callback_syntactic(url: &Url) -> Result<()> {
    if url.scheme() != "https" {
        return Err(blocked("callback URL must be https"));
    }
    UrlGuard::check_syntactic(url)
}

/// Host-only check used by the browser's sub-request interceptor, where we
/// have a URL string and need a cheap pass/fail.
pub fn is_host_allowed(raw_url: &str) -> bool {
    parse_and_check(raw_url).is_ok()
}

/// Public helper for components that already hold resolved addresses.
pub fn any_private(addrs: &[IpAddr]) -> bool {
    addrs.iter().any(|ip| ranges::is_private_ip(*ip))
}
