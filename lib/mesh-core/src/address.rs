//! Resolution of bind/advertise addresses into a routable node address

use crate::{MeshError, Result};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

/// Source of the host's externally routable interface address
pub trait InterfaceProbe: Send + Sync {
    fn routable_ip(&self) -> Option<IpAddr>;
}

/// Reads the host's interface table.
///
/// The default-route address is preferred; otherwise the first routable
/// address among all interfaces is used, so hosts without a default route
/// still resolve.
#[derive(Clone, Debug, Default)]
pub struct SystemProbe;

impl InterfaceProbe for SystemProbe {
    fn routable_ip(&self) -> Option<IpAddr> {
        let primary = local_ip_address::local_ip()
            .map_err(|e| debug!("Default route lookup failed: {}", e))
            .ok();
        let interfaces = local_ip_address::list_afinet_netifas()
            .map_err(|e| debug!("Interface enumeration failed: {}", e))
            .unwrap_or_default();
        select_routable(primary, interfaces)
    }
}

/// Pick the default-route address if routable, else the first routable
/// interface address. IPv4 is preferred over IPv6 among interfaces.
pub fn select_routable<I>(primary: Option<IpAddr>, interfaces: I) -> Option<IpAddr>
where
    I: IntoIterator<Item = (String, IpAddr)>,
{
    if let Some(ip) = primary.filter(is_routable) {
        return Some(ip);
    }

    let candidates: Vec<(String, IpAddr)> = interfaces
        .into_iter()
        .filter(|(_, ip)| is_routable(ip))
        .collect();
    let chosen = candidates
        .iter()
        .find(|(_, ip)| ip.is_ipv4())
        .or_else(|| candidates.first());
    if let Some((name, ip)) = chosen {
        debug!("Using address {} of interface {}", ip, name);
    }
    chosen.map(|(_, ip)| *ip)
}

/// Not loopback, link-local, unspecified or multicast
pub fn is_routable(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_loopback() || v4.is_link_local() || v4.is_unspecified() || v4.is_multicast())
        }
        IpAddr::V6(v6) => {
            !(v6.is_loopback()
                || v6.is_unicast_link_local()
                || v6.is_unspecified()
                || v6.is_multicast())
        }
    }
}

fn is_wildcard(host: &str) -> bool {
    matches!(host, "" | "0.0.0.0" | "::" | "[::]")
}

fn format_error(address: &str, reason: &str) -> MeshError {
    MeshError::AddressFormat {
        address: address.to_string(),
        reason: reason.to_string(),
    }
}

/// Split `host:port` or `[host]:port` into its parts.
///
/// The port must be present and non-empty; the host may be empty.
pub fn split_host_port(address: &str) -> Result<(String, String)> {
    if address.is_empty() {
        return Err(format_error(address, "missing address"));
    }

    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let end = rest
            .find(']')
            .ok_or_else(|| format_error(address, "missing ']' in address"))?;
        let host = &rest[..end];
        let port = rest[end + 1..]
            .strip_prefix(':')
            .ok_or_else(|| format_error(address, "missing port in address"))?;
        (host, port)
    } else {
        let colon = address
            .rfind(':')
            .ok_or_else(|| format_error(address, "missing port in address"))?;
        let host = &address[..colon];
        if host.contains(':') {
            return Err(format_error(address, "too many colons in address"));
        }
        (host, &address[colon + 1..])
    };

    if port.is_empty() {
        return Err(format_error(address, "missing port in address"));
    }
    if port.contains(':') || port.contains(']') {
        return Err(format_error(address, "malformed port in address"));
    }

    Ok((host.to_string(), port.to_string()))
}

/// Join host and port, bracketing IPv6 hosts
pub fn join_host_port(host: &str, port: &str) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Turns configured bind/advertise strings into a routable node address
#[derive(Clone)]
pub struct AddressResolver {
    probe: Arc<dyn InterfaceProbe>,
}

impl AddressResolver {
    /// Create a resolver backed by the host's interface table
    pub fn new() -> Self {
        Self::with_probe(Arc::new(SystemProbe))
    }

    pub fn with_probe(probe: Arc<dyn InterfaceProbe>) -> Self {
        Self { probe }
    }

    /// Resolve the address a node should advertise.
    ///
    /// `advertise` wins over `bind` when non-empty. Wildcard hosts are
    /// replaced by a routable interface address when one is found and kept
    /// literally otherwise.
    pub fn resolve(&self, advertise: &str, bind: &str) -> Result<String> {
        let candidate = if advertise.is_empty() { bind } else { advertise };
        let (host, port) = split_host_port(candidate)?;
        let host = self.extract_host(&host);
        Ok(join_host_port(&host, &port))
    }

    fn extract_host(&self, host: &str) -> String {
        if !is_wildcard(host) {
            return host.to_string();
        }

        match self.probe.routable_ip() {
            Some(ip) => ip.to_string(),
            None => {
                debug!("No routable interface address found, keeping host {:?}", host);
                host.to_string()
            }
        }
    }
}

impl Default for AddressResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe(Option<IpAddr>);

    impl InterfaceProbe for FixedProbe {
        fn routable_ip(&self) -> Option<IpAddr> {
            self.0
        }
    }

    fn resolver(ip: Option<&str>) -> AddressResolver {
        let ip = ip.map(|s| s.parse().unwrap());
        AddressResolver::with_probe(Arc::new(FixedProbe(ip)))
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(
            split_host_port("10.0.0.5:9000").unwrap(),
            ("10.0.0.5".to_string(), "9000".to_string())
        );
        assert_eq!(
            split_host_port("[::1]:80").unwrap(),
            ("::1".to_string(), "80".to_string())
        );
        assert_eq!(
            split_host_port(":8080").unwrap(),
            ("".to_string(), "8080".to_string())
        );
    }

    #[test]
    fn test_split_host_port_rejects_malformed() {
        for bad in ["", "localhost", "host:", "::1:80", "[::1]", "[::1:80", "[::1]80"] {
            let err = split_host_port(bad).unwrap_err();
            assert!(
                matches!(err, MeshError::AddressFormat { .. }),
                "expected format error for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_join_host_port() {
        assert_eq!(join_host_port("10.0.0.1", "80"), "10.0.0.1:80");
        assert_eq!(join_host_port("fe80::1", "80"), "[fe80::1]:80");
    }

    #[test]
    fn test_advertise_wins_over_bind() {
        let r = resolver(Some("10.1.1.1"));
        assert_eq!(r.resolve("svc.local:9000", "0.0.0.0:8080").unwrap(), "svc.local:9000");
    }

    #[test]
    fn test_wildcard_uses_routable_address() {
        let r = resolver(Some("10.0.0.5"));
        assert_eq!(r.resolve("", "0.0.0.0:8080").unwrap(), "10.0.0.5:8080");
        assert_eq!(r.resolve("", ":8080").unwrap(), "10.0.0.5:8080");
        assert_eq!(r.resolve("", "[::]:8080").unwrap(), "10.0.0.5:8080");
    }

    #[test]
    fn test_wildcard_falls_back_to_literal() {
        let r = resolver(None);
        assert_eq!(r.resolve("", "0.0.0.0:8080").unwrap(), "0.0.0.0:8080");
    }

    #[test]
    fn test_concrete_host_kept() {
        let r = resolver(Some("10.0.0.5"));
        assert_eq!(r.resolve("", "127.0.0.1:7000").unwrap(), "127.0.0.1:7000");
    }

    #[test]
    fn test_malformed_bind_is_fatal() {
        let r = resolver(Some("10.0.0.5"));
        assert!(matches!(
            r.resolve("", "0.0.0.0"),
            Err(MeshError::AddressFormat { .. })
        ));
    }

    fn iface(name: &str, ip: &str) -> (String, IpAddr) {
        (name.to_string(), ip.parse().unwrap())
    }

    #[test]
    fn test_select_prefers_routable_primary() {
        let primary = Some("192.0.2.2".parse().unwrap());
        let picked = select_routable(primary, vec![iface("eth1", "10.0.0.5")]);
        assert_eq!(picked, Some("192.0.2.2".parse().unwrap()));
    }

    #[test]
    fn test_select_without_default_route() {
        let interfaces = vec![
            iface("lo", "127.0.0.1"),
            iface("lo", "::1"),
            iface("eth0", "fe80::1"),
            iface("eth0", "2001:db8::5"),
            iface("eth0", "10.0.0.5"),
        ];
        assert_eq!(
            select_routable(None, interfaces),
            Some("10.0.0.5".parse().unwrap())
        );
    }

    #[test]
    fn test_select_skips_non_routable_primary() {
        let primary = Some("127.0.0.1".parse().unwrap());
        let interfaces = vec![iface("lo", "127.0.0.1"), iface("eth0", "2001:db8::5")];
        assert_eq!(
            select_routable(primary, interfaces),
            Some("2001:db8::5".parse().unwrap())
        );
    }

    #[test]
    fn test_select_nothing_routable() {
        let interfaces = vec![iface("lo", "127.0.0.1"), iface("eth0", "169.254.3.4")];
        assert_eq!(select_routable(None, interfaces), None);
    }

    #[test]
    fn test_system_probe_yields_only_routable() {
        if let Some(ip) = SystemProbe.routable_ip() {
            assert!(is_routable(&ip), "{} is not routable", ip);
        }

        let resolved = AddressResolver::new().resolve("", "0.0.0.0:8080").unwrap();
        let (host, port) = split_host_port(&resolved).unwrap();
        assert_eq!(port, "8080");
        match SystemProbe.routable_ip() {
            Some(ip) => assert_eq!(host, ip.to_string()),
            None => assert_eq!(host, "0.0.0.0"),
        }
    }

    #[test]
    fn test_is_routable() {
        assert!(is_routable(&"10.0.0.1".parse().unwrap()));
        assert!(!is_routable(&"127.0.0.1".parse().unwrap()));
        assert!(!is_routable(&"169.254.1.1".parse().unwrap()));
        assert!(!is_routable(&"0.0.0.0".parse().unwrap()));
        assert!(!is_routable(&"fe80::1".parse().unwrap()));
        assert!(is_routable(&"2001:db8::1".parse().unwrap()));
    }
}
