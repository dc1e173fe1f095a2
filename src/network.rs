//! Addressing between this machine and the one running OBS.
//!
//! When this tool runs inside a WSL guest and OBS runs on the Windows host,
//! loopback does not cross the VM boundary: OBS is reached on the guest's
//! default gateway and the content server must bind every interface and
//! advertise the guest's own address. Probes only read files and interface
//! tables; any failure falls back to loopback with a warning.

use crate::error::SceneError;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};

const LOOPBACK: Ipv4Addr = Ipv4Addr::LOCALHOST;
const ANY: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

/// Read-only view of the host's network state.
pub trait NetworkProbe {
    /// Contents of `/proc/version` and `/proc/sys/kernel/osrelease`
    fn kernel_strings(&self) -> Vec<String>;
    fn wsl_distro(&self) -> Option<String>;
    /// Contents of `/proc/net/route`
    fn route_table(&self) -> Option<String>;
    /// Contents of `/etc/resolv.conf`
    fn resolv_conf(&self) -> Option<String>;
    /// Interface name and IPv4 address pairs
    fn interfaces(&self) -> Vec<(String, Ipv4Addr)>;
}

/// Probe backed by procfs and `get_if_addrs`.
pub struct SystemProbe;

impl NetworkProbe for SystemProbe {
    fn kernel_strings(&self) -> Vec<String> {
        ["/proc/version", "/proc/sys/kernel/osrelease"]
            .iter()
            .filter_map(|p| fs::read_to_string(p).ok())
            .collect()
    }

    fn wsl_distro(&self) -> Option<String> {
        std::env::var("WSL_DISTRO_NAME").ok().filter(|v| !v.is_empty())
    }

    fn route_table(&self) -> Option<String> {
        fs::read_to_string("/proc/net/route").ok()
    }

    fn resolv_conf(&self) -> Option<String> {
        fs::read_to_string("/etc/resolv.conf").ok()
    }

    fn interfaces(&self) -> Vec<(String, Ipv4Addr)> {
        let addrs = match get_if_addrs::get_if_addrs() {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!("Interface enumeration failed: {}", e);
                return Vec::new();
            }
        };
        addrs
            .into_iter()
            .filter_map(|iface| match iface.ip() {
                IpAddr::V4(ip) => Some((iface.name, ip)),
                IpAddr::V6(_) => None,
            })
            .collect()
    }
}

/// How the profile was derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Discovery {
    /// Control host given by the operator
    Explicit,
    /// WSL guest, peer found via the named source
    NestedGuest { peer_source: String },
    Loopback,
    /// Probing failed; loopback assumed
    Fallback { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkProfile {
    pub content_bind: IpAddr,
    /// Host part of the advertised content URL
    pub content_public_host: String,
    pub content_public_url: String,
    pub control_host: String,
    pub control_port: u16,
    pub discovery: Discovery,
}

impl NetworkProfile {
    fn new(
        content_bind: Ipv4Addr,
        public_host: Ipv4Addr,
        content_port: u16,
        control_host: String,
        control_port: u16,
        discovery: Discovery,
    ) -> Self {
        let public_host = public_host.to_string();
        Self {
            content_bind: IpAddr::V4(content_bind),
            content_public_url: format!("http://{public_host}:{content_port}"),
            content_public_host: public_host,
            control_host,
            control_port,
            discovery,
        }
    }

    /// Same profile advertising a different content port (after binding port 0).
    pub fn with_content_port(mut self, port: u16) -> Self {
        self.content_public_url = format!("http://{}:{}", self.content_public_host, port);
        self
    }

    pub fn is_nested(&self) -> bool {
        matches!(self.discovery, Discovery::NestedGuest { .. })
    }
}

impl fmt::Display for NetworkProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "control endpoint : {}:{}", self.control_host, self.control_port)?;
        writeln!(f, "content bind     : {}", self.content_bind)?;
        writeln!(f, "content URL      : {}", self.content_public_url)?;
        write!(f, "discovery        : {:?}", self.discovery)
    }
}

pub fn is_loopback_host(host: &str) -> bool {
    let host = host.trim().trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() || host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.parse::<IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false)
}

/// Derive the profile. Never fails; ambiguity is logged and resolved to
/// loopback.
pub fn resolve(
    probe: &dyn NetworkProbe,
    explicit_host: Option<&str>,
    control_port: u16,
    content_port: u16,
) -> NetworkProfile {
    if let Some(host) = explicit_host.filter(|h| !is_loopback_host(h)) {
        let public = match candidate_ipv4_addrs(&probe.interfaces()).first() {
            Some(ip) => *ip,
            None => {
                ambiguous("no routable local IPv4 for the content URL");
                LOOPBACK
            }
        };
        return NetworkProfile::new(
            ANY,
            public,
            content_port,
            host.to_string(),
            control_port,
            Discovery::Explicit,
        );
    }

    if !is_nested_guest(probe) {
        return NetworkProfile::new(
            LOOPBACK,
            LOOPBACK,
            content_port,
            LOOPBACK.to_string(),
            control_port,
            Discovery::Loopback,
        );
    }

    let peer = probe
        .route_table()
        .as_deref()
        .and_then(default_gateway)
        .map(|ip| (ip, "/proc/net/route"))
        .or_else(|| {
            probe
                .resolv_conf()
                .as_deref()
                .and_then(nameserver)
                .map(|ip| (ip, "/etc/resolv.conf"))
        });
    let Some((peer, source)) = peer else {
        let reason = "nested guest detected but no default gateway or nameserver";
        ambiguous(reason);
        return fallback(content_port, control_port, reason);
    };

    let Some(guest) = guest_address(&probe.interfaces()) else {
        let reason = "nested guest detected but no guest IPv4 address";
        ambiguous(reason);
        return fallback(content_port, control_port, reason);
    };

    tracing::info!("WSL guest {} reaching OBS host at {} (via {})", guest, peer, source);
    NetworkProfile::new(
        ANY,
        guest,
        content_port,
        peer.to_string(),
        control_port,
        Discovery::NestedGuest {
            peer_source: source.to_string(),
        },
    )
}

fn fallback(content_port: u16, control_port: u16, reason: &str) -> NetworkProfile {
    NetworkProfile::new(
        LOOPBACK,
        LOOPBACK,
        content_port,
        LOOPBACK.to_string(),
        control_port,
        Discovery::Fallback {
            reason: reason.to_string(),
        },
    )
}

fn ambiguous(reason: &str) {
    tracing::warn!(
        "{}; falling back to loopback",
        SceneError::NetworkDiscoveryAmbiguous {
            reason: reason.to_string()
        }
    );
}

fn is_nested_guest(probe: &dyn NetworkProbe) -> bool {
    probe.wsl_distro().is_some()
        || probe
            .kernel_strings()
            .iter()
            .any(|s| s.to_ascii_lowercase().contains("microsoft"))
}

/// Gateway of the `00000000` destination row. Addresses are little-endian hex.
fn default_gateway(route_table: &str) -> Option<Ipv4Addr> {
    route_table.lines().skip(1).find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 || fields[1] != "00000000" {
            return None;
        }
        let raw = u32::from_str_radix(fields[2], 16).ok()?;
        let ip = Ipv4Addr::from(raw.to_le_bytes());
        (!ip.is_unspecified()).then_some(ip)
    })
}

fn nameserver(resolv_conf: &str) -> Option<Ipv4Addr> {
    resolv_conf.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("nameserver"), Some(addr)) => addr
                .parse::<Ipv4Addr>()
                .ok()
                .filter(|ip| !ip.is_loopback() && !ip.is_unspecified()),
            _ => None,
        }
    })
}

/// `eth0` when present, else the best ranked candidate.
fn guest_address(interfaces: &[(String, Ipv4Addr)]) -> Option<Ipv4Addr> {
    interfaces
        .iter()
        .find(|(name, ip)| name == "eth0" && !ip.is_loopback())
        .map(|(_, ip)| *ip)
        .or_else(|| candidate_ipv4_addrs(interfaces).first().copied())
}

/// Routable IPv4 addresses, private ranges first.
fn candidate_ipv4_addrs(interfaces: &[(String, Ipv4Addr)]) -> Vec<Ipv4Addr> {
    let mut out: Vec<Ipv4Addr> = interfaces
        .iter()
        .filter(|(name, _)| !is_tunnel_or_virtual(name))
        .map(|(_, ip)| *ip)
        .filter(|ip| !ip.is_loopback() && !ip.is_link_local() && !ip.is_unspecified())
        .collect();

    let mut private: Vec<Ipv4Addr> = out.iter().copied().filter(|ip| ip.is_private()).collect();
    if !private.is_empty() {
        private.sort_by_key(|ip| (private_ipv4_rank(*ip), *ip));
        private.dedup();
        return private;
    }

    out.sort();
    out.dedup();
    out
}

fn is_tunnel_or_virtual(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    [
        "wintun", "wireguard", "tailscale", "zerotier", "vpn", "tun", "docker", "vmware",
        "virtualbox", "loopback",
    ]
    .iter()
    .any(|marker| name.contains(marker))
}

/// 192.168/16 first, then 10/8, then 172.16/12.
fn private_ipv4_rank(ip: Ipv4Addr) -> u8 {
    let [a, b, _, _] = ip.octets();
    if a == 192 && b == 168 {
        0
    } else if a == 10 {
        1
    } else if a == 172 && (16..=31).contains(&b) {
        2
    } else {
        3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeProbe {
        kernel: Vec<String>,
        distro: Option<String>,
        route: Option<String>,
        resolv: Option<String>,
        interfaces: Vec<(String, Ipv4Addr)>,
    }

    impl NetworkProbe for FakeProbe {
        fn kernel_strings(&self) -> Vec<String> {
            self.kernel.clone()
        }
        fn wsl_distro(&self) -> Option<String> {
            self.distro.clone()
        }
        fn route_table(&self) -> Option<String> {
            self.route.clone()
        }
        fn resolv_conf(&self) -> Option<String> {
            self.resolv.clone()
        }
        fn interfaces(&self) -> Vec<(String, Ipv4Addr)> {
            self.interfaces.clone()
        }
    }

    // 172.29.128.1 as little-endian hex
    const ROUTE: &str = "Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\n\
                         eth0\t00000000\t01801DAC\t0003\t0\t0\t0\t00000000\n\
                         eth0\t00801DAC\t00000000\t0001\t0\t0\t0\t00F0FFFF\n";

    fn wsl() -> FakeProbe {
        FakeProbe {
            kernel: vec!["Linux version 5.15.153.1-microsoft-standard-WSL2".into()],
            route: Some(ROUTE.into()),
            interfaces: vec![
                ("lo".into(), Ipv4Addr::LOCALHOST),
                ("eth0".into(), Ipv4Addr::new(172, 29, 140, 7)),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn wsl_guest_uses_gateway_and_guest_ip() {
        let profile = resolve(&wsl(), None, 4455, 8080);
        assert_eq!(profile.control_host, "172.29.128.1");
        assert_eq!(profile.control_port, 4455);
        assert_eq!(profile.content_bind, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(profile.content_public_url, "http://172.29.140.7:8080");
        assert!(profile.is_nested());
    }

    #[test]
    fn loopback_host_still_triggers_detection() {
        let profile = resolve(&wsl(), Some("localhost"), 4455, 8080);
        assert_eq!(profile.control_host, "172.29.128.1");
    }

    #[test]
    fn nameserver_is_fallback_peer() {
        let probe = FakeProbe {
            route: None,
            resolv: Some("# generated by WSL\nnameserver 172.29.128.1\n".into()),
            ..wsl()
        };
        let profile = resolve(&probe, None, 4455, 8080);
        assert_eq!(profile.control_host, "172.29.128.1");
        assert_eq!(
            profile.discovery,
            Discovery::NestedGuest {
                peer_source: "/etc/resolv.conf".into()
            }
        );
    }

    #[test]
    fn distro_variable_alone_marks_guest() {
        let probe = FakeProbe {
            kernel: vec![],
            distro: Some("Ubuntu".into()),
            ..wsl()
        };
        assert!(resolve(&probe, None, 4455, 8080).is_nested());
    }

    #[test]
    fn plain_host_uses_loopback() {
        let probe = FakeProbe {
            kernel: vec!["Linux version 6.8.0-generic".into()],
            interfaces: vec![("enp3s0".into(), Ipv4Addr::new(192, 168, 1, 20))],
            ..Default::default()
        };
        let profile = resolve(&probe, None, 4455, 8080);
        assert_eq!(profile.control_host, "127.0.0.1");
        assert_eq!(profile.content_bind, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(profile.content_public_url, "http://127.0.0.1:8080");
        assert_eq!(profile.discovery, Discovery::Loopback);
    }

    #[test]
    fn explicit_host_is_used_verbatim() {
        let probe = FakeProbe {
            interfaces: vec![
                ("docker0".into(), Ipv4Addr::new(172, 17, 0, 1)),
                ("wlan0".into(), Ipv4Addr::new(10, 0, 0, 5)),
                ("enp3s0".into(), Ipv4Addr::new(192, 168, 1, 20)),
            ],
            ..wsl()
        };
        let profile = resolve(&probe, Some("192.168.1.50"), 4456, 0);
        assert_eq!(profile.control_host, "192.168.1.50");
        assert_eq!(profile.control_port, 4456);
        assert_eq!(profile.content_public_url, "http://192.168.1.20:0");
        assert_eq!(profile.discovery, Discovery::Explicit);
    }

    #[test]
    fn guest_without_peer_falls_back() {
        let probe = FakeProbe {
            route: Some("Iface\tDestination\tGateway\n".into()),
            resolv: None,
            ..wsl()
        };
        let profile = resolve(&probe, None, 4455, 8080);
        assert_eq!(profile.control_host, "127.0.0.1");
        assert!(matches!(profile.discovery, Discovery::Fallback { .. }));
    }

    #[test]
    fn public_url_follows_bound_port() {
        let profile = resolve(&wsl(), None, 4455, 0).with_content_port(41234);
        assert_eq!(profile.content_public_url, "http://172.29.140.7:41234");
    }

    #[test]
    fn gateway_hex_is_little_endian() {
        assert_eq!(default_gateway(ROUTE), Some(Ipv4Addr::new(172, 29, 128, 1)));
    }

    #[test]
    fn loopback_hosts() {
        for host in ["localhost", "127.0.0.1", "::1", "[::1]", ""] {
            assert!(is_loopback_host(host), "{host}");
        }
        assert!(!is_loopback_host("obs.lan"));
    }
}
