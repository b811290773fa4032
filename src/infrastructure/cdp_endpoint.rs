//! Remote-debugging (CDP) endpoint resolution
//!
//! A Chrome started with `--remote-debugging-port` can be attached through
//! `goog:chromeOptions.debuggerAddress`. Under WSL the browser usually runs
//! on the Windows host, whose address has to be discovered.

use std::net::Ipv4Addr;
use tracing::debug;

pub const DEFAULT_CDP_HOST: &str = "127.0.0.1";
pub const DEFAULT_CDP_PORT: u16 = 9222;

/// Host override consulted before any discovery
pub const WSL_HOST_ENV: &str = "WSL_CDP_HOST";

/// Normalises a user supplied endpoint to `scheme://host:port`.
///
/// The scheme defaults to http (`wss`/`https` become https), wildcard hosts
/// are replaced by `default_host` and the port defaults to 9222. Paths and
/// queries are dropped.
pub fn normalize_cdp_url(raw: &str, default_host: &str) -> Option<String> {
    let candidate = raw.trim();
    if candidate.is_empty() {
        return None;
    }
    let (scheme, rest) = match candidate.split_once("://") {
        Some((scheme, rest)) => (scheme.to_ascii_lowercase(), rest),
        None => ("http".to_string(), candidate),
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let authority = authority.rsplit('@').next().unwrap_or(authority);

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => {
            (host, port.parse::<u16>().ok())
        }
        _ => (authority, None),
    };
    let host = match host {
        "" | "0.0.0.0" | "*" => default_host,
        other => other,
    };
    let port = port.filter(|p| *p != 0).unwrap_or(DEFAULT_CDP_PORT);
    let scheme = if scheme == "https" || scheme == "wss" {
        "https"
    } else {
        "http"
    };
    Some(format!("{scheme}://{host}:{port}"))
}

/// `host:port` part of a normalised endpoint, as WebDriver expects it
pub fn debugger_address(normalized: &str) -> &str {
    normalized
        .split_once("://")
        .map_or(normalized, |(_, rest)| rest)
}

pub fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    a == 10 || (a == 172 && (16..=31).contains(&b)) || (a == 192 && b == 168)
}

/// Default gateway from `/proc/net/route` (little-endian hex columns)
pub fn default_gateway_from_route(route_table: &str) -> Option<Ipv4Addr> {
    route_table.lines().skip(1).find_map(|line| {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 3 || cols[1] != "00000000" {
            return None;
        }
        let raw = u32::from_str_radix(cols[2], 16).ok()?;
        Some(Ipv4Addr::from(raw.to_le_bytes()))
    })
}

/// First private, non-loopback nameserver of a resolv.conf
pub fn nameserver_from_resolv(resolv_conf: &str) -> Option<Ipv4Addr> {
    resolv_conf
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.strip_prefix("nameserver"))
        .filter_map(|rest| rest.split_whitespace().next())
        .filter_map(|ip| ip.parse::<Ipv4Addr>().ok())
        .find(|ip| !ip.is_loopback() && is_private_ipv4(*ip))
}

/// Windows host seen from WSL: env override, private default gateway,
/// then a private resolv.conf nameserver
pub fn windows_host_from(
    override_host: Option<&str>,
    route_table: Option<&str>,
    resolv_conf: Option<&str>,
) -> Option<String> {
    if let Some(host) = override_host.map(str::trim).filter(|h| !h.is_empty()) {
        return Some(host.to_string());
    }
    if let Some(gateway) = route_table
        .and_then(default_gateway_from_route)
        .filter(|ip| is_private_ipv4(*ip))
    {
        return Some(gateway.to_string());
    }
    resolv_conf
        .and_then(nameserver_from_resolv)
        .map(|ip| ip.to_string())
}

pub fn running_on_wsl() -> bool {
    if std::env::var_os("WSL_DISTRO_NAME").is_some() {
        return true;
    }
    std::fs::read_to_string("/proc/sys/kernel/osrelease")
        .map(|release| release.to_lowercase().contains("microsoft"))
        .unwrap_or(false)
}

/// Host used when the configured endpoint names no usable host
pub fn default_cdp_host() -> String {
    if !running_on_wsl() {
        return DEFAULT_CDP_HOST.to_string();
    }
    let override_host = std::env::var(WSL_HOST_ENV).ok();
    let route = std::fs::read_to_string("/proc/net/route").ok();
    let resolv = std::fs::read_to_string("/etc/resolv.conf").ok();
    match windows_host_from(override_host.as_deref(), route.as_deref(), resolv.as_deref()) {
        Some(host) => {
            debug!("WSL detected, Windows host for CDP: {}", host);
            host
        }
        None => DEFAULT_CDP_HOST.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("localhost", "http://localhost:9222")]
    #[case("ws://0.0.0.0:9333/devtools/browser/abc", "http://10.0.0.1:9333")]
    #[case("wss://remote.example:443", "https://remote.example:443")]
    #[case("http://*:9222", "http://10.0.0.1:9222")]
    #[case("https://user@host.example/json/version", "https://host.example:9222")]
    fn cdp_urls_are_normalized(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_cdp_url(raw, "10.0.0.1").as_deref(), Some(expected));
    }

    #[test]
    fn blank_cdp_url_is_none() {
        assert_eq!(normalize_cdp_url("  ", DEFAULT_CDP_HOST), None);
        assert_eq!(debugger_address("http://127.0.0.1:9222"), "127.0.0.1:9222");
    }

    #[test]
    fn gateway_is_parsed_little_endian() {
        let table = "Iface\tDestination\tGateway\tFlags\n\
                     eth0\t00000000\t0170A8C0\t0003\n\
                     eth0\t0070A8C0\t00000000\t0001\n";
        assert_eq!(
            default_gateway_from_route(table),
            Some(Ipv4Addr::new(192, 168, 112, 1))
        );
    }

    #[test]
    fn windows_host_priority() {
        let route = "Iface Destination Gateway\neth0 00000000 0100A8C0\n";
        let resolv = "# generated\nnameserver 172.20.0.1\n";
        assert_eq!(
            windows_host_from(Some(" 10.1.1.1 "), Some(route), Some(resolv)).as_deref(),
            Some("10.1.1.1")
        );
        assert_eq!(
            windows_host_from(None, Some(route), Some(resolv)).as_deref(),
            Some("192.168.0.1")
        );
        let public_route = "Iface Destination Gateway\neth0 00000000 08080808\n";
        assert_eq!(
            windows_host_from(None, Some(public_route), Some(resolv)).as_deref(),
            Some("172.20.0.1")
        );
        assert_eq!(windows_host_from(None, None, Some("nameserver 127.0.0.1")), None);
    }
}
