//! Request context attachment.
//!
//! # Responsibilities
//! - Give each request a short id, once
//! - Decide whether forwarding headers from the peer are trusted
//! - Resolve client ip, host and protocol
//!
//! # Design Decisions
//! - Attachment is idempotent; nested apps reuse the outer request's view
//! - Without an explicit setting, loopback and private peers are trusted
//! - IPv4-mapped IPv6 and `::1` are reported in IPv4 form

use std::net::{IpAddr, Ipv4Addr};

use axum::http::header;

use crate::http::request::Request;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Request ids are base-36 numbers below 36^5.
const ID_SPACE: u64 = 36 * 36 * 36 * 36 * 36;

/// Client-facing network view of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkInfo {
    pub ip: String,
    pub ips: Vec<String>,
    pub host: String,
    pub hostname: String,
    pub protocol: String,
    pub secure: bool,
}

/// Attach id and network info unless the request already carries them.
pub fn attach(trust_proxy: Option<bool>, req: &mut Request) {
    if req.is_attached() {
        return;
    }

    let peer_ip = req.peer().ip();
    let trusted = trust_proxy.unwrap_or_else(|| is_private(peer_ip));
    let network = resolve(req, peer_ip, trusted);
    let id = generate_id();

    tracing::debug!(
        request_id = %id,
        ip = %network.ip,
        host = %network.host,
        protocol = %network.protocol,
        trusted,
        "Request context attached"
    );

    req.attach(id, network);
}

fn resolve(req: &Request, peer_ip: IpAddr, trusted: bool) -> NetworkInfo {
    let socket_ip = canonical(peer_ip).to_string();

    let forwarded = |name: &str| {
        req.header(name)
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let direct_host = || {
        req.header(header::HOST.as_str())
            .map(str::to_string)
            .or_else(|| req.uri().authority().map(|a| a.as_str().to_string()))
            .unwrap_or_default()
    };

    let (host, protocol, ips) = if trusted {
        let mut ips: Vec<String> = req
            .header(X_FORWARDED_FOR)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|ip| !ip.is_empty())
                    .map(normalize_ip)
                    .collect()
            })
            .unwrap_or_default();
        ips.push(socket_ip);

        (
            forwarded(X_FORWARDED_HOST).unwrap_or_else(direct_host),
            forwarded(X_FORWARDED_PROTO)
                .map(|p| p.to_ascii_lowercase())
                .unwrap_or_else(|| "http".to_string()),
            ips,
        )
    } else {
        (direct_host(), "http".to_string(), vec![socket_ip])
    };

    NetworkInfo {
        ip: ips.first().cloned().unwrap_or_default(),
        hostname: strip_port(&host).to_string(),
        secure: protocol == "https",
        host,
        protocol,
        ips,
    }
}

/// Normalise a textual address; unparseable input is returned trimmed.
pub fn normalize_ip(raw: &str) -> String {
    let raw = raw.trim();
    match raw.parse::<IpAddr>() {
        Ok(ip) => canonical(ip).to_string(),
        Err(_) => raw.to_string(),
    }
}

fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) if v6.is_loopback() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    }
}

/// Loopback, 10/8, 172.16/12 or 192.168/16.
pub fn is_private(ip: IpAddr) -> bool {
    match canonical(ip) {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private(),
        IpAddr::V6(_) => false,
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

fn generate_id() -> String {
    to_base36(fastrand::u64(..ID_SPACE))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
