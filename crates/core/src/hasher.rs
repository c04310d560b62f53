use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::salt::SaltManager;

/// One-way digest of a client identifier under the current day's salt.
///
/// Output is 64 lowercase hex characters. The same identifier hashes the same
/// way for the rest of the UTC day and differently on any other day.
#[derive(Clone)]
pub struct IdentifierHasher {
    salts: Arc<SaltManager>,
}

impl IdentifierHasher {
    pub fn new(salts: Arc<SaltManager>) -> Self {
        Self { salts }
    }

    pub fn hash(&self, identifier: &str) -> String {
        let salt = self.salts.current_salt();
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(b":");
        hasher.update(identifier.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// The identifier used for rate limiting: the first `X-Forwarded-For` entry
/// when a proxy supplied one, otherwise the peer address. Ports are dropped.
pub fn client_identifier(peer: Option<IpAddr>, forwarded_for: Option<&str>) -> String {
    let forwarded = forwarded_for
        .and_then(|value| value.split(',').map(str::trim).find(|entry| !entry.is_empty()));

    if let Some(entry) = forwarded {
        return strip_port(entry);
    }

    peer.map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn strip_port(entry: &str) -> String {
    if let Ok(addr) = entry.parse::<SocketAddr>() {
        return addr.ip().to_string();
    }
    if let Ok(ip) = entry.parse::<IpAddr>() {
        return ip.to_string();
    }
    match entry.rsplit_once(':') {
        // host:port where host is not an IPv6 literal
        Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => {
            host.to_string()
        }
        _ => entry.to_string(),
    }
}
