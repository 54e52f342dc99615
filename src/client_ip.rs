/// Client IP extraction
///
/// Forwarding headers are only believed when the socket peer is one of the
/// configured trusted proxies. Otherwise anyone could claim any address.
///
/// Precedence for a trusted peer:
/// 1. `X-Forwarded-For`, right to left, first address that is not a trusted proxy
/// 2. `X-Real-IP`
/// 3. The peer address itself

use actix_web::http::header::HeaderMap;
use actix_web::HttpRequest;
use std::net::{AddrParseError, IpAddr};

use crate::configuration::ClientIpSettings;

pub const UNKNOWN_CLIENT: &str = "unknown";

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";

#[derive(Debug, Clone, Default)]
pub struct ClientIpResolver {
    trusted_proxies: Vec<IpAddr>,
}

impl ClientIpResolver {
    pub fn new(trusted_proxies: Vec<IpAddr>) -> Self {
        Self { trusted_proxies }
    }

    pub fn from_settings(settings: &ClientIpSettings) -> Result<Self, AddrParseError> {
        let trusted_proxies = settings
            .trusted_proxies
            .iter()
            .map(|ip| ip.trim().parse::<IpAddr>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(trusted_proxies))
    }

    fn is_trusted(&self, ip: &IpAddr) -> bool {
        self.trusted_proxies.contains(ip)
    }

    pub fn client_ip(&self, req: &HttpRequest) -> String {
        self.resolve(req.peer_addr().map(|addr| addr.ip()), req.headers())
    }

    pub fn resolve(&self, peer: Option<IpAddr>, headers: &HeaderMap) -> String {
        let peer = match peer {
            Some(peer) => peer,
            None => return UNKNOWN_CLIENT.to_string(),
        };

        if !self.is_trusted(&peer) {
            return peer.to_string();
        }

        if let Some(forwarded) = header_value(headers, FORWARDED_FOR) {
            for hop in forwarded.rsplit(',').map(str::trim) {
                match hop.parse::<IpAddr>() {
                    Ok(ip) if self.is_trusted(&ip) => continue,
                    Ok(ip) => return ip.to_string(),
                    // A garbled hop ends the part of the chain we can trust.
                    Err(_) => break,
                }
            }
        }

        if let Some(ip) =
            header_value(headers, REAL_IP).and_then(|value| value.trim().parse::<IpAddr>().ok())
        {
            return ip.to_string();
        }

        peer.to_string()
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
}
