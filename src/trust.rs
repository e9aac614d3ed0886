//! Implicit-trust rules for remote connections.
//!
//! Tailscale hands out addresses from the CGNAT block 100.64.0.0/10. A
//! companion app running in permissive mode accepts peers on that block
//! without a token, so the relay treats such hosts as worth dialing even when
//! no secret is configured.

use std::net::Ipv4Addr;

/// True if `host` is a dotted-quad IPv4 address inside 100.64.0.0/10.
///
/// Hostnames and anything that does not parse as IPv4 are never overlay
/// addresses.
pub fn is_overlay_address(host: &str) -> bool {
    match host.trim().parse::<Ipv4Addr>() {
        Ok(addr) => {
            let [first, second, ..] = addr.octets();
            first == 100 && (64..=127).contains(&second)
        }
        Err(_) => false,
    }
}

/// Whether a remote attempt has any chance of passing authentication.
pub fn remote_eligible(host: &str, token: Option<&str>) -> bool {
    token.is_some_and(|t| !t.is_empty()) || is_overlay_address(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_range() {
        assert!(is_overlay_address("100.64.0.1"));
        assert!(is_overlay_address("100.100.100.100"));
        assert!(is_overlay_address("100.127.255.255"));
    }

    #[test]
    fn test_outside_overlay_range() {
        assert!(!is_overlay_address("100.63.255.255"));
        assert!(!is_overlay_address("100.128.0.0"));
        assert!(!is_overlay_address("10.0.0.1"));
        assert!(!is_overlay_address("127.0.0.1"));
    }

    #[test]
    fn test_malformed_addresses() {
        assert!(!is_overlay_address("100.64.0"));
        assert!(!is_overlay_address("abc.def.1.2"));
        assert!(!is_overlay_address("100.64.0.1.5"));
        assert!(!is_overlay_address(""));
        assert!(!is_overlay_address("my-mac.tail1234.ts.net"));
    }

    #[test]
    fn test_remote_eligibility() {
        assert!(remote_eligible("127.0.0.1", Some("secret")));
        assert!(remote_eligible("100.100.1.1", None));
        assert!(!remote_eligible("127.0.0.1", None));
        assert!(!remote_eligible("127.0.0.1", Some("")));
    }
}
