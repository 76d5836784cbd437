//! BEP-42 node id / IP consistency check.
//!
//! A node id is bound to the address it is used from: its first 21 bits are
//! the CRC32C of the masked IP combined with a 3-bit random value, and its last
//! byte carries that random value. The engine never calls into this module; a
//! higher layer uses it before trusting a peer's announced identity.
//!
//! [BEP-42]: http://bittorrent.org/beps/bep_0042.html

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use rand::Rng;

use super::node::NodeId;

const IPV4_MASK: [u8; 4] = [0x03, 0x0f, 0x3f, 0xff];
const IPV6_MASK: [u8; 8] = [0x01, 0x03, 0x07, 0x0f, 0x1f, 0x3f, 0x7f, 0xff];

/// Derives a node id for `ip`, drawing the free bits from `rng`.
pub fn generate_secure_node_id<R: Rng>(ip: IpAddr, rng: &mut R) -> NodeId {
    let mut id = NodeId::generate_with(rng).0;
    let crc = ip_crc(ip, id[19]);
    id[0] = (crc >> 24) as u8;
    id[1] = (crc >> 16) as u8;
    id[2] = ((crc >> 8) as u8 & 0xf8) | (id[2] & 0x07);

    NodeId(id)
}

/// Recomputes the expected prefix for `ip` and compares it with `node_id`.
///
/// Local addresses get no exemption here. A caller that wants to accept any id
/// from its own network checks [`is_local_network`] first.
pub fn validate_node_id(node_id: &NodeId, ip: IpAddr) -> bool {
    let id = node_id.as_bytes();
    let crc = ip_crc(ip, id[19]);

    id[0] == (crc >> 24) as u8
        && id[1] == (crc >> 16) as u8
        && id[2] & 0xf8 == (crc >> 8) as u8 & 0xf8
}

fn ip_crc(ip: IpAddr, rand: u8) -> u32 {
    let r = rand & 0x07;
    match ip {
        IpAddr::V4(v4) => {
            let mut masked = v4.octets();
            for (byte, mask) in masked.iter_mut().zip(IPV4_MASK) {
                *byte &= mask;
            }
            masked[0] |= r << 5;
            crc32c::crc32c(&masked)
        }
        IpAddr::V6(v6) => {
            let mut masked = [0u8; 8];
            masked.copy_from_slice(&v6.octets()[..8]);
            for (byte, mask) in masked.iter_mut().zip(IPV6_MASK) {
                *byte &= mask;
            }
            masked[0] |= r << 5;
            crc32c::crc32c(&masked)
        }
    }
}

/// Checks if an IP address is in a local/private network range.
///
/// - IPv4: 10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16, 169.254.0.0/16, 127.0.0.0/8
/// - IPv6: loopback, link-local, unique local (fc00::/7)
pub fn is_local_network(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_local_ipv4(v4),
        IpAddr::V6(v6) => is_local_ipv6(v6),
    }
}

fn is_local_ipv4(ip: &Ipv4Addr) -> bool {
    ip.is_private() || ip.is_link_local() || ip.is_loopback()
}

fn is_local_ipv6(ip: &Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback() || first & 0xffc0 == 0xfe80 || first & 0xfe00 == 0xfc00
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn hex_id(hex: &str) -> NodeId {
        let bytes: Vec<u8> = (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
            .collect();
        NodeId::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn test_bep42_vectors() {
        let vectors = [
            ([124, 31, 75, 21], "5fbfbff10c5d6a4ec8a88e4c6ab4c28b95eee401"),
            ([21, 75, 31, 124], "5a3ce9c14e7a08645677bbd1cfe7d8f956d53256"),
            ([65, 23, 51, 170], "a5d43220bc8f112a3d426c84764f8c2a1150e616"),
        ];

        for (ip, id) in vectors {
            let ip = IpAddr::V4(Ipv4Addr::from(ip));
            assert!(validate_node_id(&hex_id(id), ip), "{}", ip);
        }
    }

    #[test]
    fn test_generated_id_validates() {
        let mut rng = StdRng::seed_from_u64(42);
        let ip = IpAddr::V4(Ipv4Addr::new(124, 31, 75, 21));

        for _ in 0..16 {
            let id = generate_secure_node_id(ip, &mut rng);
            assert!(validate_node_id(&id, ip));
        }
    }

    #[test]
    fn test_generated_v6_id_validates() {
        let mut rng = StdRng::seed_from_u64(7);
        let ip = IpAddr::V6(Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8888));

        let id = generate_secure_node_id(ip, &mut rng);
        assert!(validate_node_id(&id, ip));
    }

    #[test]
    fn test_validation_fails_for_wrong_ip() {
        let id = hex_id("5fbfbff10c5d6a4ec8a88e4c6ab4c28b95eee401");
        assert!(!validate_node_id(&id, IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))));
    }

    #[test]
    fn test_local_addresses_are_checked_too() {
        let local_ip = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1));
        assert!(!validate_node_id(&NodeId([0xab; 20]), local_ip));

        let mut rng = StdRng::seed_from_u64(3);
        for ip in [local_ip, IpAddr::V4(Ipv4Addr::LOCALHOST)] {
            let id = generate_secure_node_id(ip, &mut rng);
            assert!(validate_node_id(&id, ip), "{}", ip);
        }
    }

    #[test]
    fn test_local_detection() {
        for ip in [
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            IpAddr::V4(Ipv4Addr::new(172, 31, 255, 255)),
            IpAddr::V4(Ipv4Addr::new(169, 254, 0, 1)),
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(Ipv6Addr::LOCALHOST),
            IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1)),
            IpAddr::V6(Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 1)),
        ] {
            assert!(is_local_network(&ip), "{}", ip);
        }

        assert!(!is_local_network(&IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))));
        assert!(!is_local_network(&IpAddr::V6(Ipv6Addr::new(
            0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8888
        ))));
    }
}
