//! Private address range tables for IPv4 and IPv6.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// IPv4 ranges the gateway must never talk to.
pub fn is_private_ipv4(addr: Ipv4Addr) -> bool {
    let o = addr.octets();
    match o[0] {
        0 => true,                                  // 0.0.0.0/8
        10 => true,                                 // 10.0.0.0/8
        127 => true,                                // 127.0.0.0/8
        100 if (64..128).contains(&o[1]) => true,   // 100.64.0.0/10
        169 if o[1] == 254 => true,                 // 169.254.0.0/16
        172 if (16..32).contains(&o[1]) => true,    // 172.16.0.0/12
        192 if o[1] == 168 => true,                 // 192.168.0.0/16
        192 if o[1] == 0 && o[2] == 0 => true,      // 192.0.0.0/24
        198 if o[1] == 18 || o[1] == 19 => true,    // 198.18.0.0/15
        _ => false,
    }
}

/// IPv6 rules: loopback, link-local, unique-local, and v4-mapped addresses
/// folded onto the IPv4 table.
pub fn is_private_ipv6(addr: Ipv6Addr) -> bool {
    if addr == Ipv6Addr::LOCALHOST || addr == Ipv6Addr::UNSPECIFIED {
        return true;
    }
    if let Some(v4) = addr.to_ipv4_mapped() {
        return is_private_ipv4(v4);
    }
    let seg = addr.segments();
    // fe80::/10 link-local
    if seg[0] & 0xffc0 == 0xfe80 {
        return true;
    }
    // fc00::/7 unique-local
    if seg[0] & 0xfe00 == 0xfc00 {
        return true;
    }
    false
}

pub fn is_private_ip(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => is_private_ipv4(v4),
        IpAddr::V6(v6) => is_private_ipv6(v6),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_table() {
        let private = [
            "0.1.2.3",
            "10.1.2.3",
            "127.0.0.1",
            "127.255.255.255",
            "100.64.0.1",
            "100.127.255.254",
            "169.254.169.254",
            "172.16.0.1",
            "172.31.255.255",
            "192.168.0.1",
            "192.0.0.170",
            "198.18.0.1",
            "198.19.255.255",
        ];
        for ip in private {
            assert!(is_private_ipv4(ip.parse().unwrap()), "{ip}");
        }

        let public = [
            "8.8.8.8",
            "100.63.255.255",
            "100.128.0.1",
            "172.15.255.255",
            "172.32.0.1",
            "192.0.1.1",
            "198.17.255.255",
            "198.20.0.1",
            "93.184.216.34",
        ];
        for ip in public {
            assert!(!is_private_ipv4(ip.parse().unwrap()), "{ip}");
        }
    }

    #[test]
    fn ipv6_table() {
        assert!(is_private_ipv6("::1".parse().unwrap()));
        assert!(is_private_ipv6("fe80::1".parse().unwrap()));
        assert!(is_private_ipv6("febf::1".parse().unwrap()));
        assert!(is_private_ipv6("fc00::1".parse().unwrap()));
        assert!(is_private_ipv6("fdff::1".parse().unwrap()));
        assert!(!is_private_ipv6("2001:db8::1".parse().unwrap()));
        assert!(!is_private_ipv6("2606:4700::1111".parse().unwrap()));
    }

    #[test]
    fn v4_mapped_follows_v4_rules() {
        assert!(is_private_ipv6("::ffff:127.0.0.1".parse().unwrap()));
        assert!(is_private_ipv6("::ffff:10.0.0.1".parse().unwrap()));
        assert!(is_private_ipv6("::ffff:169.254.169.254".parse().unwrap()));
        assert!(!is_private_ipv6("::ffff:8.8.8.8".parse().unwrap()));
    }
}
