//! Source address selection for outgoing queries, backed by
//! getifaddrs(3).

use crate::error::ResolveError;
use std::ffi::CStr;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::ptr;

/// The interface's IPv4 address to use when querying for `target`: the
/// first address whose configured netmask covers the target, or the
/// interface's first address when none does.
pub fn source_for_ipv4(iface: &str, target: Ipv4Addr) -> Result<Ipv4Addr, ResolveError> {
    let candidates = ipv4_addrs(iface)?;
    let target = u32::from(target);
    for &(addr, mask) in &candidates {
        if u32::from(addr) & mask == target & mask {
            return Ok(addr);
        }
    }
    candidates
        .first()
        .map(|&(addr, _)| addr)
        .ok_or(ResolveError::NoSourceAddr)
}

/// The interface's IPv6 address to use when querying for `target`: the
/// first address sharing the target's upper 64 bits, or the interface's
/// first address when none does. Unspecified addresses never qualify.
pub fn source_for_ipv6(iface: &str, target: Ipv6Addr) -> Result<Ipv6Addr, ResolveError> {
    let candidates = ipv6_addrs(iface)?;
    let prefix = &target.octets()[..8];
    for &addr in &candidates {
        if &addr.octets()[..8] == prefix {
            return Ok(addr);
        }
    }
    candidates
        .first()
        .copied()
        .ok_or(ResolveError::NoSourceAddr)
}

fn ipv4_addrs(iface: &str) -> Result<Vec<(Ipv4Addr, u32)>, ResolveError> {
    let mut out = Vec::new();
    walk_ifaddrs(iface, |ifa| {
        // man 3 getifaddrs: ifa_addr may be null, and ifa_netmask too
        if unsafe { (*ifa.ifa_addr).sa_family } as i32 != libc::AF_INET {
            return;
        }
        let addr = unsafe {
            let sin = &*(ifa.ifa_addr as *const libc::sockaddr_in);
            Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr))
        };
        let mask = if ifa.ifa_netmask.is_null() {
            0
        } else {
            unsafe {
                let sin = &*(ifa.ifa_netmask as *const libc::sockaddr_in);
                u32::from_be(sin.sin_addr.s_addr)
            }
        };
        out.push((addr, mask));
    })?;
    Ok(out)
}

fn ipv6_addrs(iface: &str) -> Result<Vec<Ipv6Addr>, ResolveError> {
    let mut out = Vec::new();
    walk_ifaddrs(iface, |ifa| {
        if unsafe { (*ifa.ifa_addr).sa_family } as i32 != libc::AF_INET6 {
            return;
        }
        let addr = unsafe {
            let sin6 = &*(ifa.ifa_addr as *const libc::sockaddr_in6);
            Ipv6Addr::from(sin6.sin6_addr.s6_addr)
        };
        if addr != Ipv6Addr::UNSPECIFIED {
            out.push(addr);
        }
    })?;
    Ok(out)
}

fn walk_ifaddrs(iface: &str, mut visit: impl FnMut(&libc::ifaddrs)) -> Result<(), ResolveError> {
    // This block is marked as unsafe because it uses FFI. The list is
    // owned by libc between getifaddrs and freeifaddrs; every entry read
    // happens in between, and nothing borrowed from it escapes the loop.
    unsafe {
        let mut ifap: *mut libc::ifaddrs = ptr::null_mut();
        if libc::getifaddrs(&mut ifap) != 0 {
            return Err(ResolveError::Interface(io::Error::last_os_error()));
        }
        let mut cursor = ifap;
        while !cursor.is_null() {
            let ifa = &*cursor;
            cursor = ifa.ifa_next;
            if ifa.ifa_addr.is_null() || ifa.ifa_name.is_null() {
                continue;
            }
            if CStr::from_ptr(ifa.ifa_name).to_bytes() != iface.as_bytes() {
                continue;
            }
            visit(ifa);
        }
        libc::freeifaddrs(ifap);
    }
    Ok(())
}
