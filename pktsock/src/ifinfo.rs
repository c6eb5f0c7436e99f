//! Interface ioctls that do not need a packet socket. Each call opens a
//! throwaway `AF_INET` datagram socket, queries it, and closes it again.

use crate::linux;
use libc;
use std::{ffi::CStr, io};

/// The interface's hardware address, via ioctl(SIOCGIFHWADDR).
pub fn hardware_addr(iface: &CStr) -> io::Result<[u8; 6]> {
    query(iface, linux::SIOCGIFHWADDR, |ifr| {
        let mut mac = [0u8; 6];
        // sa_data is c_char on Linux; the bytes are what we want
        let sa_data = unsafe { &ifr.ifr_ifru.ifru_hwaddr.sa_data };
        for (out, &byte) in mac.iter_mut().zip(sa_data.iter()) {
            *out = byte as u8;
        }
        mac
    })
}

/// The interface's MTU, via ioctl(SIOCGIFMTU).
pub fn mtu(iface: &CStr) -> io::Result<i32> {
    query(iface, linux::SIOCGIFMTU, |ifr| unsafe {
        ifr.ifr_ifru.ifru_mtu
    })
}

fn query<T>(
    iface: &CStr,
    request: libc::c_ulong,
    read: impl FnOnce(&linux::ifreq) -> T,
) -> io::Result<T> {
    // This block is marked as unsafe because it uses FFI. The ifreq is
    // owned by this frame and outlives both calls that borrow it, and
    // every failure path closes the descriptor before returning.
    unsafe {
        let fd = libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0);
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let mut ifr = linux::ifreq_with_name(iface);
        let err = libc::ioctl(fd, request, &mut ifr);
        if err < 0 {
            let error = io::Error::last_os_error();
            libc::close(fd);
            return Err(error);
        }
        libc::close(fd);
        Ok(read(&ifr))
    }
}
