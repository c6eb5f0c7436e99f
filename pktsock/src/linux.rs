#![allow(non_camel_case_types)]

use libc;
use std::{ffi::CStr, mem::MaybeUninit, ptr};

pub(crate) const SIOCGIFINDEX: libc::c_ulong = 0x8933;
pub(crate) const SIOCGIFMTU: libc::c_ulong = 0x8921;
pub(crate) const SIOCGIFHWADDR: libc::c_ulong = 0x8927;

#[repr(C)]
pub(crate) union ifru {
    pub(crate) ifru_addr: libc::sockaddr,
    pub(crate) ifru_hwaddr: libc::sockaddr,
    pub(crate) ifru_flags: libc::c_short,
    pub(crate) ifru_ivalue: libc::c_int,
    pub(crate) ifru_mtu: libc::c_int,
}

#[repr(C)]
pub(crate) union ifrn {
    pub(crate) ifrn_name: [libc::c_char; libc::IFNAMSIZ],
}

#[repr(C)]
pub(crate) struct ifreq {
    pub(crate) ifr_ifrn: ifrn,
    pub(crate) ifr_ifru: ifru,
}

/// A zeroed `ifreq` carrying the interface name, truncated to IFNAMSIZ.
pub(crate) fn ifreq_with_name(iface: &CStr) -> ifreq {
    // Zeroing keeps the name nul-terminated when it is shorter than the
    // field; FFI callers only ever read the initialized prefix.
    unsafe {
        let mut ifr: ifreq = MaybeUninit::zeroed().assume_init();
        let len = iface.to_bytes_with_nul().len().min(libc::IFNAMSIZ);
        ptr::copy_nonoverlapping(iface.as_ptr(), ifr.ifr_ifrn.ifrn_name.as_mut_ptr(), len);
        ifr
    }
}
