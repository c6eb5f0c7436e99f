#![deny(missing_docs)]

use crate::linux;
use libc;
use std::{
    ffi::CStr,
    io,
    mem::{self, MaybeUninit},
    ptr,
    time::Duration,
};

/// Which frames the kernel should deliver to the socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
    /// A cooked socket carrying a single EtherType. The kernel strips the
    /// Ethernet header on receive and builds it on send, so buffers hold
    /// the network-layer payload only.
    EtherType(u16),
    /// A raw socket receiving every protocol, including tagged frames.
    /// Buffers hold full Ethernet frames in both directions.
    All,
}

impl Filter {
    fn socket_type(self) -> libc::c_int {
        match self {
            Filter::EtherType(_) => libc::SOCK_DGRAM,
            Filter::All => libc::SOCK_RAW,
        }
    }

    /// The protocol in network byte order, as socket(2) and sockaddr_ll
    /// want it.
    fn protocol_be(self) -> u16 {
        match self {
            Filter::EtherType(ether_type) => ether_type.to_be(),
            Filter::All => (libc::ETH_P_ALL as u16).to_be(),
        }
    }
}

/// Represents an unbound `AF_PACKET` socket.  At this phase of a socket's
/// lifecycle, it can be configured.
pub struct Socket {
    fd: libc::c_int,
    protocol_be: u16,
    vlan: Option<u16>,
}

/// Represents a bound `AF_PACKET` socket. At this phase of a socket's
/// lifecycle, it can be read to/written from.
pub struct BoundSocket {
    fd: libc::c_int,
    send_addr: libc::sockaddr_ll,
    vlan: Option<u16>,
}

impl Socket {
    /// Creates a new unbound socket delivering the frames `filter` names.
    pub fn new(filter: Filter) -> io::Result<Self> {
        // This block must be marked as unsafe because it uses FFI with C
        // code. We believe the code in this block to be safe because it
        // does not interact with any memory owned by Rust code, nor does
        // it violate the invariant of the Socket type -- namely, that it
        // return an Err if it fails to initialize.
        let protocol_be = filter.protocol_be();
        let fd = unsafe {
            // man 7 packet
            let fd = libc::socket(
                libc::AF_PACKET,
                filter.socket_type(),
                protocol_be as libc::c_int,
            );
            if fd < 0 {
                return Err(io::Error::last_os_error());
            }
            fd
        };
        Ok(Self {
            fd,
            protocol_be,
            vlan: None,
        })
    }

    /// Configures an 802.1Q tag control value to splice into every frame
    /// sent through the bound socket. Only meaningful with `Filter::All`,
    /// where outgoing buffers carry the full Ethernet header.
    pub fn set_vlan(&mut self, vlan: Option<u16>) {
        self.vlan = vlan;
    }

    /// Binds the socket to a network interface. This function consumes the
    /// `Socket` instance, as no more configuration options may be safely
    /// changed.
    pub fn bind(self, iface: impl AsRef<CStr>) -> io::Result<BoundSocket> {
        // This block is marked as unsafe because it uses FFI, however, we
        // believe it to be safe because 1) it handles FFI failures in
        // accordance with the bound API's conventions, and 2) it safely
        // borrows the &CStr passed in.
        let send_addr = unsafe {
            // ioctl(SIOCGIFINDEX) fills in the index field of the ifreq
            // object. man 7 netdevice
            let mut ifr = linux::ifreq_with_name(iface.as_ref());
            let err = libc::ioctl(self.fd, linux::SIOCGIFINDEX, &mut ifr);
            if err < 0 {
                return Err(io::Error::last_os_error());
            }

            // man 7 packet regarding sockaddr_ll. The halen/addr pair is
            // what a cooked send uses to build the destination MAC, so
            // frames without an explicit recipient go to broadcast.
            let mut ll: libc::sockaddr_ll = MaybeUninit::zeroed().assume_init();
            ll.sll_family = libc::AF_PACKET as libc::c_ushort;
            ll.sll_protocol = self.protocol_be;
            ll.sll_ifindex = ifr.ifr_ifru.ifru_ivalue; // expanded from `ifr_ifindex` in kernel headers
            ll.sll_halen = 6;
            ll.sll_addr[..6].copy_from_slice(&[0xff; 6]);
            let err = libc::bind(
                self.fd,
                &mut ll as *mut _ as *mut libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::c_uint,
            );
            if err < 0 {
                return Err(io::Error::last_os_error());
            }
            ll
        };
        let fd = self.fd;
        let vlan = self.vlan;
        // This ensures that `self` does not attempt to close the file
        // descriptor, as the file descriptor is transferred to the
        // BoundSocket we're returning. This doesn't cause any resource
        // leaks since the stack-bound `self` is consumed and deallocated
        // in `mem::forget`.
        mem::forget(self);
        Ok(BoundSocket {
            fd,
            send_addr,
            vlan,
        })
    }
}

impl BoundSocket {
    /// Sends a frame to the NIC, splicing in the configured 802.1Q tag
    /// when one was set before binding.
    pub fn send(&mut self, frame: &[u8]) -> io::Result<usize> {
        match self.vlan {
            Some(tci) => {
                let tagged = splice_vlan_tag(frame, tci);
                self.send_raw(&tagged)
            }
            None => self.send_raw(frame),
        }
    }

    fn send_raw(&mut self, frame: &[u8]) -> io::Result<usize> {
        // This block is marked as unsafe because it uses FFI. We believe
        // this code to be safe, because it safely borrows the Rust-owned
        // frame and passes the length of the frame to the libc function,
        // so it should not exhibit any C-side undefined behaviour.
        unsafe {
            let bytes = libc::sendto(
                self.fd,
                frame.as_ptr() as *const _,
                frame.len(),
                0,
                &self.send_addr as *const _ as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            );
            if bytes < 0 {
                Err(io::Error::last_os_error())
            } else {
                Ok(bytes as usize)
            }
        }
    }

    /// Receives one frame from the NIC into `frame`, returning the number
    /// of bytes the kernel delivered.
    pub fn recv(&mut self, frame: &mut [u8]) -> io::Result<usize> {
        // Note comment in `send_raw`.
        unsafe {
            let bytes = libc::recvfrom(
                self.fd,
                frame.as_mut_ptr() as *mut _,
                frame.len(),
                0,
                ptr::null_mut(),
                ptr::null_mut(),
            );
            if bytes < 0 {
                Err(io::Error::last_os_error())
            } else {
                Ok(bytes as usize)
            }
        }
    }

    /// Waits up to `timeout` for the socket to become readable. Ok(true)
    /// means a recv will not block; Ok(false) means the timeout passed
    /// first.
    pub fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        let mut pollfd = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = timeout.as_millis().min(libc::c_int::max_value() as u128) as libc::c_int;
        // Note comment in `send_raw`.
        let ready = unsafe { libc::poll(&mut pollfd, 1, millis) };
        if ready < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(ready > 0)
    }
}

/// A copy of `frame` with the 802.1Q tag inserted after the MAC pair.
fn splice_vlan_tag(frame: &[u8], tci: u16) -> Vec<u8> {
    const VLAN_TPID: u16 = 0x8100;
    let mut tagged = Vec::with_capacity(frame.len() + 4);
    tagged.extend_from_slice(&frame[..12]);
    tagged.extend_from_slice(&VLAN_TPID.to_be_bytes());
    tagged.extend_from_slice(&tci.to_be_bytes());
    tagged.extend_from_slice(&frame[12..]);
    tagged
}

impl Drop for Socket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

impl Drop for BoundSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vlan_tag_goes_after_mac_pair() {
        let mut frame = vec![0u8; 16];
        for (i, byte) in frame.iter_mut().enumerate() {
            *byte = i as u8;
        }
        let tagged = splice_vlan_tag(&frame, 0x0123);
        assert_eq!(&tagged[..12], &frame[..12]);
        assert_eq!(&tagged[12..16], &[0x81, 0x00, 0x01, 0x23]);
        assert_eq!(&tagged[16..], &frame[12..]);
    }
}
