mod types;
pub use self::types::*;

pub mod checksum;

pub mod ethernet;

mod ipv6;
pub use self::ipv6::*;

mod icmpv6;
pub use self::icmpv6::{ICMPV6_ECHO_REPLY, ICMPV6_ECHO_REQUEST};

mod tcp;

pub mod ndp;

pub mod arp;
pub use self::arp::ArpFrame;
