#![cfg(target_os = "linux")]

// These tests open AF_PACKET sockets on the loopback interface, which
// needs CAP_NET_RAW, so they stay ignored by default. Run them with
// `--ignored` as root.

use neighsolv_packets as packets;
use pktsock::{BoundSocket, Filter, Socket};
use std::{ffi::CString, net::Ipv6Addr, sync::mpsc, thread, time::Duration};

const SRC_MAC: packets::MacAddr = packets::MacAddr {
    bytes: [2, 0, 0, 0, 0, 1],
};

fn test_solicit() -> packets::Ipv6Frame {
    let src: Ipv6Addr = "fe80::1".parse().unwrap();
    let target: Ipv6Addr = "fe80::2".parse().unwrap();
    packets::ndp::solicit(SRC_MAC, src, target)
}

fn recv_matching(
    socket: &mut BoundSocket,
    deadline: Duration,
    matches: impl Fn(&[u8]) -> bool,
) -> Option<Vec<u8>> {
    let mut buffer = vec![0u8; 4096];
    loop {
        if !socket.wait_readable(deadline).unwrap() {
            return None;
        }
        let len = socket.recv(&mut buffer).unwrap();
        if matches(&buffer[..len]) {
            return Some(buffer[..len].to_vec());
        }
    }
}

#[test]
#[ignore]
fn raw_loopback() {
    let timeout = Duration::from_secs(1);
    let iface_name = CString::new("lo").unwrap();

    let side_a = Socket::new(Filter::All).unwrap();
    let mut side_a = side_a.bind(&iface_name).unwrap();

    let side_b = Socket::new(Filter::All).unwrap();
    let (tx, rx) = mpsc::channel();

    let solicit = test_solicit();
    let expected = solicit.data.clone();

    let thread_b = thread::spawn(move || {
        let mut side_b = side_b.bind(&iface_name).unwrap();
        let frame = recv_matching(&mut side_b, timeout, |frame| {
            packets::ndp::parse(frame).map(|m| m.kind) == Some(packets::ndp::NdKind::Solicit)
        });
        tx.send(frame).unwrap();
    });

    // give side b a moment to bind before the frame hits the wire
    thread::sleep(Duration::from_millis(100));
    side_a.send(&solicit.data).unwrap();

    let frame = rx.recv_timeout(timeout * 2).unwrap().unwrap();
    assert_eq!(frame, expected);

    thread_b.join().unwrap();
}

#[test]
#[ignore]
fn cooked_loopback_strips_and_rebuilds_link_header() {
    let timeout = Duration::from_secs(1);
    let iface_name = CString::new("lo").unwrap();

    let send_side = Socket::new(Filter::EtherType(packets::IPV6_ETHER_TYPE)).unwrap();
    let mut send_side = send_side.bind(&iface_name).unwrap();

    let recv_side = Socket::new(Filter::EtherType(packets::IPV6_ETHER_TYPE)).unwrap();
    let (tx, rx) = mpsc::channel();

    let solicit = test_solicit();
    let expected = solicit.data[solicit.l3_offset..].to_vec();

    let thread_b = thread::spawn(move || {
        let mut recv_side = recv_side.bind(&iface_name).unwrap();
        let packet = recv_matching(&mut recv_side, timeout, |packet| {
            packets::ndp::parse_payload(packet).map(|m| m.kind)
                == Some(packets::ndp::NdKind::Solicit)
        });
        tx.send(packet).unwrap();
    });

    thread::sleep(Duration::from_millis(100));
    // cooked sockets take the network-layer payload only
    send_side.send(&solicit.data[solicit.l3_offset..]).unwrap();

    let packet = rx.recv_timeout(timeout * 2).unwrap().unwrap();
    assert_eq!(packet, expected);

    thread_b.join().unwrap();
}

#[test]
#[ignore]
fn vlan_tag_spliced_on_send() {
    let timeout = Duration::from_secs(1);
    let iface_name = CString::new("lo").unwrap();

    let mut send_side = Socket::new(Filter::All).unwrap();
    send_side.set_vlan(Some(100));
    let mut send_side = send_side.bind(&iface_name).unwrap();

    let recv_side = Socket::new(Filter::All).unwrap();
    let (tx, rx) = mpsc::channel();

    let solicit = test_solicit();

    let thread_b = thread::spawn(move || {
        let mut recv_side = recv_side.bind(&iface_name).unwrap();
        let frame = recv_matching(&mut recv_side, timeout, |frame| {
            packets::ethernet::vlan_tci(frame) == Some(100)
                && packets::ndp::parse(frame).map(|m| m.kind)
                    == Some(packets::ndp::NdKind::Solicit)
        });
        tx.send(frame).unwrap();
    });

    thread::sleep(Duration::from_millis(100));
    send_side.send(&solicit.data).unwrap();

    let frame = rx.recv_timeout(timeout * 2).unwrap().unwrap();
    assert_eq!(frame.len(), solicit.data.len() + 4);
    assert_eq!(
        packets::ethernet::network_payload(&frame),
        Some((packets::IPV6_ETHER_TYPE, 18))
    );

    thread_b.join().unwrap();
}
