// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use std::net::Ipv4Addr;

use rgtb_protocols::arp::ArpOperation;
use rgtb_protocols::ethernet::{MIN_FRAME_LEN, MacAddr};
use rgtb_protocols::frame::Frame;
use rgtb_protocols::gmii::GmiiFrame;
use rgtb_protocols::packet::{ArpFrameFields, Packet, UdpFrameFields};
use rgtb_protocols::pcap::{PcapWriter, read_records};

fn test_frame_fields(payload: Vec<u8>) -> UdpFrameFields {
    UdpFrameFields {
        eth_dst: "02:00:00:00:00:00".parse().unwrap(),
        eth_src: "5a:51:52:53:54:55".parse().unwrap(),
        ip_src: Ipv4Addr::new(192, 168, 1, 100),
        ip_dst: Ipv4Addr::new(192, 168, 1, 128),
        src_port: 5678,
        dst_port: 1234,
        payload,
    }
}

#[test]
fn udp_round_trip() {
    for len in [0, 1, 18, 909, 1472] {
        let payload: Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
        let packet = Packet::udp(test_frame_fields(payload));
        let bytes = packet.build().unwrap();
        assert_eq!(Packet::parse(&bytes).unwrap(), packet);
    }
}

#[test]
fn arp_round_trip() {
    for op in [ArpOperation::Request, ArpOperation::Reply] {
        let packet = Packet::arp(ArpFrameFields {
            eth_dst: MacAddr::BROADCAST,
            eth_src: MacAddr::new(2, 0, 0, 0, 0, 0),
            op,
            sha: MacAddr::new(2, 0, 0, 0, 0, 0),
            spa: Ipv4Addr::new(192, 168, 1, 128),
            tha: MacAddr::ZERO,
            tpa: Ipv4Addr::new(192, 168, 1, 100),
        });
        let bytes = packet.build().unwrap();
        assert_eq!(Packet::parse(&bytes).unwrap(), packet);
    }
}

#[test]
fn short_udp_frame_through_gmii() {
    // A small payload is padded on the wire and the padding is ignored when
    // the frame is decoded again.
    let packet = Packet::udp(test_frame_fields(vec![1, 2, 3, 4]));
    let frame = Frame::from_packet(&packet).unwrap();
    let wire = GmiiFrame::from_payload(frame.bytes());

    let received = Frame::new(wire.payload().unwrap().to_vec());
    assert_eq!(received.len(), MIN_FRAME_LEN);
    assert_ne!(received, frame);
    assert_eq!(received.packet().unwrap(), &packet);
}

#[test]
fn corrupted_payload_detected() {
    let packet = Packet::udp(test_frame_fields(vec![0xaa; 32]));
    let mut bytes = packet.build().unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    let err = Packet::parse(&bytes).unwrap_err();
    assert!(err.0.starts_with("bad UDP checksum"), "{err}");
}

#[test]
fn truncated_frames_are_errors() {
    let bytes = Packet::udp(test_frame_fields(vec![5; 40])).build().unwrap();
    for len in [0, 13, 14, 33, 41, 60] {
        assert!(Packet::parse(&bytes[..len]).is_err(), "length {len}");
    }
}

#[test]
fn capture_file_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.pcap");

    let frame = Frame::from_packet(&Packet::udp(test_frame_fields(vec![9; 20]))).unwrap();
    let mut writer = PcapWriter::create(&path).unwrap();
    writer.write_record(8_000, frame.bytes()).unwrap();
    writer.finish().unwrap();

    let records = read_records(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].time_ps, 8_000);
    assert_eq!(Frame::new(records[0].data.clone()), frame);
}
