// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use std::cell::RefCell;
use std::net::Ipv4Addr;
use std::rc::Rc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rgtb_engine::engine::Engine;
use rgtb_engine::events::once::Once;
use rgtb_engine::test_helpers::start_test;
use rgtb_engine::types::SimError;
use rgtb_models::clock_reset::{ClockResetSequencer, DEFAULT_CLK_PERIOD_PS};
use rgtb_models::dut::DutPorts;
use rgtb_models::fpga_core::{Fault, FpgaCore, FpgaCoreConfig};
use rgtb_models::golden::{DEFAULT_MATRIX_RANGE, TestVectors};
use rgtb_models::rgmii::{RgmiiPhy, Speed};
use rgtb_protocols::arp::{ArpOperation, PTYPE_IPV4};
use rgtb_protocols::ethernet::MacAddr;
use rgtb_protocols::gmii::GmiiFrame;
use rgtb_protocols::packet::{ArpFrameFields, Packet, UdpFrameFields};

const HOST_MAC: MacAddr = MacAddr::new(0x5a, 0x51, 0x52, 0x53, 0x54, 0x55);
const HOST_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 100);
const TIMEOUT_PS: u64 = 100_000 * DEFAULT_CLK_PERIOD_PS;

struct Bench {
    engine: Engine,
    sequencer: Rc<ClockResetSequencer>,
    phy: RgmiiPhy,
    core: Rc<FpgaCore>,
    config: FpgaCoreConfig,
}

fn bench(file: &str, speed: Speed, fault: Fault) -> Bench {
    let engine = start_test(file);
    let top = engine.top().clone();
    let ports = DutPorts::new(&engine, &top);
    ports.set_idle_inputs();
    let sequencer = ClockResetSequencer::new_and_register(
        &engine,
        &top,
        &ports.clk,
        &ports.clk90,
        &ports.rst,
        DEFAULT_CLK_PERIOD_PS,
    );
    let phy = RgmiiPhy::new_and_register(
        &engine,
        &top,
        "phy0",
        ports.phy0.tx_bus().unwrap(),
        ports.phy0.rx_bus().unwrap(),
        speed,
    );
    let config = FpgaCoreConfig {
        speed,
        fault,
        ..FpgaCoreConfig::default()
    };
    let core = FpgaCore::new_and_register(&engine, &top, &ports, config.clone()).unwrap();
    Bench {
        engine,
        sequencer,
        phy,
        core,
        config,
    }
}

fn to_wire(packet: &Packet) -> GmiiFrame {
    GmiiFrame::from_payload(&packet.build().unwrap())
}

fn from_wire(frame: &GmiiFrame) -> Result<Packet, SimError> {
    let payload = frame
        .payload()
        .map_err(|e| SimError(format!("framing: {e}")))?;
    Ok(Packet::parse(payload)?)
}

fn request(config: &FpgaCoreConfig, payload: Vec<u8>) -> Packet {
    Packet::udp(UdpFrameFields {
        eth_dst: config.mac,
        eth_src: HOST_MAC,
        ip_src: HOST_IP,
        ip_dst: config.ip,
        src_port: 5678,
        dst_port: config.port,
        payload,
    })
}

fn arp_reply(config: &FpgaCoreConfig) -> Packet {
    Packet::arp(ArpFrameFields {
        eth_dst: config.mac,
        eth_src: HOST_MAC,
        op: ArpOperation::Reply,
        sha: HOST_MAC,
        spa: HOST_IP,
        tha: config.mac,
        tpa: config.ip,
    })
}

/// Run the request/ARP/reply exchange and then repeat the request. Returns
/// every packet received from the device.
fn exchange(mut bench: Bench, payload: Vec<u8>) -> (Bench, Vec<Packet>) {
    let received = Rc::new(RefCell::new(Vec::new()));
    let done = Once::default();
    {
        let received = received.clone();
        let done = done.clone();
        let sequencer = bench.sequencer.clone();
        let source = bench.phy.source.clone();
        let sink = bench.phy.sink.clone();
        let config = bench.config.clone();
        let timer = bench.engine.timer();
        bench.engine.spawn(async move {
            sequencer.sequence_reset().await?;
            source.send(to_wire(&request(&config, payload.clone())));

            let arp = sink.recv_timeout(&timer, TIMEOUT_PS).await?;
            let Some(arp) = arp else { return done.notify() };
            received.borrow_mut().push(from_wire(&arp)?);

            source.send(to_wire(&arp_reply(&config)));
            let Some(reply) = sink.recv_timeout(&timer, TIMEOUT_PS).await? else {
                return done.notify();
            };
            received.borrow_mut().push(from_wire(&reply)?);

            source.send(to_wire(&request(&config, payload)));
            if let Some(reply) = sink.recv_timeout(&timer, TIMEOUT_PS).await? {
                received.borrow_mut().push(from_wire(&reply)?);
            }
            done.notify()
        });
    }
    bench.engine.run_until(Box::new(done)).unwrap();
    let packets = received.take();
    (bench, packets)
}

fn vectors() -> TestVectors {
    let mut rng = StdRng::seed_from_u64(7);
    TestVectors::generate(&mut rng, 0..=255)
}

fn check_offload(speed: Speed) {
    let vectors = vectors();
    let expected = vectors.expected_result().unwrap();
    let bench = bench(file!(), speed, Fault::None);
    let (bench, packets) = exchange(bench, vectors.payload_stream());
    let config = &bench.config;
    assert_eq!(packets.len(), 3);

    let arp = packets[0].as_arp().expect("ARP request");
    assert!(arp.eth.dst.is_broadcast());
    assert_eq!(arp.eth.src, config.mac);
    assert_eq!(arp.arp.op, ArpOperation::Request);
    assert_eq!(arp.arp.ptype, PTYPE_IPV4);
    assert_eq!(arp.arp.sha, config.mac);
    assert_eq!(arp.arp.spa, config.ip);
    assert_eq!(arp.arp.tha, MacAddr::ZERO);
    assert_eq!(arp.arp.tpa, HOST_IP);

    for reply in &packets[1..] {
        let udp = reply.as_udp().expect("UDP reply");
        assert_eq!(udp.eth.dst, HOST_MAC);
        assert_eq!(udp.eth.src, config.mac);
        assert_eq!(udp.ip.src, config.ip);
        assert_eq!(udp.ip.dst, HOST_IP);
        assert_eq!(udp.udp.src_port, config.port);
        assert_eq!(udp.udp.dst_port, 5678);
        assert_eq!(udp.payload, expected.as_bytes());
    }
    assert_eq!(bench.core.arp_cache_len(), 1);
}

#[test]
fn offload_1000() {
    check_offload(Speed::Mbps1000);
}

#[test]
fn offload_100() {
    check_offload(Speed::Mbps100);
}

#[test]
fn constant_matrix() {
    let mut rng = StdRng::seed_from_u64(1);
    let vectors = TestVectors::generate(&mut rng, DEFAULT_MATRIX_RANGE);
    let expected = vectors.expected_result().unwrap();
    let (_bench, packets) = exchange(
        bench(file!(), Speed::Mbps1000, Fault::None),
        vectors.payload_stream(),
    );
    let result = &packets[1].as_udp().unwrap().payload;
    assert_eq!(result.len(), 100);
    assert_eq!(result, expected.as_bytes());
    // Every window holds the same values so every cell is the same
    assert!(result.iter().all(|cell| *cell == result[0]));
}

#[test]
fn silent_device() {
    let (bench, packets) = exchange(
        bench(file!(), Speed::Mbps1000, Fault::Silent),
        vectors().payload_stream(),
    );
    assert!(packets.is_empty());
    assert_eq!(bench.phy.sink.frames_received(), 0);
}

#[test]
fn corrupt_result() {
    let vectors = vectors();
    let expected = vectors.expected_result().unwrap();
    let (_bench, packets) = exchange(
        bench(file!(), Speed::Mbps1000, Fault::CorruptResult),
        vectors.payload_stream(),
    );
    let result = &packets[1].as_udp().unwrap().payload;
    assert_eq!(result[0], !expected.as_bytes()[0]);
    assert_eq!(result[1..], expected.as_bytes()[1..]);
}

#[test]
fn corrupt_second_result() {
    let vectors = vectors();
    let expected = vectors.expected_result().unwrap();
    let (bench, packets) = exchange(
        bench(file!(), Speed::Mbps1000, Fault::CorruptSecondResult),
        vectors.payload_stream(),
    );
    assert_eq!(packets[1].as_udp().unwrap().payload, expected.as_bytes());
    let second = &packets[2].as_udp().unwrap().payload;
    assert_eq!(second[0], !expected.as_bytes()[0]);
    assert_eq!(second[1..], expected.as_bytes()[1..]);
    assert_eq!(bench.core.results_computed(), 2);
}

#[test]
fn swapped_ports() {
    let (bench, packets) = exchange(
        bench(file!(), Speed::Mbps1000, Fault::SwappedPorts),
        vectors().payload_stream(),
    );
    let udp = packets[1].as_udp().unwrap();
    assert_eq!(udp.udp.src_port, 5678);
    assert_eq!(udp.udp.dst_port, bench.config.port);
}

#[test]
fn fault_names() {
    assert_eq!("bad-fcs".parse::<Fault>().unwrap(), Fault::BadFcs);
    assert_eq!(
        "truncated-result".parse::<Fault>().unwrap(),
        Fault::TruncatedResult
    );
    let err = "loud".parse::<Fault>().unwrap_err();
    assert!(err.0.contains("unknown fault 'loud'"));
}

#[test]
fn bad_arp_request() {
    let (_bench, packets) = exchange(
        bench(file!(), Speed::Mbps1000, Fault::BadArpRequest),
        vectors().payload_stream(),
    );
    assert_ne!(packets[0].as_arp().unwrap().arp.ptype, PTYPE_IPV4);
}

#[test]
fn answers_arp_request() {
    let mut bench = bench(file!(), Speed::Mbps1000, Fault::None);
    let received = Rc::new(RefCell::new(None));
    let done = Once::default();
    {
        let received = received.clone();
        let done = done.clone();
        let sequencer = bench.sequencer.clone();
        let source = bench.phy.source.clone();
        let sink = bench.phy.sink.clone();
        let config = bench.config.clone();
        bench.engine.spawn(async move {
            sequencer.sequence_reset().await?;
            source.send(to_wire(&Packet::arp(ArpFrameFields {
                eth_dst: MacAddr::BROADCAST,
                eth_src: HOST_MAC,
                op: ArpOperation::Request,
                sha: HOST_MAC,
                spa: HOST_IP,
                tha: MacAddr::ZERO,
                tpa: config.ip,
            })));
            let reply = sink.recv().await?;
            *received.borrow_mut() = Some(from_wire(&reply)?);
            done.notify()
        });
    }
    bench.engine.run_until(Box::new(done)).unwrap();

    let packet = received.take().unwrap();
    let arp = packet.as_arp().unwrap();
    assert_eq!(arp.eth.dst, HOST_MAC);
    assert_eq!(arp.arp.op, ArpOperation::Reply);
    assert_eq!(arp.arp.sha, bench.config.mac);
    assert_eq!(arp.arp.spa, bench.config.ip);
    assert_eq!(arp.arp.tha, HOST_MAC);
    assert_eq!(arp.arp.tpa, HOST_IP);
    // Answering a request does not teach the device anything
    assert_eq!(bench.core.arp_cache_len(), 0);
}
