// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The correlation offload test.
//!
//! The scenario plays the part of a host on PHY 0:
//!
//! ```text
//!  Init -> Reset -> SendData -> AwaitArpRequest -> SendArpReply
//!       -> AwaitResult -> Validate -> RepeatRoundTrip -> Done
//! ```
//!
//! It sends a UDP request holding a kernel and the windows of a matrix,
//! expects the device to resolve the host's address with ARP, answers it and
//! then checks the UDP reply against the golden model. The request is then
//! repeated, without ARP, and the reply checked again.

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rgtb_engine::engine::Engine;
use rgtb_engine::events::once::Once;
use rgtb_engine::signal::Signal;
use rgtb_engine::time::timer::Timer;
use rgtb_engine::traits::Runnable;
use rgtb_engine::types::{SimError, SimResult};
use rgtb_models::clock_reset::ClockResetSequencer;
use rgtb_models::golden::{ByteMatrix, TestVectors};
use rgtb_models::rgmii::sink::RgmiiSink;
use rgtb_models::rgmii::source::RgmiiSource;
use rgtb_models::rgmii::{RgmiiPhy, Speed};
use rgtb_protocols::arp::{ArpOperation, HTYPE_ETHERNET, PTYPE_IPV4};
use rgtb_protocols::ethernet::{EtherType, MAC_BYTES, MacAddr};
use rgtb_protocols::frame::Frame;
use rgtb_protocols::gmii::GmiiFrame;
use rgtb_protocols::packet::{ArpFrameFields, Packet, UdpFrameFields};
use rgtb_track::entity::Entity;
use rgtb_track::{debug, error, info, trace, warn};

use crate::config::TestbenchConfig;
use crate::failure::TbFailure;
use crate::packet_log::{Direction, PacketLog};

/// Number of times the request is sent.
pub const ROUNDS: usize = 2;

/// Clock cycles to let the device settle after the last check.
const DRAIN_CYCLES: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScenarioState {
    Init,
    Reset,
    SendData,
    AwaitArpRequest,
    SendArpReply,
    AwaitResult,
    Validate,
    RepeatRoundTrip,
    Done,
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Summary of a passing run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub seed: u64,
    pub speed: Speed,
    pub rounds: usize,
    pub frames_sent: usize,
    pub frames_received: usize,
    pub result: ByteMatrix,
    pub elapsed_ps: u64,
    /// Capture file and the number of frames written to it.
    pub capture: Option<(PathBuf, usize)>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "PASS: seed {} at {}, {} rounds in {:.3}ns",
            self.seed,
            self.speed,
            self.rounds,
            self.elapsed_ps as f64 / 1000.0
        )?;
        writeln!(
            f,
            "{} frames sent, {} frames received",
            self.frames_sent, self.frames_received
        )?;
        if let Some((path, num_frames)) = &self.capture {
            writeln!(f, "{num_frames} frames captured in {}", path.display())?;
        }
        write!(f, "result:\n{}", self.result)
    }
}

fn check<T>(check: &str, expected: T, actual: T, frame: &Frame) -> Result<(), TbFailure>
where
    T: PartialEq + fmt::Debug,
{
    if expected == actual {
        Ok(())
    } else {
        Err(TbFailure::protocol(check, expected, actual, frame.bytes()))
    }
}

pub struct ConvScenario {
    pub entity: Arc<Entity>,
    config: TestbenchConfig,
    timer: Timer,
    clk: Signal,
    sequencer: Rc<ClockResetSequencer>,
    source: Rc<RgmiiSource>,
    sink: Rc<RgmiiSink>,
    vectors: TestVectors,
    expected: ByteMatrix,
    packet_log: RefCell<PacketLog>,
    state: Cell<ScenarioState>,
    history: RefCell<Vec<ScenarioState>>,
    verdict: RefCell<Option<Result<Report, TbFailure>>>,
    done: Once<()>,
}

impl ConvScenario {
    /// Create the scenario, driving the device through `phy`.
    pub fn new_and_register(
        engine: &Engine,
        parent: &Arc<Entity>,
        config: TestbenchConfig,
        clk: &Signal,
        sequencer: Rc<ClockResetSequencer>,
        phy: &RgmiiPhy,
    ) -> Result<Rc<Self>, SimError> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let vectors = TestVectors::generate(&mut rng, config.matrix_range.clone());
        let expected = vectors.expected_result()?;

        let rc_self = Rc::new(Self {
            entity: Arc::new(Entity::new(parent, "scenario")),
            config,
            timer: engine.timer(),
            clk: clk.clone(),
            sequencer,
            source: phy.source.clone(),
            sink: phy.sink.clone(),
            vectors,
            expected,
            packet_log: RefCell::new(PacketLog::default()),
            state: Cell::new(ScenarioState::Init),
            history: RefCell::new(vec![ScenarioState::Init]),
            verdict: RefCell::new(None),
            done: Once::default(),
        });
        engine.register(rc_self.clone());
        Ok(rc_self)
    }

    /// Fires when the scenario has passed.
    #[must_use]
    pub fn done(&self) -> Once<()> {
        self.done.clone()
    }

    #[must_use]
    pub fn state(&self) -> ScenarioState {
        self.state.get()
    }

    /// Every state entered so far, starting with `Init`.
    #[must_use]
    pub fn history(&self) -> Vec<ScenarioState> {
        self.history.borrow().clone()
    }

    #[must_use]
    pub fn vectors(&self) -> &TestVectors {
        &self.vectors
    }

    #[must_use]
    pub fn packet_log(&self) -> Ref<'_, PacketLog> {
        self.packet_log.borrow()
    }

    /// The outcome, once the scenario has finished.
    pub fn take_verdict(&self) -> Option<Result<Report, TbFailure>> {
        self.verdict.borrow_mut().take()
    }

    /// Write the packet log to the configured capture file, if any.
    pub fn write_capture(&self) -> Result<Option<(PathBuf, usize)>, TbFailure> {
        let Some(path) = &self.config.capture_file else {
            return Ok(None);
        };
        let num_frames = self.packet_log.borrow().write_pcap(path)?;
        info!(self.entity ; "wrote {num_frames} frames to {}", path.display());
        Ok(Some((path.clone(), num_frames)))
    }

    fn enter(&self, next: ScenarioState) {
        info!(self.entity ; "{} -> {next}", self.state.get());
        self.state.set(next);
        self.history.borrow_mut().push(next);
    }

    fn request_fields(&self) -> UdpFrameFields {
        let (host, device) = (&self.config.host, &self.config.device);
        UdpFrameFields {
            eth_dst: device.mac,
            eth_src: host.mac,
            ip_src: host.ip,
            ip_dst: device.ip,
            src_port: host.port,
            dst_port: device.port,
            payload: self.vectors.payload_stream(),
        }
    }

    fn arp_reply(&self) -> Packet {
        let (host, device) = (&self.config.host, &self.config.device);
        Packet::arp(ArpFrameFields {
            eth_dst: device.mac,
            eth_src: host.mac,
            op: ArpOperation::Reply,
            sha: host.mac,
            spa: host.ip,
            tha: device.mac,
            tpa: device.ip,
        })
    }

    fn send(&self, frame: &Frame) {
        debug!(self.entity ; "send {frame}");
        self.packet_log
            .borrow_mut()
            .record(self.timer.now_ps(), Direction::ToDevice, frame.bytes());
        self.source.send(GmiiFrame::from_payload(frame.bytes()));
    }

    /// Wait for the next frame from the device and strip its framing.
    async fn receive(&self, waiting_for: &str) -> Result<Frame, TbFailure> {
        let timeout_ps = self.config.timeout_ps();
        let Some(gmii) = self.sink.recv_timeout(&self.timer, timeout_ps).await? else {
            return Err(TbFailure::Timeout {
                waiting_for: waiting_for.to_string(),
                cycles: self.config.timeout_cycles,
            });
        };

        let now_ps = self.timer.now_ps();
        match gmii.payload() {
            Ok(bytes) => {
                self.packet_log
                    .borrow_mut()
                    .record(now_ps, Direction::FromDevice, bytes);
                let frame = Frame::new(bytes.to_vec());
                debug!(self.entity ; "received {frame}");
                Ok(frame)
            }
            Err(e) => {
                self.packet_log
                    .borrow_mut()
                    .record(now_ps, Direction::FromDevice, &gmii.data);
                Err(TbFailure::parse(waiting_for, e, &gmii.data))
            }
        }
    }

    fn parse<'a>(&self, frame: &'a Frame, waiting_for: &str) -> Result<&'a Packet, TbFailure> {
        frame
            .packet()
            .map_err(|e| TbFailure::parse(waiting_for, &e.0, frame.bytes()))
    }

    fn check_arp_request(&self, frame: &Frame) -> Result<(), TbFailure> {
        let (host, device) = (&self.config.host, &self.config.device);
        let packet = self.parse(frame, "ARP request")?;
        check("destination MAC", MacAddr::BROADCAST, packet.eth().dst, frame)?;
        check("source MAC", device.mac, packet.eth().src, frame)?;
        let Some(arp) = packet.as_arp() else {
            return Err(TbFailure::protocol(
                "EtherType",
                EtherType::Arp,
                packet.eth().ether_type,
                frame.bytes(),
            ));
        };
        let body = &arp.arp;
        check("ARP htype", HTYPE_ETHERNET, body.htype, frame)?;
        check("ARP ptype", PTYPE_IPV4, body.ptype, frame)?;
        check("ARP hlen", MAC_BYTES as u8, body.hlen, frame)?;
        check("ARP plen", 4, body.plen, frame)?;
        check("ARP operation", ArpOperation::Request, body.op, frame)?;
        check("ARP sender MAC", device.mac, body.sha, frame)?;
        check("ARP sender IP", device.ip, body.spa, frame)?;
        check("ARP target MAC", MacAddr::ZERO, body.tha, frame)?;
        check("ARP target IP", host.ip, body.tpa, frame)?;
        trace!(self.entity ; "ARP request valid");
        Ok(())
    }

    /// Check the addressing of a reply and return its payload.
    fn check_reply<'a>(&self, frame: &'a Frame) -> Result<&'a [u8], TbFailure> {
        let packet = self.parse(frame, "UDP result")?;
        let expected = self.request_fields().reversed(Vec::new());
        let Some(udp) = packet.as_udp() else {
            return Err(TbFailure::protocol(
                "EtherType",
                EtherType::Ipv4,
                packet.eth().ether_type,
                frame.bytes(),
            ));
        };
        check("destination MAC", expected.eth_dst, udp.eth.dst, frame)?;
        check("source MAC", expected.eth_src, udp.eth.src, frame)?;
        check("source IP", expected.ip_src, udp.ip.src, frame)?;
        check("destination IP", expected.ip_dst, udp.ip.dst, frame)?;
        check("source port", expected.src_port, udp.udp.src_port, frame)?;
        check("destination port", expected.dst_port, udp.udp.dst_port, frame)?;
        Ok(&udp.payload)
    }

    fn check_payload(&self, round: usize, payload: &[u8]) -> Result<(), TbFailure> {
        let expected = self.expected.as_bytes();
        if payload != expected {
            return Err(TbFailure::Payload {
                round,
                expected: expected.to_vec(),
                actual: payload.to_vec(),
            });
        }
        info!(self.entity ; "round {round}: result matches");
        Ok(())
    }

    async fn execute(&self) -> Result<Report, TbFailure> {
        let start_ps = self.timer.now_ps();

        self.enter(ScenarioState::Reset);
        self.sequencer.sequence_reset().await?;

        self.enter(ScenarioState::SendData);
        let request = Frame::from_packet(&Packet::udp(self.request_fields()))?;
        debug!(self.entity ; "kernel:\n{}", self.vectors.kernel);
        debug!(self.entity ; "matrix:\n{}", self.vectors.matrix);
        self.send(&request);

        self.enter(ScenarioState::AwaitArpRequest);
        let arp_request = self.receive("ARP request").await?;
        self.check_arp_request(&arp_request)?;

        self.enter(ScenarioState::SendArpReply);
        self.send(&Frame::from_packet(&self.arp_reply())?);

        self.enter(ScenarioState::AwaitResult);
        let reply = self.receive("UDP result").await?;
        let payload = self.check_reply(&reply)?;

        self.enter(ScenarioState::Validate);
        self.check_payload(1, payload)?;

        self.enter(ScenarioState::RepeatRoundTrip);
        self.send(&request);
        let reply = self.receive("repeated UDP result").await?;
        let payload = self.check_reply(&reply)?;
        self.check_payload(ROUNDS, payload)?;

        self.enter(ScenarioState::Done);
        for _ in 0..DRAIN_CYCLES {
            self.clk.rising_edge().await;
        }

        let log = self.packet_log.borrow();
        Ok(Report {
            seed: self.config.seed,
            speed: self.config.speed,
            rounds: ROUNDS,
            frames_sent: log.count(Direction::ToDevice),
            frames_received: log.count(Direction::FromDevice),
            result: self.expected.clone(),
            elapsed_ps: self.timer.now_ps() - start_ps,
            capture: None,
        })
    }

    /// Write the capture whatever the outcome. A capture that cannot be
    /// written fails an otherwise passing run.
    fn finish(&self, verdict: Result<Report, TbFailure>) -> Result<Report, TbFailure> {
        let capture = self.write_capture();
        match (verdict, capture) {
            (Ok(mut report), Ok(capture)) => {
                report.capture = capture;
                Ok(report)
            }
            (Ok(_), Err(failure)) => Err(failure),
            (Err(failure), Ok(_)) => Err(failure),
            (Err(failure), Err(capture_failure)) => {
                warn!(self.entity ; "{capture_failure}");
                Err(failure)
            }
        }
    }
}

#[async_trait(?Send)]
impl Runnable for ConvScenario {
    async fn run(&self) -> SimResult {
        let verdict = self.execute().await;
        let verdict = self.finish(verdict);
        let failure = verdict.as_ref().err().cloned();
        *self.verdict.borrow_mut() = Some(verdict);

        match failure {
            None => {
                info!(self.entity ; "pass at {:.3}ns", self.timer.now_ns());
                self.done.notify()
            }
            Some(failure) => {
                error!(self.entity ; "failed in state {}: {failure}", self.state.get());
                Err(failure.into())
            }
        }
    }
}
