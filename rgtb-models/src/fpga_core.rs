// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Behavioural model of the correlation offload device.
//!
//! The model answers ARP requests for its own address, resolves the sender
//! of each request with ARP and replies to UDP requests on its port with the
//! correlation of the windows in the request payload. It stands in for the
//! real design so that the testbench can be exercised without an HDL
//! simulator. Faults can be injected to check that the testbench catches
//! them.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use rgtb_engine::engine::Engine;
use rgtb_engine::traits::Runnable;
use rgtb_engine::types::{SimError, SimResult};
use rgtb_protocols::arp::ArpOperation;
use rgtb_protocols::ethernet::MacAddr;
use rgtb_protocols::frame::Frame;
use rgtb_protocols::gmii::GmiiFrame;
use rgtb_protocols::packet::{ArpFrameFields, Packet, UdpFrameFields, UdpPacket};
use rgtb_track::entity::Entity;
use rgtb_track::{debug, info, trace, warn};

use crate::dut::DutPorts;
use crate::golden::{KERNEL_DIM, correlate_windows};
use crate::rgmii::Speed;
use crate::rgmii::sink::RgmiiSink;
use crate::rgmii::source::{Clocking, RgmiiSource};

/// Deliberate misbehaviour used to test the testbench.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Fault {
    #[default]
    None,
    /// Never transmit anything.
    Silent,
    /// Invert the first byte of every result.
    CorruptResult,
    /// Invert the first byte of the second and later results only.
    CorruptSecondResult,
    /// Send ARP requests with the wrong protocol type.
    BadArpRequest,
    /// Swap the source and destination ports of every result.
    SwappedPorts,
    /// Send every frame with a corrupt FCS.
    BadFcs,
    /// Cut every result frame short inside its IPv4 header's length.
    TruncatedResult,
}

/// Result frames are cut to this many bytes by [`Fault::TruncatedResult`].
const TRUNCATED_LEN: usize = 40;

impl FromStr for Fault {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "silent" => Ok(Self::Silent),
            "corrupt-result" => Ok(Self::CorruptResult),
            "corrupt-second-result" => Ok(Self::CorruptSecondResult),
            "bad-arp-request" => Ok(Self::BadArpRequest),
            "swapped-ports" => Ok(Self::SwappedPorts),
            "bad-fcs" => Ok(Self::BadFcs),
            "truncated-result" => Ok(Self::TruncatedResult),
            other => Err(SimError(format!(
                "unknown fault '{other}' (expected none, silent, corrupt-result, \
                 corrupt-second-result, bad-arp-request, swapped-ports, bad-fcs \
                 or truncated-result)"
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FpgaCoreConfig {
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
    pub port: u16,
    pub speed: Speed,
    pub fault: Fault,
}

impl Default for FpgaCoreConfig {
    fn default() -> Self {
        Self {
            mac: MacAddr::new(0x02, 0x00, 0x00, 0x00, 0x00, 0x00),
            ip: Ipv4Addr::new(192, 168, 1, 128),
            port: 1234,
            speed: Speed::Mbps1000,
            fault: Fault::None,
        }
    }
}

pub struct FpgaCore {
    pub entity: Arc<Entity>,
    config: FpgaCoreConfig,
    ports: DutPorts,
    rx: Rc<RgmiiSink>,
    tx: Rc<RgmiiSource>,
    arp_cache: RefCell<HashMap<Ipv4Addr, MacAddr>>,

    /// Replies waiting for the address of their destination.
    pending: RefCell<Vec<UdpFrameFields>>,

    results_computed: Cell<usize>,
}

impl FpgaCore {
    /// Attach the model to PHY 0 of `ports`. PHY 1 is left idle.
    pub fn new_and_register(
        engine: &Engine,
        parent: &Arc<Entity>,
        ports: &DutPorts,
        config: FpgaCoreConfig,
    ) -> Result<Rc<Self>, SimError> {
        let entity = Arc::new(Entity::new(parent, "fpga_core"));
        let rx = RgmiiSink::new_and_register(
            engine,
            &entity,
            "mac_rx",
            ports.phy0.rx_bus()?,
            config.speed,
        );
        // Data is launched on clk and the forwarded clock is clk90 so that
        // each edge of tx_clk is in the middle of the data.
        let tx = RgmiiSource::new_and_register(
            engine,
            &entity,
            "mac_tx",
            ports.phy0.tx_bus()?,
            config.speed,
            Clocking::Forwarded {
                launch: ports.clk.clone(),
                forward: ports.clk90.clone(),
            },
        );
        let rc_self = Rc::new(Self {
            entity,
            config,
            ports: ports.clone(),
            rx,
            tx,
            arp_cache: RefCell::new(HashMap::new()),
            pending: RefCell::new(Vec::new()),
            results_computed: Cell::new(0),
        });
        engine.register(rc_self.clone());
        Ok(rc_self)
    }

    /// Number of addresses learnt from ARP replies.
    #[must_use]
    pub fn arp_cache_len(&self) -> usize {
        self.arp_cache.borrow().len()
    }

    /// Number of UDP requests answered so far.
    #[must_use]
    pub fn results_computed(&self) -> usize {
        self.results_computed.get()
    }

    fn transmit(&self, packet: &Packet) -> SimResult {
        if self.config.fault == Fault::Silent {
            trace!(self.entity ; "silent: dropping {packet}");
            return Ok(());
        }
        debug!(self.entity ; "transmit {packet}");
        let frame = Frame::from_packet(packet)?;
        let mut bytes = frame.bytes();
        if self.config.fault == Fault::TruncatedResult && packet.as_udp().is_some() {
            bytes = &bytes[..TRUNCATED_LEN.min(bytes.len())];
        }
        let mut gmii = GmiiFrame::from_payload(bytes);
        if self.config.fault == Fault::BadFcs {
            if let Some(last) = gmii.data.last_mut() {
                *last = !*last;
            }
        }
        self.tx.send(gmii);
        Ok(())
    }

    fn handle(&self, gmii: GmiiFrame) -> SimResult {
        let payload = match gmii.payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(self.entity ; "dropped frame: {e}");
                return Ok(());
            }
        };
        let packet = match Packet::parse(payload) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(self.entity ; "dropped frame: {}", e.0);
                return Ok(());
            }
        };
        let eth_dst = packet.eth().dst;
        if eth_dst != self.config.mac && !eth_dst.is_broadcast() {
            trace!(self.entity ; "ignored frame for {eth_dst}");
            return Ok(());
        }

        match packet {
            Packet::Arp(arp) if arp.arp.tpa == self.config.ip => match arp.arp.op {
                ArpOperation::Request => self.answer_arp(arp.arp.sha, arp.arp.spa),
                ArpOperation::Reply => self.learn(arp.arp.sha, arp.arp.spa),
                ArpOperation::Other(op) => {
                    warn!(self.entity ; "ignored ARP operation {op}");
                    Ok(())
                }
            },
            Packet::Udp(udp)
                if udp.ip.dst == self.config.ip && udp.udp.dst_port == self.config.port =>
            {
                self.offload(&udp)
            }
            other => {
                trace!(self.entity ; "ignored {other}");
                Ok(())
            }
        }
    }

    fn answer_arp(&self, requester_mac: MacAddr, requester_ip: Ipv4Addr) -> SimResult {
        info!(self.entity ; "ARP request from {requester_ip}");
        self.transmit(&Packet::arp(ArpFrameFields {
            eth_dst: requester_mac,
            eth_src: self.config.mac,
            op: ArpOperation::Reply,
            sha: self.config.mac,
            spa: self.config.ip,
            tha: requester_mac,
            tpa: requester_ip,
        }))
    }

    fn learn(&self, mac: MacAddr, ip: Ipv4Addr) -> SimResult {
        info!(self.entity ; "learnt {ip} is at {mac}");
        self.arp_cache.borrow_mut().insert(ip, mac);

        let ready: Vec<UdpFrameFields> = {
            let mut pending = self.pending.borrow_mut();
            let (ready, waiting): (Vec<_>, Vec<_>) = pending.drain(..).partition(|reply| reply.ip_dst == ip);
            *pending = waiting;
            ready
        };
        for mut reply in ready {
            reply.eth_dst = mac;
            self.transmit(&Packet::udp(reply))?;
        }
        Ok(())
    }

    fn offload(&self, request: &UdpPacket) -> SimResult {
        let kernel_len = KERNEL_DIM * KERNEL_DIM;
        let mut result = match correlate_windows(&request.payload, kernel_len) {
            Ok(result) => result,
            Err(e) => {
                warn!(self.entity ; "bad request: {}", e.0);
                return Ok(());
            }
        };
        let round = self.results_computed.get() + 1;
        self.results_computed.set(round);
        let corrupt = match self.config.fault {
            Fault::CorruptResult => true,
            Fault::CorruptSecondResult => round >= 2,
            _ => false,
        };
        if corrupt {
            if let Some(first) = result.first_mut() {
                *first = !*first;
            }
        }
        info!(self.entity ; "computed {} result bytes for {}", result.len(), request.ip.src);

        let mut reply = UdpFrameFields {
            eth_dst: request.eth.src,
            eth_src: self.config.mac,
            ip_src: request.ip.dst,
            ip_dst: request.ip.src,
            src_port: request.udp.dst_port,
            dst_port: request.udp.src_port,
            payload: result,
        };
        if self.config.fault == Fault::SwappedPorts {
            (reply.src_port, reply.dst_port) = (reply.dst_port, reply.src_port);
        }

        let known = self.arp_cache.borrow().get(&reply.ip_dst).copied();
        match known {
            Some(mac) => {
                reply.eth_dst = mac;
                self.transmit(&Packet::udp(reply))
            }
            None => {
                let target = reply.ip_dst;
                self.pending.borrow_mut().push(reply);
                self.request_address(target)
            }
        }
    }

    fn request_address(&self, target: Ipv4Addr) -> SimResult {
        info!(self.entity ; "ARP request for {target}");
        let mut packet = Packet::arp(ArpFrameFields {
            eth_dst: MacAddr::BROADCAST,
            eth_src: self.config.mac,
            op: ArpOperation::Request,
            sha: self.config.mac,
            spa: self.config.ip,
            tha: MacAddr::ZERO,
            tpa: target,
        });
        if self.config.fault == Fault::BadArpRequest {
            if let Packet::Arp(arp) = &mut packet {
                arp.arp.ptype = 0x86dd;
            }
        }
        self.transmit(&packet)
    }
}

#[async_trait(?Send)]
impl Runnable for FpgaCore {
    async fn run(&self) -> SimResult {
        // Held in reset until the reset pulse has been seen
        self.ports.rst.falling_edge().await;
        info!(self.entity ; "out of reset");

        loop {
            let frame = self.rx.recv().await?;
            self.handle(frame)?;
        }
    }
}
