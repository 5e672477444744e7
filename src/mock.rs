// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory transport and application for tests.

pub(crate) use std::{boxed::Box, collections::VecDeque, vec, vec::Vec};

use crate::{
    app::{Acknowledger, Application, InboundRequest, MidiPackage},
    codec::{encode_ack, encode_request},
    config::Config,
    engine::Engine,
    error::Error,
    frame::*,
    transport::{Transport, TxReadyHandler},
};

pub(crate) type Responder = Box<dyn FnMut(&Packet) -> Vec<Packet>>;

#[derive(Default)]
pub(crate) struct MockTransport {
    /// Received acknowledgements.
    pub acks: VecDeque<Packet>,
    /// Received requests.
    pub requests: VecDeque<Packet>,
    pub sent: Vec<Packet>,
    pub filter: Option<NodeId>,
    pub init_mode: Option<u32>,
    pub fault: bool,
    pub fault_checks: usize,
    pub fail_send: bool,
    pub ack_polls: usize,
    pub request_polls: usize,
    /// Produces the acknowledgements of every sent frame.
    pub responder: Option<Responder>,
    /// Number of empty ack polls before a response shows up.
    pub response_delay: usize,
    /// Ack polls left until the current response shows up.
    pub hold: usize,
    pub tx_handler: Option<TxReadyHandler>,
    pub tx_triggers: usize,
}

impl Transport for MockTransport {
    fn init(&mut self, mode: u32) -> Result<(), Error> {
        self.init_mode = Some(mode);
        Ok(())
    }

    fn configure_filter(&mut self, node: NodeId) {
        self.filter = Some(node);
    }

    fn send(&mut self, packet: &Packet) -> Result<(), Error> {
        if self.fail_send {
            return Err(Error::Transmit);
        }
        self.sent.push(*packet);
        if let Some(responder) = self.responder.as_mut() {
            let responses = responder(packet);
            if !responses.is_empty() {
                self.hold = self.response_delay;
            }
            self.acks.extend(responses);
        }
        Ok(())
    }

    fn receive_ack(&mut self) -> Option<Packet> {
        self.ack_polls += 1;
        if self.hold > 0 {
            self.hold -= 1;
            return None;
        }
        self.acks.pop_front()
    }

    fn receive_request(&mut self) -> Option<Packet> {
        self.request_polls += 1;
        self.requests.pop_front()
    }

    fn check_bus_fault(&mut self) -> Result<(), Error> {
        self.fault_checks += 1;
        if self.fault {
            return Err(Error::Transmit);
        }
        Ok(())
    }

    fn install_tx_ready_handler(&mut self, handler: Option<TxReadyHandler>) -> Result<(), Error> {
        self.tx_handler = handler;
        Ok(())
    }

    fn trigger_tx_ready_handler(&mut self) -> Result<(), Error> {
        self.tx_triggers += 1;
        Ok(())
    }
}

/// Notification received by [`RecordingApp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    Init,
    Midi(u8, MidiPackage),
    DigitalInput(u8, u8),
    Encoder(u8, i8),
    AnalogInput(u8, u16),
}

/// Records everything and answers like a plain slave: pings with
/// [`RecordingApp::info`], reads with [`AckResult::Read`], everything else
/// with [`AckResult::Ok`].
pub(crate) struct RecordingApp {
    pub events: Vec<Event>,
    pub requests: Vec<InboundRequest>,
    pub info: NodeInfo,
    /// Don't acknowledge forwarded requests.
    pub silent: bool,
}

impl Default for RecordingApp {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            requests: Vec::new(),
            info: NodeInfo {
                protocol_version: 1,
                node_type: *b"MBHP",
                node_version: 2,
                node_subversion: 3,
            },
            silent: false,
        }
    }
}

impl Application for RecordingApp {
    fn on_request(&mut self, req: &InboundRequest, ack: &mut Acknowledger<'_>) -> Result<(), Error> {
        self.requests.push(*req);
        if self.silent {
            return Ok(());
        }
        match req.service {
            RequestType::Ping => ack.send(AckResult::Ok, Message::from(self.info), NodeInfo::DATA_LEN),
            RequestType::RamRead => ack.send_empty(AckResult::Read),
            RequestType::RamWrite | RequestType::Special => ack.send_empty(AckResult::Ok),
        }
    }

    fn init(&mut self) {
        self.events.push(Event::Init);
    }

    fn midi_notify(&mut self, port: u8, package: MidiPackage) {
        self.events.push(Event::Midi(port, package));
    }

    fn digital_input_notify(&mut self, pin: u8, value: u8) {
        self.events.push(Event::DigitalInput(pin, value));
    }

    fn encoder_notify(&mut self, encoder: u8, delta: i8) {
        self.events.push(Event::Encoder(encoder, delta));
    }

    fn analog_input_notify(&mut self, channel: u8, value: u16) {
        self.events.push(Event::AnalogInput(channel, value));
    }
}

pub(crate) fn node(id: u8) -> NodeId {
    NodeId::new(id).unwrap()
}

/// An engine without node id.
pub(crate) fn engine(config: Config) -> Engine<MockTransport, RecordingApp> {
    Engine::new(MockTransport::default(), RecordingApp::default(), config).unwrap()
}

/// Master `0x00`.
pub(crate) fn master(config: Config) -> Engine<MockTransport, RecordingApp> {
    let mut engine = engine(config);
    engine.set_node_id(NodeId::MASTER_0);
    engine
}

pub(crate) fn slave(id: u8, config: Config) -> Engine<MockTransport, RecordingApp> {
    let mut engine = engine(config);
    engine.set_node_id(node(id));
    engine
}

/// An acknowledgement sent by `from` to `to_master`.
pub(crate) fn ack_packet(from: u8, to_master: u8, result: AckResult, data: &[u8]) -> Packet {
    let id = encode_ack(node(to_master), result, Some(node(from))).unwrap();
    Packet::new(id, Message::from_slice(data), data.len()).unwrap()
}

/// A request sent by `master` to `slave`.
pub(crate) fn request_packet(
    master: u8,
    slave: u8,
    tos: RequestType,
    control: u16,
    data: &[u8],
) -> Packet {
    let id = encode_request(node(slave), tos, control, Some(node(master))).unwrap();
    Packet::new(id, Message::from_slice(data), data.len()).unwrap()
}

/// Answers pings of the listed slaves with their node info.
pub(crate) fn pong_responder(slaves: &[(u8, NodeInfo)]) -> Responder {
    let slaves = slaves.to_vec();
    Box::new(move |req: &Packet| {
        if req.id.service != Service::Request(RequestType::Ping) {
            return Vec::new();
        }
        slaves
            .iter()
            .filter(|(id, _)| *id == req.id.node.value())
            .map(|(id, info)| {
                let msg = Message::from(*info);
                let ack = encode_ack(req.id.master_select.master(), AckResult::Ok, Some(node(*id)))
                    .unwrap();
                Packet::new(ack, msg, NodeInfo::DATA_LEN).unwrap()
            })
            .collect()
    })
}
