// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use byteorder::{ByteOrder, LittleEndian};

use super::*;
use crate::app::{Acknowledger, ExtendedOp, InboundRequest, MidiPackage};

/// Exclusive access of a master to this node.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockState {
    #[default]
    Unlocked,
    HeldBy(MasterSelect),
}

impl LockState {
    #[must_use]
    pub const fn is_locked(self) -> bool {
        matches!(self, Self::HeldBy(_))
    }

    /// Whether requests of `ms` have to be turned away.
    #[must_use]
    pub fn rejects(self, ms: MasterSelect) -> bool {
        matches!(self, Self::HeldBy(holder) if holder != ms)
    }
}

impl<T, A, const POOL: usize> Engine<T, A, POOL>
where
    T: Transport,
    A: Application,
{
    #[must_use]
    pub const fn lock_state(&self) -> LockState {
        self.lock
    }

    /// Drain and answer the received requests.
    ///
    /// While locked, the node keeps waiting for the lock holder's next
    /// request until `locked_idle_polls` consecutive polls came up empty.
    /// A failing request doesn't stop the drain, the first error is
    /// returned once the queue is empty.
    pub(crate) fn dispatch_requests(&mut self, own: NodeId) -> Result<()> {
        let mut idle_polls = 0;
        let mut first_err = None;
        loop {
            let Some(packet) = self.transport.receive_request() else {
                if self.lock.is_locked() {
                    idle_polls += 1;
                    if idle_polls < self.config.locked_idle_polls {
                        core::hint::spin_loop();
                        continue;
                    }
                }
                return first_err.map_or(Ok(()), Err);
            };
            idle_polls = 0;
            if let Err(err) = self.handle_request(own, &packet) {
                warn!(
                    "Failed to handle request from {}: {err}",
                    packet.id.master_select.master()
                );
                first_err.get_or_insert(err);
            }
        }
    }

    fn handle_request(&mut self, own: NodeId, packet: &Packet) -> Result<()> {
        let ms = packet.id.master_select;
        let master = ms.master();
        let Service::Request(service) = packet.id.service else {
            warn!("Dropped acknowledge of {} in request queue", packet.id.node);
            return Ok(());
        };
        debug!(
            "request from {master}: service={service:?} control=0x{:0>4X} len={} data={:02X?}",
            packet.id.control,
            packet.len(),
            packet.data()
        );

        if self.lock.rejects(ms) {
            debug!("Ignored request of {master}, node is locked: {:?}", self.lock);
            return self.send_ack(master, AckResult::Retry, Message::EMPTY, 0);
        }

        match service {
            RequestType::Special => self.handle_special(own, packet, service),
            RequestType::RamRead | RequestType::RamWrite | RequestType::Ping => {
                self.forward(own, packet, service)
            }
        }
    }

    fn handle_special(&mut self, own: NodeId, packet: &Packet, service: RequestType) -> Result<()> {
        let ms = packet.id.master_select;
        let master = ms.master();
        let op = ExtendedOp::new(packet.id.control_low());

        if let Some(expected) = op.expected_len() {
            if packet.len() != expected {
                warn!(
                    "Rejected extended op {op} of {master}: length {} != {expected}",
                    packet.len()
                );
                return self.send_ack(master, AckResult::Error, Message::EMPTY, 0);
            }
        }

        let [b0, b1, b2, ..] = *packet.msg.bytes();
        let result = match op {
            ExtendedOp::Lock => {
                debug!("Locked by {master}");
                self.lock = LockState::HeldBy(ms);
                AckResult::Ok
            }
            ExtendedOp::Unlock => {
                debug!("Unlocked by {master}");
                self.lock = LockState::Unlocked;
                AckResult::Ok
            }
            ExtendedOp::AppInit => {
                self.app.init();
                AckResult::Ok
            }
            ExtendedOp::MidiNotify => {
                self.app.midi_notify(0, MidiPackage([b0, b1, b2]));
                AckResult::Ok
            }
            ExtendedOp::DigitalInputNotify => {
                self.app.digital_input_notify(b0, b1);
                AckResult::Ok
            }
            ExtendedOp::EncoderNotify => {
                self.app.encoder_notify(b0, b1 as i8);
                AckResult::Ok
            }
            ExtendedOp::AnalogInputNotify => {
                let value = LittleEndian::read_u16(&packet.msg.bytes()[1..3]);
                self.app.analog_input_notify(b0, value);
                AckResult::Ok
            }
            ExtendedOp::Reserved(_) => AckResult::Error,
            ExtendedOp::Custom(_) => return self.forward(own, packet, service),
        };
        self.send_ack(master, result, Message::EMPTY, 0)
    }

    fn forward(&mut self, own: NodeId, packet: &Packet, service: RequestType) -> Result<()> {
        let req = InboundRequest {
            master: packet.id.master_select.master(),
            service,
            control: packet.id.control,
            msg: packet.msg,
            len: packet.len(),
        };
        let mut ack = Acknowledger::new(&mut self.transport, own, req.master);
        self.app.on_request(&req, &mut ack)?;
        if !ack.is_sent() {
            warn!("No acknowledge sent for {service:?} request of {}", req.master);
        }
        Ok(())
    }
}
