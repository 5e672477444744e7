// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::*;
use crate::codec::{ack_sender, encode_ack, encode_request};

/// The last request sent by a master, kept for resends.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTransaction {
    pub slave: NodeId,
    pub packet: Packet,
}

/// An acknowledgement received from a slave.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub slave: NodeId,
    /// Any result but [`AckResult::Retry`].
    pub result: AckResult,
    pub msg: Message,
    pub len: usize,
}

impl Ack {
    /// The valid data bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.msg.bytes()[..self.len]
    }
}

/// Outcome of a single acknowledge poll.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckPoll {
    Received(Ack),
    /// The slave asked to send the request again.
    Retry,
    /// No acknowledge from the slave yet.
    Pending,
}

impl<T, A, const POOL: usize> Engine<T, A, POOL>
where
    T: Transport,
    A: Application,
{
    /// The request that [`Engine::send_request_again`] would repeat.
    #[must_use]
    pub const fn pending(&self) -> Option<&PendingTransaction> {
        self.pending.as_ref()
    }

    /// Send a request to a slave and remember it for resends.
    pub fn send_request(
        &mut self,
        slave: NodeId,
        tos: RequestType,
        control: u16,
        msg: Message,
        len: usize,
    ) -> Result<()> {
        let id = encode_request(slave, tos, control, self.node)?;
        let packet = Packet::new(id, msg, len)?;
        self.ensure_bus_on()?;
        self.pending = Some(PendingTransaction { slave, packet });
        transmit(&mut self.transport, &packet)
    }

    /// Send the pending request again, unmodified.
    ///
    /// Only required when polling with [`Engine::wait_ack_non_blocking`],
    /// [`Engine::wait_ack`] resends on its own.
    pub fn send_request_again(&mut self, slave: NodeId) -> Result<()> {
        let own = self.node.ok_or(Error::NotConfigured)?;
        if !own.is_master() {
            return Err(Error::NotMaster);
        }
        let pending = match self.pending {
            Some(pending) if pending.slave == slave => pending,
            other => {
                return Err(Error::Sequence {
                    expected: other.map(|p| p.slave.value()),
                    actual: slave.value(),
                });
            }
        };
        self.ensure_bus_on()?;
        transmit(&mut self.transport, &pending.packet)
    }

    /// Acknowledge a request of `master`.
    pub fn send_ack(
        &mut self,
        master: NodeId,
        result: AckResult,
        msg: Message,
        len: usize,
    ) -> Result<()> {
        let id = encode_ack(master, result, self.node)?;
        let packet = Packet::new(id, msg, len)?;
        self.ensure_bus_on()?;
        transmit(&mut self.transport, &packet)
    }

    /// Check for the acknowledge of `slave` without blocking.
    ///
    /// All queued acknowledgements are drained until the one of `slave` is
    /// found, acknowledgements of other nodes are dropped.
    pub fn wait_ack_non_blocking(&mut self, slave: NodeId) -> Result<AckPoll> {
        let own = self.node.ok_or(Error::NotConfigured)?;
        if !own.is_master() {
            return Err(Error::NotMaster);
        }
        // a faulty bus doesn't deliver frames anymore
        self.check_bus().map_err(|_| Error::Transmit)?;

        while let Some(packet) = self.transport.receive_ack() {
            let sender = ack_sender(&packet.id);
            let Service::Ack(result) = packet.id.service else {
                warn!("Dropped request from {sender} in acknowledge queue");
                continue;
            };
            if sender != slave {
                warn!(
                    "ACK from unexpected slave {sender} (result={result:?} len={} data={:02X?})",
                    packet.len(),
                    packet.data()
                );
                continue;
            }
            debug!(
                "got ACK from slave {sender}: result={result:?} len={} data={:02X?}",
                packet.len(),
                packet.data()
            );
            if result == AckResult::Retry {
                debug!("Slave {sender} requested to retry the transfer");
                return Ok(AckPoll::Retry);
            }
            return Ok(AckPoll::Received(Ack {
                slave,
                result,
                msg: packet.msg,
                len: packet.len(),
            }));
        }
        Ok(AckPoll::Pending)
    }

    /// Wait for the acknowledge of `slave`.
    ///
    /// Retry requests of the slave are answered by resending the pending
    /// request, which restarts the timeout.
    pub fn wait_ack(&mut self, slave: NodeId) -> Result<Ack> {
        self.wait_ack_within(slave, self.config.ack_timeout_polls)
    }

    pub(crate) fn wait_ack_within(&mut self, slave: NodeId, max_polls: u32) -> Result<Ack> {
        let mut polls = 0;
        loop {
            match self.wait_ack_non_blocking(slave)? {
                AckPoll::Received(ack) => return Ok(ack),
                AckPoll::Retry => {
                    self.send_request_again(slave)?;
                    polls = 0;
                }
                AckPoll::Pending => {}
            }
            polls += 1;
            if polls >= max_polls {
                debug!("ACK polling for slave {slave} timed out");
                return Err(Error::Timeout);
            }
            core::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::*;

    #[test]
    fn send_request_requires_configured_master() {
        let mut engine = engine(Config::default());
        assert_eq!(
            engine.send_request(node(0x01), RequestType::Ping, 0, Message::EMPTY, 0),
            Err(Error::NotConfigured)
        );
        engine.set_node_id(node(0x05));
        assert_eq!(
            engine.send_request(node(0x01), RequestType::Ping, 0, Message::EMPTY, 0),
            Err(Error::NotMaster)
        );
        assert!(engine.transport().sent.is_empty());
        assert!(engine.pending().is_none());
    }

    #[test]
    fn send_request_rejects_long_payload() {
        let mut engine = master(Config::default());
        assert_eq!(
            engine.send_request(node(0x01), RequestType::RamWrite, 0, Message::EMPTY, 9),
            Err(Error::DataLength(9))
        );
    }

    #[test]
    fn resend_reproduces_the_pending_request() {
        let mut engine = master(Config::default());
        let msg = Message::from([1, 2, 3, 4, 5, 6, 7, 8]);
        engine
            .send_request(node(0x03), RequestType::RamWrite, 0x4000, msg, 6)
            .unwrap();
        engine.send_request_again(node(0x03)).unwrap();

        let sent = &engine.transport().sent;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], sent[1]);
        assert_eq!(u32::from(sent[0].id), u32::from(sent[1].id));
        assert_eq!(sent[1].data(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(engine.pending().unwrap().slave, node(0x03));
    }

    #[test]
    fn resend_to_other_slave_is_a_sequence_error() {
        let mut engine = master(Config::default());
        assert_eq!(
            engine.send_request_again(node(0x03)),
            Err(Error::Sequence {
                expected: None,
                actual: 0x03
            })
        );
        engine
            .send_request(node(0x03), RequestType::Ping, 0, Message::EMPTY, 0)
            .unwrap();
        assert_eq!(
            engine.send_request_again(node(0x04)),
            Err(Error::Sequence {
                expected: Some(0x03),
                actual: 0x04
            })
        );
        assert_eq!(engine.transport().sent.len(), 1);
    }

    #[test]
    fn send_ack_targets_masters_only() {
        let mut engine = slave(0x05, Config::default());
        assert_eq!(
            engine.send_ack(node(0x11), AckResult::Ok, Message::EMPTY, 0),
            Err(Error::InvalidDestination(0x11))
        );
        engine
            .send_ack(node(0x10), AckResult::Read, Message::from_slice(&[0xAB]), 1)
            .unwrap();
        let ack = engine.transport().sent[0];
        assert_eq!(ack.id.service, Service::Ack(AckResult::Read));
        assert_eq!(ack.id.control, 0x05);
        assert_eq!(ack.id.node, node(0x10));
        assert_eq!(ack.data(), &[0xAB]);
    }

    #[test]
    fn poll_without_ack_is_pending() {
        let mut engine = master(Config::default());
        assert_eq!(engine.wait_ack_non_blocking(node(0x01)), Ok(AckPoll::Pending));
    }

    #[test]
    fn poll_requires_master() {
        let mut engine = slave(0x01, Config::default());
        assert_eq!(
            engine.wait_ack_non_blocking(node(0x02)),
            Err(Error::NotMaster)
        );
    }

    #[test]
    fn poll_skips_acks_of_other_slaves() {
        let mut engine = master(Config::default());
        let queue = &mut engine.transport_mut().acks;
        queue.push_back(ack_packet(0x02, 0x00, AckResult::Ok, &[0xEE]));
        queue.push_back(ack_packet(0x01, 0x00, AckResult::Read, &[0x12, 0x34]));
        queue.push_back(ack_packet(0x01, 0x00, AckResult::Ok, &[]));

        let AckPoll::Received(ack) = engine.wait_ack_non_blocking(node(0x01)).unwrap() else {
            panic!("expected an acknowledge");
        };
        assert_eq!(ack.result, AckResult::Read);
        assert_eq!(ack.data(), &[0x12, 0x34]);
        // the ack behind the match stays queued
        assert_eq!(engine.transport().acks.len(), 1);
    }

    #[test]
    fn poll_drains_unexpected_acks() {
        let mut engine = master(Config::default());
        let queue = &mut engine.transport_mut().acks;
        queue.push_back(ack_packet(0x02, 0x00, AckResult::Ok, &[]));
        queue.push_back(ack_packet(0x03, 0x00, AckResult::Ok, &[]));

        assert_eq!(engine.wait_ack_non_blocking(node(0x01)), Ok(AckPoll::Pending));
        assert!(engine.transport().acks.is_empty());
    }

    #[test]
    fn poll_reports_retry() {
        let mut engine = master(Config::default());
        engine
            .transport_mut()
            .acks
            .push_back(ack_packet(0x01, 0x00, AckResult::Retry, &[]));
        assert_eq!(engine.wait_ack_non_blocking(node(0x01)), Ok(AckPoll::Retry));
    }

    #[test]
    fn poll_on_faulty_bus_is_a_transmit_error() {
        let mut engine = master(Config::default());
        engine
            .transport_mut()
            .acks
            .push_back(ack_packet(0x01, 0x00, AckResult::Ok, &[]));
        engine.transport_mut().fault = true;

        assert_eq!(engine.wait_ack_non_blocking(node(0x01)), Err(Error::Transmit));
        assert_eq!(engine.health(), BusHealth::PermanentOff);
        assert_eq!(engine.transport().acks.len(), 1);
        assert_eq!(engine.transport().ack_polls, 0);

        assert_eq!(
            engine.send_request(node(0x01), RequestType::Ping, 0, Message::EMPTY, 0),
            Err(Error::BusPermanentOff)
        );
        assert!(engine.transport().sent.is_empty());
    }

    #[test]
    fn wait_ack_resends_on_retry() {
        const RETRIES: usize = 3;
        let mut engine = master(Config::default());
        let mut answers = 0;
        engine.transport_mut().responder = Some(Box::new(move |req: &Packet| {
            answers += 1;
            let result = if answers <= RETRIES {
                AckResult::Retry
            } else {
                AckResult::Read
            };
            vec![ack_packet(req.id.node.value(), 0x00, result, &[0x42])]
        }));

        engine
            .send_request(node(0x07), RequestType::RamRead, 0x0100, Message::EMPTY, 0)
            .unwrap();
        let ack = engine.wait_ack(node(0x07)).unwrap();
        assert_eq!(ack.result, AckResult::Read);
        assert_eq!(ack.data(), &[0x42]);

        let sent = &engine.transport().sent;
        assert_eq!(sent.len(), 1 + RETRIES);
        assert!(sent.iter().all(|p| *p == sent[0]));
    }

    #[test]
    fn retry_restarts_the_timeout() {
        let config = Config {
            ack_timeout_polls: 5,
            ..Default::default()
        };
        let mut engine = master(config);
        let mut answers = 0;
        engine.transport_mut().response_delay = 3;
        engine.transport_mut().responder = Some(Box::new(move |req: &Packet| {
            answers += 1;
            let result = if answers <= 4 {
                AckResult::Retry
            } else {
                AckResult::Ok
            };
            vec![ack_packet(req.id.node.value(), 0x00, result, &[])]
        }));

        engine
            .send_request(node(0x02), RequestType::Ping, 0, Message::EMPTY, 0)
            .unwrap();
        // 5 round trips of 4 polls each exceed 5 polls in total
        let ack = engine.wait_ack(node(0x02)).unwrap();
        assert_eq!(ack.result, AckResult::Ok);
        assert_eq!(engine.transport().sent.len(), 5);
    }

    #[test]
    fn wait_ack_times_out() {
        let config = Config {
            ack_timeout_polls: 10,
            ..Default::default()
        };
        let mut engine = master(config);
        engine
            .send_request(node(0x02), RequestType::Ping, 0, Message::EMPTY, 0)
            .unwrap();
        assert_eq!(engine.wait_ack(node(0x02)), Err(Error::Timeout));
        assert_eq!(engine.transport().ack_polls, 10);
        assert_eq!(engine.transport().sent.len(), 1);
    }

    #[test]
    fn wait_ack_aborts_on_bus_fault() {
        let mut engine = master(Config::default());
        engine.transport_mut().fault = true;
        assert_eq!(engine.wait_ack(node(0x02)), Err(Error::Transmit));
        assert_eq!(engine.transport().fault_checks, 1);
    }
}
