// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Application hooks invoked by the request dispatcher.

use core::fmt;

use crate::{
    codec::encode_ack,
    engine::transmit,
    error::Error,
    frame::{AckResult, Message, NodeId, Packet, RequestType},
    transport::Transport,
};

/// Extended type of service, carried in the low byte of the control word of
/// [`RequestType::Special`] requests.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedOp {
    /// `0x00`: grant exclusive access to the requesting master.
    Lock,
    /// `0x01`: release exclusive access.
    Unlock,
    /// `0x04`: re-initialize the application.
    AppInit,
    /// `0x06`: forward a MIDI event (3 bytes).
    MidiNotify,
    /// `0x08`: digital input toggled (pin, value).
    DigitalInputNotify,
    /// `0x09`: encoder moved (encoder, delta).
    EncoderNotify,
    /// `0x0A`: analog input changed (channel, 16 bit value).
    AnalogInputNotify,
    /// Reserved codes that are always rejected:
    /// `0x02`, `0x03`, `0x05` and `0x0B` - `0x0F`.
    Reserved(u8),
    /// Application defined code, forwarded to [`Application::on_request`].
    Custom(u8),
}

impl ExtendedOp {
    /// Create a new [`ExtendedOp`] with `value`.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        match value {
            0x00 => Self::Lock,
            0x01 => Self::Unlock,
            0x04 => Self::AppInit,
            0x06 => Self::MidiNotify,
            0x08 => Self::DigitalInputNotify,
            0x09 => Self::EncoderNotify,
            0x0A => Self::AnalogInputNotify,
            0x02 | 0x03 | 0x05 | 0x0B..=0x0F => Self::Reserved(value),
            code => Self::Custom(code),
        }
    }

    /// Get the [`u8`] value of the current [`ExtendedOp`].
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::Lock => 0x00,
            Self::Unlock => 0x01,
            Self::AppInit => 0x04,
            Self::MidiNotify => 0x06,
            Self::DigitalInputNotify => 0x08,
            Self::EncoderNotify => 0x09,
            Self::AnalogInputNotify => 0x0A,
            Self::Reserved(code) | Self::Custom(code) => code,
        }
    }

    /// Required payload length of the built-in notifications.
    #[must_use]
    pub const fn expected_len(self) -> Option<usize> {
        match self {
            Self::MidiNotify | Self::AnalogInputNotify => Some(3),
            Self::DigitalInputNotify | Self::EncoderNotify => Some(2),
            _ => None,
        }
    }
}

impl fmt::Display for ExtendedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:0>2X}", self.value())
    }
}

/// A three byte MIDI event.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiPackage(pub [u8; 3]);

impl MidiPackage {
    #[must_use]
    pub const fn status(&self) -> u8 {
        self.0[0]
    }

    /// MIDI channel of a channel voice message (0 - 15).
    #[must_use]
    pub const fn channel(&self) -> u8 {
        self.0[0] & 0x0F
    }

    #[must_use]
    pub const fn data(&self) -> [u8; 2] {
        [self.0[1], self.0[2]]
    }
}

/// A request received from a master, as handed to the application.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboundRequest {
    /// The master that originated the request.
    pub master: NodeId,
    pub service: RequestType,
    pub control: u16,
    pub msg: Message,
    pub len: usize,
}

impl InboundRequest {
    /// The valid data bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.msg.bytes()[..self.len]
    }
}

/// Sends the acknowledgement of an [`InboundRequest`].
pub struct Acknowledger<'a> {
    transport: &'a mut dyn Transport,
    sender: NodeId,
    master: NodeId,
    sent: bool,
}

impl<'a> Acknowledger<'a> {
    pub(crate) fn new(transport: &'a mut dyn Transport, sender: NodeId, master: NodeId) -> Self {
        Self {
            transport,
            sender,
            master,
            sent: false,
        }
    }

    /// The master the acknowledgement is sent to.
    #[must_use]
    pub const fn master(&self) -> NodeId {
        self.master
    }

    /// Acknowledge the request with `result` and `len` bytes of `msg`.
    pub fn send(&mut self, result: AckResult, msg: Message, len: usize) -> Result<(), Error> {
        let id = encode_ack(self.master, result, Some(self.sender))?;
        let packet = Packet::new(id, msg, len)?;
        transmit(&mut *self.transport, &packet)?;
        self.sent = true;
        Ok(())
    }

    /// Acknowledge the request without data.
    pub fn send_empty(&mut self, result: AckResult) -> Result<(), Error> {
        self.send(result, Message::EMPTY, 0)
    }

    pub(crate) const fn is_sent(&self) -> bool {
        self.sent
    }
}

/// Node specific behavior of a slave.
pub trait Application {
    /// Handle a ping, RAM read/write or application defined special request.
    ///
    /// The implementation must acknowledge every request via `ack`.
    fn on_request(&mut self, req: &InboundRequest, ack: &mut Acknowledger<'_>)
    -> Result<(), Error>;

    /// Re-initialize the application state.
    fn init(&mut self) {}

    fn midi_notify(&mut self, _port: u8, _package: MidiPackage) {}

    fn digital_input_notify(&mut self, _pin: u8, _value: u8) {}

    fn encoder_notify(&mut self, _encoder: u8, _delta: i8) {}

    fn analog_input_notify(&mut self, _channel: u8, _value: u16) {}
}
