// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;

mod message;

pub use self::message::*;
use crate::Error;

/// Number of addressable nodes.
pub const NODE_COUNT: usize = 128;

/// Maximum length of the data field.
pub const MAX_DATA_LEN: usize = 8;

/// A 7 bit MBNet node id (`0x00` - `0x7F`).
///
/// Nodes whose low nibble is zero (`0x00`, `0x10`, ... `0x70`) may act as
/// masters, all others are slaves.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u8);

impl NodeId {
    /// The first master address.
    pub const MASTER_0: Self = Self(0x00);

    /// The highest node id.
    pub const MAX: Self = Self(0x7F);

    /// Create a new [`NodeId`], `None` if `value` exceeds 7 bit.
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        if (value as usize) < NODE_COUNT {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Create a [`NodeId`] from the lower 7 bit of `value`.
    #[must_use]
    pub const fn from_truncating(value: u8) -> Self {
        Self(value & 0x7F)
    }

    /// The id of the master identified by a master select nibble.
    #[must_use]
    pub const fn from_master_select(ms: MasterSelect) -> Self {
        Self((ms.0 & 0x07) << 4)
    }

    /// Get the [`u8`] value of the current [`NodeId`].
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn is_master(self) -> bool {
        self.0 & 0x0F == 0
    }

    /// The high nibble used to tag requests originated by this node.
    #[must_use]
    pub const fn master_select(self) -> MasterSelect {
        MasterSelect(self.0 >> 4)
    }
}

impl TryFrom<u8> for NodeId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(Error::InvalidNodeId(value))
    }
}

impl From<NodeId> for u8 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:0>2X}", self.0)
    }
}

/// The high nibble of a master id, carried in every request.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MasterSelect(u8);

impl MasterSelect {
    /// Create a [`MasterSelect`] from the lower 3 bit of `value`.
    #[must_use]
    pub const fn from_truncating(value: u8) -> Self {
        Self(value & 0x07)
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// The master node this nibble refers to.
    #[must_use]
    pub const fn master(self) -> NodeId {
        NodeId::from_master_select(self)
    }
}

/// Request type of service (TOS).
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    /// Extended operation, selected by the low byte of the control word.
    Special = 0,
    RamRead = 1,
    RamWrite = 2,
    Ping = 3,
}

impl RequestType {
    /// Decode the lower 2 bit of `value`.
    #[must_use]
    pub const fn from_bits(value: u8) -> Self {
        match value & 0x03 {
            0 => Self::Special,
            1 => Self::RamRead,
            2 => Self::RamWrite,
            _ => Self::Ping,
        }
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }
}

/// Acknowledge type of service.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckResult {
    Ok = 0,
    /// Acknowledge carrying read data.
    Read = 1,
    /// The slave is busy or locked, the request has to be sent again.
    Retry = 2,
    Error = 3,
}

impl AckResult {
    /// Decode the lower 2 bit of `value`.
    #[must_use]
    pub const fn from_bits(value: u8) -> Self {
        match value & 0x03 {
            0 => Self::Ok,
            1 => Self::Read,
            2 => Self::Retry,
            _ => Self::Error,
        }
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }
}

/// Request or acknowledge kind of an [`Identifier`].
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Request(RequestType),
    Ack(AckResult),
}

/// The addressing fields of an MBNet frame.
///
/// Requests carry the master select nibble of the sender and the id of the
/// addressed slave. Acknowledgements carry the full sender id in the low byte
/// of `control`, a zero master select and the id of the addressed master.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identifier {
    pub control: u16,
    pub service: Service,
    pub master_select: MasterSelect,
    pub node: NodeId,
}

impl Identifier {
    #[must_use]
    pub const fn is_ack(&self) -> bool {
        matches!(self.service, Service::Ack(_))
    }

    /// The low byte of the control word.
    ///
    /// For acknowledgements this is the id of the responding node, for
    /// special requests the extended operation code.
    #[must_use]
    pub const fn control_low(&self) -> u8 {
        (self.control & 0xFF) as u8
    }
}

/// The unit exchanged with the transport.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub id: Identifier,
    pub msg: Message,
    len: u8,
}

impl Packet {
    /// Create a new [`Packet`], the data length must not exceed 8 bytes.
    pub fn new(id: Identifier, msg: Message, len: usize) -> Result<Self, Error> {
        if len > MAX_DATA_LEN {
            return Err(Error::DataLength(len));
        }
        Ok(Self {
            id,
            msg,
            len: len as u8,
        })
    }

    /// Number of valid data bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The valid data bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.msg.bytes()[..self.len()]
    }
}
