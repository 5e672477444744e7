// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use byteorder::{ByteOrder, LittleEndian};
use core::str;

use super::MAX_DATA_LEN;
use crate::Error;

/// The fixed 8 byte data field of an MBNet frame.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Message([u8; MAX_DATA_LEN]);

impl Message {
    pub const EMPTY: Self = Self([0; MAX_DATA_LEN]);

    /// Create a message from up to 8 bytes, remaining bytes are zero.
    ///
    /// Bytes beyond the 8 byte data field are dropped, use
    /// [`Message::try_from`] to reject longer payloads.
    #[must_use]
    pub fn from_slice(data: &[u8]) -> Self {
        let mut bytes = [0; MAX_DATA_LEN];
        let len = data.len().min(MAX_DATA_LEN);
        bytes[..len].copy_from_slice(&data[..len]);
        Self(bytes)
    }

    #[must_use]
    pub const fn bytes(&self) -> &[u8; MAX_DATA_LEN] {
        &self.0
    }

    pub fn bytes_mut(&mut self) -> &mut [u8; MAX_DATA_LEN] {
        &mut self.0
    }

    /// Lower data word (bytes 0..=3, little endian).
    #[must_use]
    pub fn data_l(&self) -> u32 {
        LittleEndian::read_u32(&self.0[..4])
    }

    /// Upper data word (bytes 4..=7, little endian).
    #[must_use]
    pub fn data_h(&self) -> u32 {
        LittleEndian::read_u32(&self.0[4..])
    }

    /// Build a message from its two little endian data words.
    #[must_use]
    pub fn from_words(data_l: u32, data_h: u32) -> Self {
        let mut bytes = [0; MAX_DATA_LEN];
        LittleEndian::write_u32(&mut bytes[..4], data_l);
        LittleEndian::write_u32(&mut bytes[4..], data_h);
        Self(bytes)
    }

    /// Protocol version of a pong reply, `0` marks an unused pool slot.
    #[must_use]
    pub const fn protocol_version(&self) -> u8 {
        self.0[0]
    }

    /// Interpret the message as a pong reply.
    #[must_use]
    pub const fn node_info(&self) -> NodeInfo {
        NodeInfo {
            protocol_version: self.0[0],
            node_type: [self.0[1], self.0[2], self.0[3], self.0[4]],
            node_version: self.0[5],
            node_subversion: self.0[6],
        }
    }
}

impl From<[u8; MAX_DATA_LEN]> for Message {
    fn from(bytes: [u8; MAX_DATA_LEN]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Message {
    type Error = Error;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() > MAX_DATA_LEN {
            return Err(Error::DataLength(data.len()));
        }
        Ok(Self::from_slice(data))
    }
}

impl From<NodeInfo> for Message {
    fn from(info: NodeInfo) -> Self {
        let NodeInfo {
            protocol_version,
            node_type,
            node_version,
            node_subversion,
        } = info;
        let [t0, t1, t2, t3] = node_type;
        Self([
            protocol_version,
            t0,
            t1,
            t2,
            t3,
            node_version,
            node_subversion,
            0,
        ])
    }
}

/// Identity and version of a node, as returned in reply to a ping.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeInfo {
    pub protocol_version: u8,
    /// Four ASCII characters, e.g. `SEQV`
    pub node_type: [u8; 4],
    pub node_version: u8,
    pub node_subversion: u8,
}

impl NodeInfo {
    /// The node type as text, if it is valid UTF-8.
    #[must_use]
    pub fn node_type_str(&self) -> Option<&str> {
        str::from_utf8(&self.node_type).ok()
    }

    /// Size of the pong reply data field.
    pub const DATA_LEN: usize = 7;
}
