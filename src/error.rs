// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;

/// mbnet-core Error
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The local node id has not been assigned yet
    NotConfigured,
    /// The local node is not a master
    NotMaster,
    /// Acknowledgements must target a master id
    InvalidDestination(u8),
    /// Node ids are 7 bit wide
    InvalidNodeId(u8),
    /// The transport failed to send, or the bus reported a fault
    Transmit,
    /// A resend was requested for a slave that is not the pending target
    Sequence {
        /// Target of the pending transaction
        expected: Option<u8>,
        /// Slave id passed to the resend
        actual: u8,
    },
    /// No acknowledgement within the polling ceiling
    Timeout,
    /// Slave id outside of the configured window
    InvalidRange(u8),
    /// The discovery info pool has no free slot
    PoolExhausted,
    /// The bus entered the panic state
    BusPanic,
    /// The bus is permanently off and requires re-initialization
    BusPermanentOff,
    /// Payload exceeds the 8 byte data field
    DataLength(usize),
    /// A polling ceiling of the configuration is zero
    InvalidConfig,
    /// Unsupported initialization mode
    UnsupportedMode(u32),
    /// The transport does not implement the requested feature
    Unsupported,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;

        match self {
            NotConfigured => write!(f, "Node id not configured"),
            NotMaster => write!(f, "Node is not configured as master"),
            InvalidDestination(id) => {
                write!(f, "Invalid destination: 0x{id:0>2X} is not a master node")
            }
            InvalidNodeId(id) => write!(f, "Invalid node id: 0x{id:0>2X}"),
            Transmit => write!(f, "Transmission error"),
            Sequence {
                expected: Some(expected),
                actual,
            } => write!(
                f,
                "Sequence error: pending slave = 0x{expected:0>2X}, requested = 0x{actual:0>2X}"
            ),
            Sequence {
                expected: None,
                actual,
            } => write!(
                f,
                "Sequence error: no pending request, requested = 0x{actual:0>2X}"
            ),
            Timeout => write!(f, "Acknowledge timeout"),
            InvalidRange(id) => write!(f, "Slave id 0x{id:0>2X} outside of the slave window"),
            PoolExhausted => write!(f, "No free slot in the slave info pool"),
            BusPanic => write!(f, "Bus panic"),
            BusPermanentOff => write!(f, "Bus permanently off"),
            DataLength(len) => write!(f, "Invalid data length: {len}"),
            InvalidConfig => write!(f, "Invalid configuration: polling ceiling is zero"),
            UnsupportedMode(mode) => write!(f, "Unsupported mode: {mode}"),
            Unsupported => write!(f, "Not supported by the transport"),
        }
    }
}

impl core::error::Error for Error {}
