// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identifier encoding.
//!
//! MBNet frames use 29 bit CAN extended identifiers:
//!
//! ```text
//!  28        22   21   20  18   17 16   15               0
//! +------------+-----+-------+-------+--------------------+
//! |    node    | ack |  ms   |  tos  |      control       |
//! +------------+-----+-------+-------+--------------------+
//! ```

use crate::{error::*, frame::*};

type Result<T> = core::result::Result<T, Error>;

const CONTROL_MASK: u32 = 0xFFFF;
const TOS_SHIFT: u32 = 16;
const TOS_MASK: u32 = 0x03;
const MS_SHIFT: u32 = 18;
const MS_MASK: u32 = 0x07;
const ACK_SHIFT: u32 = 21;
const NODE_SHIFT: u32 = 22;
const NODE_MASK: u32 = 0x7F;

/// Mask of all bits used by an MBNet identifier.
pub const ID_MASK: u32 = 0x1FFF_FFFF;

impl From<Identifier> for u32 {
    fn from(id: Identifier) -> u32 {
        let (tos, ack) = match id.service {
            Service::Request(tos) => (tos.value(), 0u32),
            Service::Ack(tos) => (tos.value(), 1u32),
        };
        u32::from(id.control)
            | (u32::from(tos) & TOS_MASK) << TOS_SHIFT
            | (u32::from(id.master_select.value()) & MS_MASK) << MS_SHIFT
            | ack << ACK_SHIFT
            | (u32::from(id.node.value()) & NODE_MASK) << NODE_SHIFT
    }
}

impl From<u32> for Identifier {
    /// Decode a raw identifier, bits above bit 28 are ignored.
    fn from(raw: u32) -> Self {
        let tos = ((raw >> TOS_SHIFT) & TOS_MASK) as u8;
        let service = if (raw >> ACK_SHIFT) & 1 == 1 {
            Service::Ack(AckResult::from_bits(tos))
        } else {
            Service::Request(RequestType::from_bits(tos))
        };
        Identifier {
            control: (raw & CONTROL_MASK) as u16,
            service,
            master_select: MasterSelect::from_truncating(((raw >> MS_SHIFT) & MS_MASK) as u8),
            node: NodeId::from_truncating(((raw >> NODE_SHIFT) & NODE_MASK) as u8),
        }
    }
}

/// Build the identifier of a request from `sender` to `slave`.
///
/// Only a configured master may originate requests.
pub fn encode_request(
    slave: NodeId,
    tos: RequestType,
    control: u16,
    sender: Option<NodeId>,
) -> Result<Identifier> {
    let sender = sender.ok_or(Error::NotConfigured)?;
    if !sender.is_master() {
        return Err(Error::NotMaster);
    }
    Ok(Identifier {
        control,
        service: Service::Request(tos),
        master_select: sender.master_select(),
        node: slave,
    })
}

/// Build the identifier of an acknowledgement from `sender` to `master`.
pub fn encode_ack(master: NodeId, result: AckResult, sender: Option<NodeId>) -> Result<Identifier> {
    let sender = sender.ok_or(Error::NotConfigured)?;
    if !master.is_master() {
        return Err(Error::InvalidDestination(master.value()));
    }
    Ok(Identifier {
        control: u16::from(sender.value()),
        service: Service::Ack(result),
        master_select: MasterSelect::from_truncating(0),
        node: master,
    })
}

/// The node that sent an acknowledgement.
#[must_use]
pub const fn ack_sender(id: &Identifier) -> NodeId {
    NodeId::from_truncating(id.control_low())
}
