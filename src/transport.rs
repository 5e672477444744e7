// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CAN transport abstraction.

use crate::{Error, NodeId, Packet};

/// Called from the transmit interrupt whenever the transport can take the
/// next frame. Returning `None` stops interrupt driven transfers until
/// [`Transport::trigger_tx_ready_handler`] is invoked again.
pub type TxReadyHandler = fn() -> Option<Packet>;

/// The hardware side of MBNet.
///
/// Frames may be received from an interrupt context, but `receive_ack` and
/// `receive_request` are only ever called from the task that drives the
/// [`Engine`](crate::Engine). Implementations must provide a safe single
/// consumer dequeue.
pub trait Transport {
    /// Initialize the CAN peripheral.
    fn init(&mut self, mode: u32) -> Result<(), Error>;

    /// Program the acceptance filters for frames addressed to `node`.
    fn configure_filter(&mut self, node: NodeId);

    /// Queue a frame for transmission.
    fn send(&mut self, packet: &Packet) -> Result<(), Error>;

    /// Dequeue the next received acknowledgement, if any.
    fn receive_ack(&mut self) -> Option<Packet>;

    /// Dequeue the next received request, if any.
    fn receive_request(&mut self) -> Option<Packet>;

    /// Cheap poll of the controller error state.
    ///
    /// Returns an error if the bus is unusable, e.g. receiver passive or no
    /// other node acknowledges frames.
    fn check_bus_fault(&mut self) -> Result<(), Error>;

    /// Install or remove the transmit interrupt handler.
    fn install_tx_ready_handler(&mut self, _handler: Option<TxReadyHandler>) -> Result<(), Error> {
        Err(Error::Unsupported)
    }

    /// Invoke the installed handler to restart interrupt driven transfers.
    fn trigger_tx_ready_handler(&mut self) -> Result<(), Error> {
        Err(Error::Unsupported)
    }
}
