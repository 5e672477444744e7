// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The MBNet protocol engine.
//!
//! One [`Engine`] owns all protocol state of a node: the pending
//! transaction, the bus health flags, the discovery tables and the lock
//! holder. It is driven from a single task: [`Engine::tick`] is called
//! periodically, master side transactions are originated in between.

mod discovery;
mod dispatch;
mod health;
mod transaction;

pub use self::{discovery::*, dispatch::*, health::*, transaction::*};

use crate::{app::Application, config::Config, error::*, frame::*, transport::*};

type Result<T> = core::result::Result<T, Error>;

/// An MBNet node.
///
/// `POOL` is the number of discovered slaves a master keeps information
/// about.
pub struct Engine<T, A, const POOL: usize = 8> {
    transport: T,
    app: A,
    config: Config,
    node: Option<NodeId>,
    health: ProtocolHealth,
    lock: LockState,
    pending: Option<PendingTransaction>,
    discovery: Discovery<POOL>,
}

impl<T, A, const POOL: usize> Engine<T, A, POOL>
where
    T: Transport,
    A: Application,
{
    /// Create an unconfigured engine.
    pub fn new(transport: T, app: A, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            app,
            config,
            node: None,
            health: ProtocolHealth::default(),
            lock: LockState::default(),
            pending: None,
            discovery: Discovery::new(config.scan_retries),
        })
    }

    /// Reset all protocol state and initialize the transport.
    ///
    /// Only mode `0` is supported. The node id has to be assigned
    /// afterwards with [`Engine::set_node_id`].
    pub fn init(&mut self, mode: u32) -> Result<()> {
        if mode != 0 {
            return Err(Error::UnsupportedMode(mode));
        }
        self.health = ProtocolHealth::default();
        self.node = None;
        self.lock = LockState::Unlocked;
        self.pending = None;
        self.reconnect();
        self.transport.init(mode).inspect_err(|err| {
            error!("Initialisation failed: {err}");
        })
    }

    /// Assign the node id and configure the acceptance filters.
    ///
    /// Nodes with an id of `0x00`, `0x10`, ... `0x70` may act as masters.
    /// Assigning an id re-initializes the bus health and the lock holder.
    pub fn set_node_id(&mut self, id: NodeId) {
        self.node = Some(id);
        self.health = ProtocolHealth::default();
        self.lock = LockState::Unlocked;
        self.transport.configure_filter(id);
        debug!("Node id set to {id}");
    }

    #[must_use]
    pub const fn node_id(&self) -> Option<NodeId> {
        self.node
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    #[must_use]
    pub const fn app(&self) -> &A {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut A {
        &mut self.app
    }

    /// Periodic handler.
    ///
    /// A master continues the slave discovery until it is finished, then
    /// every node drains and answers its received requests.
    pub fn tick(&mut self) -> Result<()> {
        let own = self.node.ok_or(Error::NotConfigured)?;
        self.ensure_bus_on()?;
        if own.is_master() && !self.discovery.is_finished() {
            self.scan_next(own);
        }
        self.dispatch_requests(own)
    }

    /// Install a handler that feeds the transmitter from its interrupt.
    pub fn install_tx_handler(&mut self, handler: Option<TxReadyHandler>) -> Result<()> {
        self.transport.install_tx_ready_handler(handler)
    }

    /// Restart interrupt driven transfers after the handler ran dry.
    pub fn trigger_tx_handler(&mut self) -> Result<()> {
        self.transport.trigger_tx_ready_handler()
    }
}

/// Hand a packet to the transport.
pub(crate) fn transmit<T: Transport + ?Sized>(transport: &mut T, packet: &Packet) -> Result<()> {
    transport.send(packet).map_err(|err| {
        warn!("Failed to send frame to {}: {err}", packet.id.node);
        Error::Transmit
    })?;
    debug!(
        "sent {}: node={} service={:?} control=0x{:0>4X} len={} data={:02X?}",
        if packet.id.is_ack() { "ACK" } else { "REQ" },
        packet.id.node,
        packet.id.service,
        packet.id.control,
        packet.len(),
        packet.data(),
    );
    Ok(())
}
