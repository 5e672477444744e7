// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::*;

/// Discovery state of one slave address.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Still searching, at least one ping left.
    Searching { pings_left: u8 },
    /// Discovered, its pong reply is stored at this pool index.
    Found(usize),
    /// Given up, either no reply or no free pool slot.
    NotFound,
}

impl SlotState {
    const fn initial(retries: u8) -> Self {
        if retries == 0 {
            Self::NotFound
        } else {
            Self::Searching {
                pings_left: retries,
            }
        }
    }

    #[must_use]
    pub const fn is_resolved(self) -> bool {
        !matches!(self, Self::Searching { .. })
    }
}

/// Index table and info pool of the slave scan.
#[derive(Debug, Clone)]
pub(crate) struct Discovery<const POOL: usize> {
    cursor: Option<NodeId>,
    slots: [SlotState; NODE_COUNT],
    pool: [Message; POOL],
    finished: bool,
}

impl<const POOL: usize> Discovery<POOL> {
    pub(crate) const fn new(retries: u8) -> Self {
        Self {
            cursor: None,
            slots: [SlotState::initial(retries); NODE_COUNT],
            pool: [Message::EMPTY; POOL],
            finished: false,
        }
    }

    pub(crate) fn reset(&mut self, retries: u8) {
        *self = Self::new(retries);
    }

    pub(crate) const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Move the cursor to the next address of the window, skipping `own`.
    fn advance(&mut self, config: &Config, own: NodeId) -> Option<NodeId> {
        for _ in 0..config.window_len() {
            let next = match self.cursor {
                Some(id)
                    if id.value() >= config.slave_nodes_begin
                        && id.value() < config.slave_nodes_end =>
                {
                    id.value() + 1
                }
                _ => config.slave_nodes_begin,
            };
            let next = NodeId::from_truncating(next);
            self.cursor = Some(next);
            if next != own {
                return Some(next);
            }
        }
        None
    }

    fn slot(&self, config: &Config, id: NodeId) -> Option<SlotState> {
        config
            .contains(id.value())
            .then(|| self.slots[usize::from(id.value() - config.slave_nodes_begin)])
    }

    fn slot_mut(&mut self, config: &Config, id: NodeId) -> Option<&mut SlotState> {
        if !config.contains(id.value()) {
            return None;
        }
        self.slots
            .get_mut(usize::from(id.value() - config.slave_nodes_begin))
    }

    /// Store a pong reply in the first free pool slot.
    fn allocate(&mut self, msg: Message) -> Option<usize> {
        let index = self
            .pool
            .iter()
            .position(|info| info.protocol_version() == 0)?;
        self.pool[index] = msg;
        Some(index)
    }

    /// Every address of the window but `own` is resolved.
    fn is_complete(&self, config: &Config, own: NodeId) -> bool {
        (config.slave_nodes_begin..=config.slave_nodes_end)
            .map(NodeId::from_truncating)
            .filter(|id| *id != own)
            .all(|id| self.slot(config, id).is_some_and(SlotState::is_resolved))
    }
}

impl<T, A, const POOL: usize> Engine<T, A, POOL>
where
    T: Transport,
    A: Application,
{
    /// `true` once every slave address has been found or given up.
    #[must_use]
    pub const fn scan_finished(&self) -> bool {
        self.discovery.is_finished()
    }

    /// Forget all discovered slaves and restart the scan.
    pub fn reconnect(&mut self) {
        self.discovery.reset(self.config.scan_retries);
    }

    /// Discovery state of a slave address, `None` outside of the window.
    #[must_use]
    pub fn slot_state(&self, slave: NodeId) -> Option<SlotState> {
        self.discovery.slot(&self.config, slave)
    }

    /// The pong reply of a discovered slave.
    ///
    /// Returns `Ok(None)` if no slave has been found at this address (yet).
    pub fn slave_node_info(&self, slave: NodeId) -> Result<Option<NodeInfo>> {
        let own = self.node.ok_or(Error::NotConfigured)?;
        if !own.is_master() {
            return Err(Error::NotMaster);
        }
        match self.discovery.slot(&self.config, slave) {
            None => Err(Error::InvalidRange(slave.value())),
            Some(SlotState::Found(index)) => Ok(Some(self.discovery.pool[index].node_info())),
            Some(_) => Ok(None),
        }
    }

    /// All discovered slaves in address order.
    pub fn discovered_slaves(&self) -> impl Iterator<Item = (NodeId, NodeInfo)> + '_ {
        let config = &self.config;
        (config.slave_nodes_begin..=config.slave_nodes_end)
            .map(NodeId::from_truncating)
            .filter_map(move |id| match self.discovery.slot(config, id) {
                Some(SlotState::Found(index)) => Some((id, self.discovery.pool[index].node_info())),
                _ => None,
            })
    }

    /// One scan sweep: ping the next unresolved slave.
    pub(crate) fn scan_next(&mut self, own: NodeId) {
        if let Some(slave) = self.discovery.advance(&self.config, own) {
            self.ping_slave(slave);
        }
        if !self.discovery.finished && self.discovery.is_complete(&self.config, own) {
            debug!("Scan finished");
            self.discovery.finished = true;
        }
    }

    fn ping_slave(&mut self, slave: NodeId) {
        let Some(slot) = self.discovery.slot_mut(&self.config, slave) else {
            return;
        };
        let SlotState::Searching { pings_left } = *slot else {
            return;
        };
        let pings_left = pings_left - 1;
        *slot = if pings_left == 0 {
            SlotState::NotFound
        } else {
            SlotState::Searching { pings_left }
        };

        let timeout = self.config.scan_timeout_polls;
        let pong = self
            .send_request(slave, RequestType::Ping, 0x0000, Message::EMPTY, 0)
            .and_then(|()| self.wait_ack_within(slave, timeout));
        let ack = match pong {
            Ok(ack) => ack,
            Err(err) => {
                debug!("No pong from slave {slave}: {err}");
                return;
            }
        };
        if ack.msg.protocol_version() == 0 {
            warn!("Ignored pong of slave {slave} without protocol version");
            return;
        }

        let state = match self.discovery.allocate(ack.msg) {
            Some(index) => {
                let info = ack.msg.node_info();
                debug!(
                    "New slave found: ID {slave} (Ix={index}) P:{} T:{} V:{}.{}",
                    info.protocol_version,
                    info.node_type_str().unwrap_or("????"),
                    info.node_version,
                    info.node_subversion
                );
                SlotState::Found(index)
            }
            None => {
                warn!("Slave {slave} found: {}", Error::PoolExhausted);
                SlotState::NotFound
            }
        };
        if let Some(slot) = self.discovery.slot_mut(&self.config, slave) {
            *slot = state;
        }
    }
}
