// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{Error, NODE_COUNT};

/// Engine settings
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// First slave id covered by discovery.
    pub slave_nodes_begin: u8,
    /// Last slave id covered by discovery (inclusive).
    pub slave_nodes_end: u8,
    /// Number of pings sent to an address before it is given up.
    pub scan_retries: u8,
    /// Polling ceiling of [`Engine::wait_ack`](crate::Engine::wait_ack).
    ///
    /// At the expected call rate 5000 polls take about 10 ms.
    pub ack_timeout_polls: u32,
    /// Polling ceiling while waiting for a pong during discovery.
    pub scan_timeout_polls: u32,
    /// Consecutive empty polls a locked node keeps waiting for the next
    /// request before the tick returns.
    pub locked_idle_polls: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            slave_nodes_begin: 0x00,
            slave_nodes_end: 0x0F,
            scan_retries: 4,
            ack_timeout_polls: 5000,
            scan_timeout_polls: 5000,
            locked_idle_polls: 5000,
        }
    }
}

impl Config {
    /// Check the slave window and the polling ceilings.
    pub fn validate(&self) -> Result<(), Error> {
        if usize::from(self.slave_nodes_end) >= NODE_COUNT {
            return Err(Error::InvalidNodeId(self.slave_nodes_end));
        }
        if self.slave_nodes_begin > self.slave_nodes_end {
            return Err(Error::InvalidRange(self.slave_nodes_begin));
        }
        if self.ack_timeout_polls == 0 || self.scan_timeout_polls == 0 {
            return Err(Error::InvalidConfig);
        }
        Ok(())
    }

    /// Whether `id` lies inside the slave window.
    #[must_use]
    pub const fn contains(&self, id: u8) -> bool {
        id >= self.slave_nodes_begin && id <= self.slave_nodes_end
    }

    /// Number of addresses inside the slave window.
    #[must_use]
    pub const fn window_len(&self) -> usize {
        (self.slave_nodes_end - self.slave_nodes_begin) as usize + 1
    }
}
