// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::*;

/// Error state flags of the protocol.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProtocolHealth {
    /// A bus fault aborted the pending transactions.
    pub panic: bool,
    /// The bus is unusable until the node is re-initialized.
    pub permanent_off: bool,
}

/// Escalation level of the bus health monitor.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusHealth {
    Normal,
    Panic,
    PermanentOff,
}

impl From<ProtocolHealth> for BusHealth {
    fn from(health: ProtocolHealth) -> Self {
        if health.permanent_off {
            Self::PermanentOff
        } else if health.panic {
            Self::Panic
        } else {
            Self::Normal
        }
    }
}

impl<T, A, const POOL: usize> Engine<T, A, POOL>
where
    T: Transport,
    A: Application,
{
    #[must_use]
    pub fn health(&self) -> BusHealth {
        self.health.into()
    }

    #[must_use]
    pub const fn health_flags(&self) -> ProtocolHealth {
        self.health
    }

    /// `Ok` while the bus is usable.
    pub fn error_state(&self) -> Result<()> {
        match self.health() {
            BusHealth::Normal => Ok(()),
            BusHealth::Panic => Err(Error::BusPanic),
            BusHealth::PermanentOff => Err(Error::BusPermanentOff),
        }
    }

    /// Fail without touching the transport once the bus is off.
    pub(crate) fn ensure_bus_on(&self) -> Result<()> {
        if self.health.permanent_off {
            return Err(Error::BusPermanentOff);
        }
        Ok(())
    }

    /// Poll the transport for bus faults and escalate.
    ///
    /// There is no recovery: a fault latches the permanent off state until
    /// the node is re-initialized.
    pub(crate) fn check_bus(&mut self) -> Result<()> {
        self.ensure_bus_on()?;
        if let Err(err) = self.transport.check_bus_fault() {
            self.health.panic = true;
            error!("Bus errors detected ({err}), permanent off state reached");
            self.health.permanent_off = true;
            return Err(Error::BusPermanentOff);
        }
        Ok(())
    }
}
