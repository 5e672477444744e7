// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![doc = include_str!("../README.md")]
#![no_std]

#[cfg(test)]
extern crate std;

#[macro_use]
extern crate log;

mod app;
pub mod codec;
mod config;
mod engine;
mod error;
mod frame;
mod transport;

#[cfg(test)]
mod mock;

pub use app::*;
pub use config::Config;
pub use engine::*;
pub use error::*;
pub use frame::*;
pub use transport::*;
