// Copyright 2015-2018 Parity Technologies (UK) Ltd.
// This file is part of Parity.

// Parity is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Parity is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Parity.  If not, see <http://www.gnu.org/licenses/>.

//! Ethereum client core.
//!
//! Ties together the persistent block chain, the pending-transaction queue,
//! the incoming block queue, the pre-mine/post-mine state pair, a pool of
//! local miners plus one remote mining endpoint, and the filter/watch
//! notification subsystem, and drives them through a periodic work cycle
//! that keeps every piece mutually consistent.
//!
//! Construct a [`client::Client`] over a key-value backend and a peer host;
//! push raw transactions with `inject`, push candidate blocks through the
//! registered capability, and poll watches for localised log changes.

#[macro_use]
extern crate log;

pub mod block_queue;
pub mod blockchain;
pub mod client;
pub mod db;
pub mod error;
pub mod executive;
pub mod gas_pricer;
pub mod host;
pub mod miner;
pub mod pow;
pub mod spec;
pub mod state;
pub mod transaction_queue;
pub mod types;
pub mod version;

#[cfg(test)]
pub mod test_helpers;
#[cfg(test)]
mod tests;

pub use crate::client::{Client, ClientConfig};
pub use crate::error::{Error, ImportError};
pub use crate::executive::{ExecutionError, ExecutionResult};
pub use crate::gas_pricer::GasPricer;
pub use crate::spec::ChainSpec;
pub use crate::version::{VersionChecker, WithExisting};
