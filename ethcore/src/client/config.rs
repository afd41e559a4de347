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

//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use ethereum_types::Address;

/// Client configuration. `Default` gives sensible production values; tests
/// shrink the timing knobs instead of sleeping through them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
	/// Where the status record (and the backing database, managed by its
	/// owner) lives.
	pub db_path: PathBuf,
	/// Beneficiary of sealed blocks.
	pub author: Address,
	/// Number of local mining threads; `None` for hardware parallelism.
	pub miners: Option<usize>,
	/// Mine even when there is nothing in the queue and peers are syncing.
	pub force_mining: bool,
	/// Use the hardware-accelerated proof backend.
	pub turbo_mining: bool,
	/// Whether an accelerated proof backend is available at all. Together
	/// with `turbo_mining` this forces the pool to a single local miner.
	pub accelerated: bool,
	/// Most blocks the chain sync drains from the block queue per cycle.
	pub max_round_blocks: usize,
	/// Sleep between cycles when nothing happened.
	pub idle_back_off: Duration,
	/// How often garbage collection runs.
	pub gc_period: Duration,
	/// Watches unpolled for longer than this are uninstalled.
	pub watch_lifetime: Duration,
}

impl Default for ClientConfig {
	fn default() -> Self {
		ClientConfig {
			db_path: PathBuf::new(),
			author: Address::zero(),
			miners: None,
			force_mining: false,
			turbo_mining: false,
			accelerated: cfg!(feature = "accelerated-mining"),
			max_round_blocks: 100,
			idle_back_off: Duration::from_millis(100),
			gc_period: Duration::from_secs(5),
			watch_lifetime: Duration::from_secs(20),
		}
	}
}
