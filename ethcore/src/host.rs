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

//! The seam to the peer-to-peer host.
//!
//! The client hands the host an `EthereumHost` capability (the chain and
//! queues peers are served from) and receives a weak handle back. The host
//! outlives or predeceases the client independently; when the handle no
//! longer upgrades, every dependent operation degrades to a no-op.

use std::sync::{Arc, Weak};

use ethereum_types::U256;

use crate::block_queue::BlockQueue;
use crate::blockchain::BlockChain;
use crate::transaction_queue::TransactionQueue;

/// The capability the client registers with the host: everything the wire
/// protocol needs to serve and ingest chain data.
pub struct EthereumHost {
	/// The canonical chain.
	pub chain: Arc<BlockChain>,
	/// Pending transactions to relay.
	pub transaction_queue: Arc<TransactionQueue>,
	/// Where peers deliver candidate blocks.
	pub block_queue: Arc<BlockQueue>,
	/// Network this capability speaks on.
	pub network_id: U256,
}

impl EthereumHost {
	/// Bundle up the client's sync surface.
	pub fn new(
		chain: Arc<BlockChain>,
		transaction_queue: Arc<TransactionQueue>,
		block_queue: Arc<BlockQueue>,
		network_id: U256,
	) -> EthereumHost {
		EthereumHost {
			chain,
			transaction_queue,
			block_queue,
			network_id,
		}
	}
}

/// The host-side surface the client drives through its weak handle.
pub trait HostHandle: Send + Sync {
	/// Change the network id announced to peers.
	fn set_network_id(&self, network_id: U256);
	/// Whether a chain download is in progress.
	fn is_syncing(&self) -> bool;
	/// New pending transactions are available for relay.
	fn note_new_transactions(&self);
	/// New blocks are available for relay.
	fn note_new_blocks(&self);
	/// Forget all peer state; used when the chain is killed.
	fn reset(&self);
}

/// A peer-to-peer host able to register the Ethereum capability.
pub trait Host: Send + Sync {
	/// Register `capability`, receiving the weak handle the client keeps.
	fn register_capability(&self, capability: Arc<EthereumHost>) -> Weak<dyn HostHandle>;
}
