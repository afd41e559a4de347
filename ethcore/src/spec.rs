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

//! Parameters for a chain: genesis block, difficulty schedule constants,
//! block reward and premined balances.

use ethereum_types::{Address, H256, U256};
use parity_bytes::Bytes;

use crate::error::Error;
use crate::state::{State, StateDB};
use crate::types::block::Block;
use crate::types::header::Header;

/// Parameters common to all blocks of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSpec {
	/// User-friendly name for the chain.
	pub name: String,
	/// Network id for the wire protocol.
	pub network_id: U256,
	/// Minimum difficulty any block may carry.
	pub min_difficulty: U256,
	/// Divisor of the per-block difficulty adjustment step.
	pub difficulty_bound_divisor: U256,
	/// Blocks sealed within this many seconds of their parent push the
	/// difficulty up.
	pub duration_limit: u64,
	/// Reward credited to the author of each block.
	pub block_reward: U256,
	/// Nonce assigned to accounts on first touch.
	pub account_start_nonce: U256,
	/// Author of the genesis block.
	pub genesis_author: Address,
	/// Difficulty of the genesis block.
	pub genesis_difficulty: U256,
	/// Gas limit of the genesis block, inherited by children.
	pub genesis_gas_limit: U256,
	/// Timestamp of the genesis block.
	pub genesis_timestamp: u64,
	/// Extra data of the genesis block.
	pub genesis_extra_data: Bytes,
	/// Balances present from the genesis state onwards.
	pub premine: Vec<(Address, U256)>,
}

impl Default for ChainSpec {
	fn default() -> Self {
		ChainSpec {
			name: "frontier".into(),
			network_id: U256::one(),
			min_difficulty: 0x20000.into(),
			difficulty_bound_divisor: 0x800.into(),
			duration_limit: 13,
			block_reward: U256::from(5) * U256::exp10(18),
			account_start_nonce: U256::zero(),
			genesis_author: Address::zero(),
			genesis_difficulty: 0x20000.into(),
			genesis_gas_limit: 0x2fefd8.into(),
			genesis_timestamp: 0,
			genesis_extra_data: Bytes::new(),
			premine: Vec::new(),
		}
	}
}

impl ChainSpec {
	/// A spec sealing instantly: every nonce meets difficulty one. Premines
	/// a handful of low addresses so tests can spend immediately.
	pub fn test() -> Self {
		ChainSpec {
			name: "test".into(),
			network_id: 0x11.into(),
			min_difficulty: U256::one(),
			genesis_difficulty: U256::one(),
			block_reward: U256::exp10(18),
			premine: (1..=5)
				.map(|i| (Address::from_low_u64_be(i), U256::exp10(21)))
				.collect(),
			..Default::default()
		}
	}

	/// Make sure the genesis state is present in `db`, committing it if
	/// missing, and return its root.
	pub fn ensure_db_good(&self, db: &mut StateDB) -> Result<H256, Error> {
		let mut state = State::new(
			db.boxed_clone(),
			self.genesis_author,
			self.account_start_nonce,
		);
		for (address, balance) in &self.premine {
			state.add_balance(address, *balance);
		}
		let root = state.commit();
		if !db.contains(&root) {
			let mut batch = kvdb::DBTransaction::new();
			state.journal_under(&mut batch);
			db.backing().write(batch)?;
			info!(target: "client", "Committed genesis state for chain '{}' (root {:?})", self.name, root);
		}
		Ok(root)
	}

	/// The genesis header, given the genesis state root.
	pub fn genesis_header(&self, state_root: H256) -> Header {
		Header {
			parent_hash: H256::zero(),
			author: self.genesis_author,
			state_root,
			receipts_root: keccak_hash::KECCAK_NULL_RLP,
			log_bloom: Default::default(),
			difficulty: self.genesis_difficulty,
			number: 0,
			gas_limit: self.genesis_gas_limit,
			gas_used: U256::zero(),
			timestamp: self.genesis_timestamp,
			extra_data: self.genesis_extra_data.clone(),
			nonce: 0,
		}
	}

	/// RLP of the genesis block.
	pub fn genesis_block(&self, state_root: H256) -> Bytes {
		Block {
			header: self.genesis_header(state_root),
			transactions: Vec::new(),
		}
		.rlp_bytes()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use ethereum_types::{Address, U256};
	use crate::state::{State, StateDB};
	use super::ChainSpec;

	#[test]
	fn genesis_state_is_reproducible() {
		let spec = ChainSpec::test();
		let mut db_a = StateDB::new(Arc::new(kvdb_memorydb::create(crate::db::NUM_COLUMNS)));
		let mut db_b = StateDB::new(Arc::new(kvdb_memorydb::create(crate::db::NUM_COLUMNS)));
		let root_a = spec.ensure_db_good(&mut db_a).unwrap();
		let root_b = spec.ensure_db_good(&mut db_b).unwrap();
		assert_eq!(root_a, root_b);
		assert_eq!(spec.genesis_header(root_a).hash(), spec.genesis_header(root_b).hash());
	}

	#[test]
	fn premine_is_spendable() {
		let spec = ChainSpec::test();
		let mut db = StateDB::new(Arc::new(kvdb_memorydb::create(crate::db::NUM_COLUMNS)));
		let root = spec.ensure_db_good(&mut db).unwrap();
		let state = State::from_existing(db, root, Address::zero(), U256::zero()).unwrap();
		assert_eq!(state.balance(&Address::from_low_u64_be(1)), U256::exp10(21));
	}

	#[test]
	fn ensure_db_good_is_idempotent() {
		let spec = ChainSpec::test();
		let mut db = StateDB::new(Arc::new(kvdb_memorydb::create(crate::db::NUM_COLUMNS)));
		assert_eq!(
			spec.ensure_db_good(&mut db).unwrap(),
			spec.ensure_db_good(&mut db).unwrap()
		);
	}
}
