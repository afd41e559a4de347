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

//! The persistent append-only block chain.
//!
//! Blocks are verified and enacted on import; the canonical branch is the
//! one with the highest total difficulty, and switching to it yields the
//! retracted/enacted route a reorg needs. Reads are served from the backing
//! database; a single import lock serialises writers.

use std::collections::HashMap;
use std::sync::Arc;

use ethereum_types::{H256, U256};
use kvdb::{DBTransaction, KeyValueDB};
use parity_bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use rlp_derive::{RlpDecodable, RlpEncodable};

use crate::block_queue::BlockQueue;
use crate::db::{COL_BLOCKS, COL_EXTRA, COL_RECEIPTS};
use crate::error::{Error, ImportError};
use crate::pow;
use crate::spec::ChainSpec;
use crate::state::{self, StateDB};
use crate::types::block::Block;
use crate::types::header::{BlockNumber, Header};
use crate::types::receipt::{receipts_root, Receipt};
use crate::types::transaction::SignedTransaction;
use crate::version::WithExisting;

/// Keep at most this many block details in the in-memory cache between
/// garbage collections.
const MAX_DETAILS_CACHE: usize = 2048;

/// Familial details concerning a block.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct BlockDetails {
	/// Block number.
	pub number: BlockNumber,
	/// Total difficulty of the block and all its parents.
	pub total_difficulty: U256,
	/// Parent block hash.
	pub parent: H256,
}

/// Route the canonical chain took through an import.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ImportRoute {
	/// The imported block.
	pub imported: H256,
	/// Blocks that became canonical, oldest first. Empty for side-branch
	/// imports.
	pub enacted: Vec<H256>,
	/// Blocks that lost canonicity, oldest first.
	pub retracted: Vec<H256>,
}

#[derive(Debug, Clone, Copy)]
struct BestBlock {
	hash: H256,
	number: BlockNumber,
	total_difficulty: U256,
}

/// Structure providing fast access to blockchain data.
pub struct BlockChain {
	spec: Arc<ChainSpec>,
	db: Arc<dyn KeyValueDB>,
	genesis: Bytes,
	best: RwLock<BestBlock>,
	details_cache: RwLock<HashMap<H256, BlockDetails>>,
	import_lock: Mutex<()>,
}

impl BlockChain {
	/// Open (or create) the chain over `db`. `genesis` is the RLP of the
	/// genesis block; with `WithExisting::Kill` any existing chain data is
	/// wiped first, with `WithExisting::Verify` the canonical index is
	/// checked and rebuilt from genesis when inconsistent.
	pub fn new(
		spec: Arc<ChainSpec>,
		genesis: Bytes,
		db: Arc<dyn KeyValueDB>,
		with: WithExisting,
	) -> Result<BlockChain, Error> {
		let chain = BlockChain {
			spec,
			db,
			genesis,
			best: RwLock::new(BestBlock {
				hash: H256::zero(),
				number: 0,
				total_difficulty: U256::zero(),
			}),
			details_cache: RwLock::new(HashMap::new()),
			import_lock: Mutex::new(()),
		};
		if with == WithExisting::Kill {
			info!(target: "client", "Wiping existing chain data");
			chain.wipe()?;
		}
		chain.ensure_genesis()?;
		if with == WithExisting::Verify && !chain.verify_index() {
			warn!(target: "client", "Canonical index inconsistent; rebuilding chain from genesis");
			chain.wipe()?;
			chain.ensure_genesis()?;
		}
		Ok(chain)
	}

	/// Wipe all chain data and start again from the genesis block.
	pub fn reopen(&self, with: WithExisting) -> Result<(), Error> {
		let _lock = self.import_lock.lock();
		if with == WithExisting::Kill {
			self.wipe()?;
		}
		self.details_cache.write().clear();
		self.ensure_genesis()
	}

	fn wipe(&self) -> Result<(), Error> {
		let mut batch = DBTransaction::new();
		batch.delete_prefix(COL_BLOCKS, &[]);
		batch.delete_prefix(COL_RECEIPTS, &[]);
		batch.delete_prefix(COL_EXTRA, &[]);
		self.db.write(batch)?;
		self.details_cache.write().clear();
		Ok(())
	}

	fn ensure_genesis(&self) -> Result<(), Error> {
		if let Some(best) = self.read_best()? {
			*self.best.write() = best;
			return Ok(());
		}
		let genesis: Block = rlp::decode(&self.genesis)?;
		let hash = genesis.header.hash();
		let details = BlockDetails {
			number: 0,
			total_difficulty: genesis.header.difficulty,
			parent: H256::zero(),
		};
		let mut batch = DBTransaction::new();
		batch.put(COL_BLOCKS, hash.as_bytes(), &self.genesis);
		batch.put(COL_EXTRA, &details_key(&hash), &rlp::encode(&details));
		batch.put(COL_EXTRA, &number_key(0), hash.as_bytes());
		batch.put(COL_EXTRA, b"best", hash.as_bytes());
		self.db.write(batch)?;
		*self.best.write() = BestBlock {
			hash,
			number: 0,
			total_difficulty: genesis.header.difficulty,
		};
		trace!(target: "client", "Initialised chain at genesis {:?}", hash);
		Ok(())
	}

	fn read_best(&self) -> Result<Option<BestBlock>, Error> {
		let hash = match self.db.get(COL_EXTRA, b"best")? {
			Some(raw) => H256::from_slice(&raw),
			None => return Ok(None),
		};
		match self.block_details(&hash) {
			Some(details) => Ok(Some(BestBlock {
				hash,
				number: details.number,
				total_difficulty: details.total_difficulty,
			})),
			None => Ok(None),
		}
	}

	fn verify_index(&self) -> bool {
		let best = *self.best.read();
		let mut hash = best.hash;
		let mut number = best.number;
		loop {
			if self.block_hash(number) != Some(hash) {
				return false;
			}
			if number == 0 {
				return true;
			}
			match self.block_details(&hash) {
				Some(details) => {
					hash = details.parent;
					number -= 1;
				}
				None => return false,
			}
		}
	}

	/// The chain parameters this chain was opened with.
	pub fn spec(&self) -> &ChainSpec {
		&self.spec
	}

	/// Hash of the genesis block.
	pub fn genesis_hash(&self) -> H256 {
		self.block_hash(0).expect("genesis is inserted on open; qed")
	}

	/// Hash of the canonical head.
	pub fn best_block_hash(&self) -> H256 {
		self.best.read().hash
	}

	/// Number of the canonical head.
	pub fn best_block_number(&self) -> BlockNumber {
		self.best.read().number
	}

	/// Total difficulty of the canonical head.
	pub fn best_block_total_difficulty(&self) -> U256 {
		self.best.read().total_difficulty
	}

	/// Header of the canonical head.
	pub fn best_block_header(&self) -> Header {
		self.block_header(&self.best_block_hash())
			.expect("best block is always stored; qed")
	}

	/// Raw block bytes by hash.
	pub fn block(&self, hash: &H256) -> Option<Bytes> {
		self.db
			.get(COL_BLOCKS, hash.as_bytes())
			.unwrap_or_else(|e| {
				warn!(target: "client", "Backing database read failed: {}", e);
				None
			})
	}

	/// Decoded header by hash.
	pub fn block_header(&self, hash: &H256) -> Option<Header> {
		let raw = self.block(hash)?;
		rlp::decode::<Block>(&raw).ok().map(|b| b.header)
	}

	/// Canonical block hash at `number`.
	pub fn block_hash(&self, number: BlockNumber) -> Option<H256> {
		self.db
			.get(COL_EXTRA, &number_key(number))
			.ok()
			.flatten()
			.map(|raw| H256::from_slice(&raw))
	}

	/// Familial details of a block.
	pub fn block_details(&self, hash: &H256) -> Option<BlockDetails> {
		if let Some(details) = self.details_cache.read().get(hash) {
			return Some(details.clone());
		}
		let raw = self.db.get(COL_EXTRA, &details_key(hash)).ok().flatten()?;
		let details: BlockDetails = rlp::decode(&raw).ok()?;
		self.details_cache.write().insert(*hash, details.clone());
		Some(details)
	}

	/// Whether the block is part of the chain store (canonical or not).
	pub fn is_known(&self, hash: &H256) -> bool {
		self.block_details(hash).is_some()
	}

	/// The block's transactions.
	pub fn transactions(&self, hash: &H256) -> Vec<SignedTransaction> {
		self.block(hash)
			.and_then(|raw| rlp::decode::<Block>(&raw).ok())
			.map_or_else(Vec::new, |b| b.transactions)
	}

	/// Hashes of the block's transactions.
	pub fn transaction_hashes(&self, hash: &H256) -> Vec<H256> {
		self.transactions(hash).iter().map(|t| t.hash()).collect()
	}

	/// The block's receipts.
	pub fn receipts(&self, hash: &H256) -> Vec<Receipt> {
		self.db
			.get(COL_RECEIPTS, hash.as_bytes())
			.ok()
			.flatten()
			.and_then(|raw| rlp::Rlp::new(&raw).as_list().ok())
			.unwrap_or_default()
	}

	/// Hashes of the most recent blocks, head's parent first, at most 256.
	pub fn last_hashes(&self) -> Vec<H256> {
		self.last_hashes_from(self.best_block_hash())
	}

	fn last_hashes_from(&self, mut hash: H256) -> Vec<H256> {
		let mut hashes = Vec::with_capacity(256);
		for _ in 0..256 {
			hashes.push(hash);
			match self.block_details(&hash) {
				Some(details) if details.number > 0 => hash = details.parent,
				_ => break,
			}
		}
		hashes
	}

	/// Import a block, enacting it against the state at its parent.
	/// Returns the hashes that became canonical (oldest first) and the
	/// canonical head after the import.
	pub fn attempt_import(
		&self,
		bytes: &[u8],
		state_db: &StateDB,
	) -> Result<(Vec<H256>, H256), Error> {
		let route = self.import_block(bytes, state_db)?;
		Ok((route.enacted, self.best_block_hash()))
	}

	/// Import a block, returning the full canonical route it caused.
	pub fn import_block(&self, bytes: &[u8], state_db: &StateDB) -> Result<ImportRoute, Error> {
		let block: Block = rlp::decode(bytes)?;
		let header = block.header.clone();
		let hash = header.hash();

		let _lock = self.import_lock.lock();
		if self.is_known(&hash) {
			return Err(ImportError::AlreadyInChain.into());
		}
		let parent_details = self
			.block_details(&header.parent_hash)
			.ok_or(ImportError::UnknownParent(header.parent_hash))?;
		let parent = self
			.block_header(&header.parent_hash)
			.ok_or(ImportError::UnknownParent(header.parent_hash))?;

		self.verify_family(&header, &parent)?;
		pow::verify_seal(&header)?;

		let (mut state, receipts) = state::enact(
			state_db.boxed_clone(),
			&self.spec,
			&parent,
			&block,
			self.last_hashes_from(header.parent_hash),
		)?;
		if state.root() != header.state_root {
			return Err(ImportError::InvalidStateRoot {
				expected: header.state_root,
				found: state.root(),
			}
			.into());
		}
		let found_receipts_root = receipts_root(&receipts);
		if found_receipts_root != header.receipts_root {
			return Err(ImportError::InvalidReceiptsRoot {
				expected: header.receipts_root,
				found: found_receipts_root,
			}
			.into());
		}

		let total_difficulty = parent_details.total_difficulty + header.difficulty;
		let details = BlockDetails {
			number: header.number,
			total_difficulty,
			parent: header.parent_hash,
		};

		// persist the block itself first so the route computation below can
		// see its details; canonicality is decided in a second batch.
		let mut batch = DBTransaction::new();
		state.journal_under(&mut batch);
		batch.put(COL_BLOCKS, hash.as_bytes(), bytes);
		batch.put(COL_RECEIPTS, hash.as_bytes(), &rlp::encode_list::<Receipt, _>(&receipts));
		batch.put(COL_EXTRA, &details_key(&hash), &rlp::encode(&details));
		self.db.write(batch)?;

		let best = *self.best.read();
		let mut route = ImportRoute {
			imported: hash,
			enacted: Vec::new(),
			retracted: Vec::new(),
		};
		if total_difficulty > best.total_difficulty {
			let (retracted, enacted) = self
				.tree_route(best.hash, hash)
				.expect("both ends are stored at this point; qed");
			let mut batch = DBTransaction::new();
			for enacted_hash in &enacted {
				let number = self
					.block_details(enacted_hash)
					.expect("enacted blocks are stored; qed")
					.number;
				batch.put(COL_EXTRA, &number_key(number), enacted_hash.as_bytes());
			}
			// the displaced branch may have been longer; drop its tail index.
			for number in (header.number + 1)..=best.number {
				batch.delete(COL_EXTRA, &number_key(number));
			}
			batch.put(COL_EXTRA, b"best", hash.as_bytes());
			route.enacted = enacted;
			route.retracted = retracted;
			self.db.write(batch)?;
			*self.best.write() = BestBlock {
				hash,
				number: header.number,
				total_difficulty,
			};
			if !route.retracted.is_empty() {
				info!(target: "client", "Reorg to {:?}: retracted {}, enacted {}", hash, route.retracted.len(), route.enacted.len());
			}
		} else {
			trace!(target: "client", "Imported side-branch block {:?} (td {} <= best {})", hash, total_difficulty, best.total_difficulty);
		}
		Ok(route)
	}

	fn verify_family(&self, header: &Header, parent: &Header) -> Result<(), ImportError> {
		if header.number != parent.number + 1 {
			return Err(ImportError::InvalidNumber {
				expected: parent.number + 1,
				found: header.number,
			});
		}
		if header.timestamp <= parent.timestamp {
			return Err(ImportError::InvalidTimestamp {
				parent: parent.timestamp,
				found: header.timestamp,
			});
		}
		if header.gas_limit != parent.gas_limit {
			return Err(ImportError::InvalidGasLimit {
				expected: parent.gas_limit,
				found: header.gas_limit,
			});
		}
		let expected = pow::child_difficulty(&self.spec, parent, header.timestamp);
		if header.difficulty != expected {
			return Err(ImportError::InvalidDifficulty {
				expected,
				found: header.difficulty,
			});
		}
		Ok(())
	}

	/// The route between two branch tips: blocks to retract from `from`'s
	/// branch and blocks to enact from `to`'s branch, both oldest first.
	pub fn tree_route(&self, from: H256, to: H256) -> Option<(Vec<H256>, Vec<H256>)> {
		let mut retracted = Vec::new();
		let mut enacted = Vec::new();
		let mut from_branch = (from, self.block_details(&from)?);
		let mut to_branch = (to, self.block_details(&to)?);

		while from_branch.1.number > to_branch.1.number {
			retracted.push(from_branch.0);
			let parent = from_branch.1.parent;
			from_branch = (parent, self.block_details(&parent)?);
		}
		while to_branch.1.number > from_branch.1.number {
			enacted.push(to_branch.0);
			let parent = to_branch.1.parent;
			to_branch = (parent, self.block_details(&parent)?);
		}
		while from_branch.0 != to_branch.0 {
			retracted.push(from_branch.0);
			enacted.push(to_branch.0);
			let from_parent = from_branch.1.parent;
			let to_parent = to_branch.1.parent;
			from_branch = (from_parent, self.block_details(&from_parent)?);
			to_branch = (to_parent, self.block_details(&to_parent)?);
		}
		retracted.reverse();
		enacted.reverse();
		Some((retracted, enacted))
	}

	/// Drain the block queue into the chain, importing at most `max`
	/// blocks. Returns the hashes newly canonical (`fresh`), the hashes
	/// newly detached (`dead`), and whether the queue still holds work.
	pub fn sync(
		&self,
		queue: &BlockQueue,
		state_db: &StateDB,
		max: usize,
	) -> (Vec<H256>, Vec<H256>, bool) {
		let mut fresh = Vec::new();
		let mut dead = Vec::new();
		for bytes in queue.drain(max) {
			match self.import_block(&bytes, state_db) {
				Ok(route) => {
					dead.extend(route.retracted);
					fresh.extend(route.enacted);
				}
				Err(e) => {
					debug!(target: "client", "Rejecting queued block: {}", e);
				}
			}
		}
		(fresh, dead, !queue.is_empty())
	}

	/// Trim in-memory caches.
	pub fn collect_garbage(&self) {
		let mut cache = self.details_cache.write();
		if cache.len() > MAX_DETAILS_CACHE {
			trace!(target: "client", "Dropping {} cached block details", cache.len());
			cache.clear();
		}
	}
}

fn details_key(hash: &H256) -> Vec<u8> {
	let mut key = Vec::with_capacity(33);
	key.push(b'd');
	key.extend_from_slice(hash.as_bytes());
	key
}

fn number_key(number: BlockNumber) -> Vec<u8> {
	let mut key = Vec::with_capacity(9);
	key.push(b'n');
	key.extend_from_slice(&number.to_be_bytes());
	key
}

#[cfg(test)]
mod tests {
	use crate::test_helpers::{build_block, new_chain_and_state, transfer};
	use crate::version::WithExisting;

	#[test]
	fn opens_at_genesis() {
		let (chain, _state_db) = new_chain_and_state();
		assert_eq!(chain.best_block_number(), 0);
		assert_eq!(chain.best_block_hash(), chain.genesis_hash());
		assert_eq!(
			chain.best_block_total_difficulty(),
			chain.spec().genesis_difficulty
		);
	}

	#[test]
	fn imports_a_linear_chain() {
		let (chain, state_db) = new_chain_and_state();
		let b1 = build_block(&chain, &state_db, chain.genesis_hash(), vec![transfer(1, 0)], 0);
		let b2_parent = rlp::decode::<crate::types::block::Block>(&b1).unwrap().header.hash();
		let (enacted, head) = chain.attempt_import(&b1, &state_db).unwrap();
		assert_eq!(enacted, vec![b2_parent]);
		assert_eq!(head, b2_parent);

		let b2 = build_block(&chain, &state_db, head, vec![], 0);
		chain.attempt_import(&b2, &state_db).unwrap();
		assert_eq!(chain.best_block_number(), 2);
		assert_eq!(chain.transactions(&b2_parent).len(), 1);
		assert_eq!(chain.receipts(&b2_parent).len(), 1);
	}

	#[test]
	fn rejects_duplicate_import() {
		let (chain, state_db) = new_chain_and_state();
		let b1 = build_block(&chain, &state_db, chain.genesis_hash(), vec![], 0);
		chain.attempt_import(&b1, &state_db).unwrap();
		assert!(chain.attempt_import(&b1, &state_db).is_err());
	}

	#[test]
	fn heavier_branch_wins() {
		let (chain, state_db) = new_chain_and_state();
		let genesis = chain.genesis_hash();

		let a1 = build_block(&chain, &state_db, genesis, vec![transfer(1, 0)], 0);
		let a1_hash = crate::test_helpers::block_hash(&a1);
		chain.attempt_import(&a1, &state_db).unwrap();
		assert_eq!(chain.best_block_hash(), a1_hash);

		// side branch of equal length does not displace the head...
		let b1 = build_block(&chain, &state_db, genesis, vec![], 1);
		let b1_hash = crate::test_helpers::block_hash(&b1);
		let route = chain.import_block(&b1, &state_db).unwrap();
		assert!(route.enacted.is_empty());
		assert_eq!(chain.best_block_hash(), a1_hash);

		// ...until it grows heavier.
		let b2 = build_block(&chain, &state_db, b1_hash, vec![], 1);
		let b2_hash = crate::test_helpers::block_hash(&b2);
		let route = chain.import_block(&b2, &state_db).unwrap();
		assert_eq!(route.retracted, vec![a1_hash]);
		assert_eq!(route.enacted, vec![b1_hash, b2_hash]);
		assert_eq!(chain.best_block_hash(), b2_hash);
		assert_eq!(chain.block_hash(1), Some(b1_hash));
		assert_eq!(chain.block_hash(2), Some(b2_hash));
	}

	#[test]
	fn reopen_with_kill_resets_to_genesis() {
		let (chain, state_db) = new_chain_and_state();
		let b1 = build_block(&chain, &state_db, chain.genesis_hash(), vec![], 0);
		chain.attempt_import(&b1, &state_db).unwrap();
		assert_eq!(chain.best_block_number(), 1);
		chain.reopen(WithExisting::Kill).unwrap();
		assert_eq!(chain.best_block_number(), 0);
		assert_eq!(chain.best_block_hash(), chain.genesis_hash());
	}

	#[test]
	fn total_difficulty_accumulates() {
		let (chain, state_db) = new_chain_and_state();
		let d0 = chain.best_block_total_difficulty();
		let b1 = build_block(&chain, &state_db, chain.genesis_hash(), vec![], 0);
		chain.attempt_import(&b1, &state_db).unwrap();
		let head = chain.best_block_header();
		assert_eq!(chain.best_block_total_difficulty(), d0 + head.difficulty);
	}
}
