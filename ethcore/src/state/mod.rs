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

//! An account-state snapshot over the content-addressed state database,
//! together with the tail of pending transactions applied on top of it.
//!
//! The canonical-head instance (`pre_mine`) never carries pending entries;
//! the speculative instance (`post_mine`) equals the head state with a
//! prefix of the transaction queue replayed, and can materialise the state
//! just before any pending index.

pub mod db;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use ethereum_types::{Address, Bloom, H256, U256};
use kvdb::DBTransaction;
use rlp::{DecoderError, Rlp, RlpStream};
use rlp_derive::{RlpDecodable, RlpEncodable};

use crate::blockchain::BlockChain;
use crate::error::{Error, ImportError};
use crate::executive::{EnvInfo, Executive, ExecutionError};
use crate::pow;
use crate::spec::ChainSpec;
use crate::transaction_queue::TransactionQueue;
use crate::types::block::{Block, ClosedBlock};
use crate::types::header::Header;
use crate::types::receipt::{receipts_root, Receipt};
use crate::types::transaction::SignedTransaction;

pub use self::db::StateDB;

/// Single account in the system.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct Account {
	/// Nonce of the account.
	pub nonce: U256,
	/// Balance of the account.
	pub balance: U256,
	/// Root of the storage trie. Unused by this executive, committed for
	/// format stability.
	pub storage_root: H256,
	/// Hash of the account's code.
	pub code_hash: H256,
}

impl Account {
	fn new_basic(nonce: U256) -> Account {
		Account {
			nonce,
			balance: U256::zero(),
			storage_root: keccak_hash::KECCAK_NULL_RLP,
			code_hash: keccak_hash::KECCAK_EMPTY,
		}
	}
}

/// Representation of the entire accountable state, plus the pending
/// transaction tail.
pub struct State {
	db: StateDB,
	accounts: BTreeMap<Address, Account>,
	root: H256,
	base_root: H256,
	base_block: H256,
	author: Address,
	account_start_nonce: U256,
	pending: Vec<SignedTransaction>,
	pending_receipts: Vec<Receipt>,
	env: EnvInfo,
	env_parent: H256,
}

impl Clone for State {
	fn clone(&self) -> State {
		State {
			db: self.db.boxed_clone(),
			accounts: self.accounts.clone(),
			root: self.root,
			base_root: self.base_root,
			base_block: self.base_block,
			author: self.author,
			account_start_nonce: self.account_start_nonce,
			pending: self.pending.clone(),
			pending_receipts: self.pending_receipts.clone(),
			env: self.env.clone(),
			env_parent: self.env_parent,
		}
	}
}

impl State {
	/// Creates new state with empty state root.
	pub fn new(db: StateDB, author: Address, account_start_nonce: U256) -> State {
		let mut state = State {
			db,
			accounts: BTreeMap::new(),
			root: H256::zero(),
			base_root: H256::zero(),
			base_block: H256::zero(),
			author,
			account_start_nonce,
			pending: Vec::new(),
			pending_receipts: Vec::new(),
			env: EnvInfo::default(),
			env_parent: H256::zero(),
		};
		let root = state.commit();
		state.base_root = root;
		state
	}

	/// Creates new state with existing state root.
	pub fn from_existing(
		db: StateDB,
		root: H256,
		author: Address,
		account_start_nonce: U256,
	) -> Result<State, Error> {
		let raw = db.get(&root)?.ok_or(Error::StateUnavailable(root))?;
		let accounts = decode_accounts(&raw)?;
		Ok(State {
			db,
			accounts,
			root,
			base_root: root,
			base_block: H256::zero(),
			author,
			account_start_nonce,
			pending: Vec::new(),
			pending_receipts: Vec::new(),
			env: EnvInfo::default(),
			env_parent: H256::zero(),
		})
	}

	/// The root identifying the current account snapshot. Only current
	/// after `commit`.
	pub fn root(&self) -> H256 {
		self.root
	}

	/// The canonical root the pending tail replays over.
	pub fn base_root(&self) -> H256 {
		self.base_root
	}

	/// The author (mining beneficiary) of this state's pending block.
	pub fn author(&self) -> Address {
		self.author
	}

	/// Change the author. The caller is expected to rebuild the pending
	/// tail afterwards.
	pub fn set_author(&mut self, author: Address) {
		self.author = author;
	}

	/// The transactions applied on top of the base root, in order.
	pub fn pending(&self) -> &[SignedTransaction] {
		&self.pending
	}

	/// The receipts of the pending transactions, in order.
	pub fn pending_receipts(&self) -> &[Receipt] {
		&self.pending_receipts
	}

	/// The environment the pending tail executes under.
	pub fn env(&self) -> &EnvInfo {
		&self.env
	}

	/// Balance of `address`, zero for unknown accounts.
	pub fn balance(&self, address: &Address) -> U256 {
		self.accounts.get(address).map_or_else(U256::zero, |a| a.balance)
	}

	/// Nonce of `address`; the chain's start nonce for unknown accounts.
	pub fn nonce(&self, address: &Address) -> U256 {
		self.accounts
			.get(address)
			.map_or(self.account_start_nonce, |a| a.nonce)
	}

	/// Add `by` to the balance of `address`, creating it if necessary.
	pub fn add_balance(&mut self, address: &Address, by: U256) {
		let start_nonce = self.account_start_nonce;
		let account = self
			.accounts
			.entry(*address)
			.or_insert_with(|| Account::new_basic(start_nonce));
		account.balance = account.balance.saturating_add(by);
	}

	/// Subtract `by` from the balance of `address`.
	pub fn sub_balance(&mut self, address: &Address, by: U256) {
		if let Some(account) = self.accounts.get_mut(address) {
			account.balance = account.balance.saturating_sub(by);
		}
	}

	/// Increment the nonce of `address` by one.
	pub fn inc_nonce(&mut self, address: &Address) {
		let start_nonce = self.account_start_nonce;
		let account = self
			.accounts
			.entry(*address)
			.or_insert_with(|| Account::new_basic(start_nonce));
		account.nonce = account.nonce.saturating_add(U256::one());
	}

	/// Commit the account snapshot into the overlay, returning its root.
	pub fn commit(&mut self) -> H256 {
		let mut s = RlpStream::new_list(self.accounts.len());
		for (address, account) in &self.accounts {
			s.begin_list(2);
			s.append(address);
			s.append(account);
		}
		let encoded = s.out();
		self.root = self.db.insert(&encoded);
		self.root
	}

	/// Journal everything committed so far into `batch`.
	pub fn journal_under(&mut self, batch: &mut DBTransaction) {
		self.db.journal_under(batch);
	}

	/// Reseat this state onto the chain's canonical head, dropping any
	/// pending tail. Returns true if anything changed. The head is tracked
	/// by block hash: a reorg between branches with identical state still
	/// reseats, so the pending environment is rebuilt against the new head.
	pub fn sync(&mut self, chain: &BlockChain) -> Result<bool, Error> {
		let head = chain.best_block_header();
		let head_hash = head.hash();
		if self.base_block == head_hash {
			return Ok(false);
		}
		let raw = self
			.db
			.get(&head.state_root)?
			.ok_or(Error::StateUnavailable(head.state_root))?;
		self.accounts = decode_accounts(&raw)?;
		self.root = head.state_root;
		self.base_root = head.state_root;
		self.base_block = head_hash;
		self.pending.clear();
		self.pending_receipts.clear();
		self.env_parent = H256::zero();
		Ok(true)
	}

	fn ensure_env(&mut self, chain: &BlockChain) {
		let parent = chain.best_block_header();
		let parent_hash = parent.hash();
		// an environment already carrying a pending tail stays bound to it;
		// if the head moved underneath, the work cycle rebuilds the tail and
		// a fresh environment with it. Anything sealed meanwhile is stale
		// and gets rejected on import.
		if self.env_parent == parent_hash || !self.pending.is_empty() {
			return;
		}
		let timestamp = std::cmp::max(unix_now(), parent.timestamp + 1);
		self.env = EnvInfo {
			number: parent.number + 1,
			author: self.author,
			timestamp,
			difficulty: pow::child_difficulty(chain.spec(), &parent, timestamp),
			gas_limit: parent.gas_limit,
			last_hashes: Arc::new(chain.last_hashes()),
		};
		self.env_parent = parent_hash;
	}

	/// Apply a single transaction under the current environment, recording
	/// it and its receipt in the pending tail.
	pub fn apply(&mut self, t: &SignedTransaction) -> Result<Receipt, ExecutionError> {
		let gas_used_so_far = self
			.pending_receipts
			.last()
			.map_or_else(U256::zero, |r| r.gas_used);
		if gas_used_so_far.saturating_add(t.gas) > self.env.gas_limit {
			return Err(ExecutionError::BlockGasLimitReached {
				gas_limit: self.env.gas_limit,
				gas_used: gas_used_so_far,
				gas: t.gas,
			});
		}
		let env = self.env.clone();
		let executed = Executive::new(self, &env).transact(t, true)?;
		let receipt = Receipt::new(gas_used_so_far + executed.gas_used, executed.logs);
		self.pending.push(t.clone());
		self.pending_receipts.push(receipt.clone());
		Ok(receipt)
	}

	/// Apply as many queue entries as possible at the current head, in the
	/// queue's priority order. Entries below `minimal_gas_price` stay
	/// queued; entries the executive rejects are dropped from the queue,
	/// since transactions replayed from dead reorg branches routinely carry
	/// stale nonces and must not wedge the queue. Returns receipts for the
	/// newly accepted transactions only.
	pub fn sync_queue(
		&mut self,
		chain: &BlockChain,
		queue: &TransactionQueue,
		minimal_gas_price: U256,
	) -> Vec<Receipt> {
		self.ensure_env(chain);
		let known: std::collections::HashSet<H256> =
			self.pending.iter().map(|t| t.hash()).collect();
		let mut fresh = Vec::new();
		for t in queue.pending() {
			if known.contains(&t.hash()) {
				continue;
			}
			if t.gas_price < minimal_gas_price {
				trace!(target: "state", "Ignoring under-priced transaction {:?} ({} < {})", t.hash(), t.gas_price, minimal_gas_price);
				continue;
			}
			match self.apply(&t) {
				Ok(receipt) => fresh.push(receipt),
				Err(ExecutionError::BlockGasLimitReached { .. }) => {
					// leave it for a later block.
					continue;
				}
				Err(ExecutionError::InvalidNonce { expected, got }) if got > expected => {
					// a gap; keep it queued until it becomes executable.
					continue;
				}
				Err(e) => {
					debug!(target: "state", "Dropping invalid queued transaction {:?}: {}", t.hash(), e);
					queue.remove(&t.hash());
				}
			}
		}
		if !fresh.is_empty() {
			self.commit();
		}
		fresh
	}

	/// Freeze the state for sealing: credit the block reward, commit, and
	/// assemble the unsealed candidate block.
	pub fn commit_to_mine(&mut self, chain: &BlockChain) -> ClosedBlock {
		self.ensure_env(chain);
		let author = self.author;
		self.add_balance(&author, chain.spec().block_reward);
		let state_root = self.commit();
		let parent = chain.best_block_header();
		let header = Header {
			parent_hash: parent.hash(),
			author: self.author,
			state_root,
			receipts_root: receipts_root(&self.pending_receipts),
			log_bloom: self
				.pending_receipts
				.iter()
				.fold(Bloom::default(), |mut b, r| {
					b.accrue_bloom(&r.log_bloom);
					b
				}),
			difficulty: self.env.difficulty,
			number: self.env.number,
			gas_limit: self.env.gas_limit,
			gas_used: self
				.pending_receipts
				.last()
				.map_or_else(U256::zero, |r| r.gas_used),
			timestamp: self.env.timestamp,
			extra_data: Vec::new(),
			nonce: 0,
		};
		ClosedBlock {
			block: Block {
				header,
				transactions: self.pending.clone(),
			},
			receipts: self.pending_receipts.clone(),
		}
	}

	/// The state just before the `i`-th pending transaction.
	pub fn from_pending(&self, i: usize) -> Result<State, Error> {
		let mut state = State::from_existing(
			self.db.boxed_clone(),
			self.base_root,
			self.author,
			self.account_start_nonce,
		)?;
		state.env = self.env.clone();
		state.env_parent = self.env_parent;
		for t in self.pending.iter().take(i) {
			state.apply(t).map_err(Error::Execution)?;
		}
		Ok(state)
	}

	/// A fresh state over a throwaway in-memory database.
	#[cfg(test)]
	pub fn new_temp() -> State {
		let db = StateDB::new(std::sync::Arc::new(kvdb_memorydb::create(crate::db::NUM_COLUMNS)));
		State::new(db, Address::zero(), U256::zero())
	}
}

/// Execute `block`'s transactions against the state at `parent`, returning
/// the resulting state and receipts. Used when importing blocks; the caller
/// compares the resulting roots against the header's commitments.
pub fn enact(
	db: StateDB,
	spec: &ChainSpec,
	parent: &Header,
	block: &Block,
	last_hashes: Vec<H256>,
) -> Result<(State, Vec<Receipt>), Error> {
	let mut state = enact_prefix(db, spec, parent, block, block.transactions.len(), last_hashes)?;
	let author = block.header.author;
	state.add_balance(&author, spec.block_reward);
	state.commit();
	let receipts = state.pending_receipts.clone();
	Ok((state, receipts))
}

/// Execute only the first `count` of `block`'s transactions against the
/// state at `parent`: the state just before the `count`-th transaction of
/// the block. No block reward is applied.
pub fn enact_prefix(
	db: StateDB,
	spec: &ChainSpec,
	parent: &Header,
	block: &Block,
	count: usize,
	last_hashes: Vec<H256>,
) -> Result<State, Error> {
	let header = &block.header;
	let mut state = State::from_existing(
		db,
		parent.state_root,
		header.author,
		spec.account_start_nonce,
	)?;
	state.env = EnvInfo {
		number: header.number,
		author: header.author,
		timestamp: header.timestamp,
		difficulty: header.difficulty,
		gas_limit: header.gas_limit,
		last_hashes: Arc::new(last_hashes),
	};
	state.env_parent = header.parent_hash;
	for t in block.transactions.iter().take(count) {
		state
			.apply(t)
			.map_err(|e| Error::Import(ImportError::InvalidTransaction(e)))?;
	}
	Ok(state)
}

fn decode_accounts(raw: &[u8]) -> Result<BTreeMap<Address, Account>, DecoderError> {
	let rlp = Rlp::new(raw);
	let mut accounts = BTreeMap::new();
	for pair in rlp.iter() {
		let address: Address = pair.val_at(0)?;
		let account: Account = pair.val_at(1)?;
		accounts.insert(address, account);
	}
	Ok(accounts)
}

fn unix_now() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map_or(0, |d| d.as_secs())
}
