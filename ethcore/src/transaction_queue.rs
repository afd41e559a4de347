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

//! The queue of transactions waiting to be included in a block.
//!
//! Keyed by hash for dedup and removal; iterated in priority order: each
//! sender's transactions in ascending nonce order (they can only execute in
//! that order), senders ranked by the gas price of their first executable
//! entry. Internally synchronised; safe to call from any thread.

use std::collections::{BTreeMap, HashMap};

use ethereum_types::{Address, H256, U256};
use parking_lot::Mutex;

use crate::error::Error;
use crate::types::transaction::SignedTransaction;

/// Outcome of pushing a transaction into the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionImportResult {
	/// Newly queued.
	Current,
	/// Already known, or a cheaper duplicate of a known entry.
	AlreadyKnown,
	/// Replaced a same-nonce entry with a lower gas price.
	Replaced,
}

#[derive(Default)]
struct Inner {
	by_hash: HashMap<H256, SignedTransaction>,
	// (sender, nonce) -> hash of the queued transaction
	by_sender: BTreeMap<Address, BTreeMap<U256, H256>>,
	rejections: usize,
}

/// Internally synchronised pending-transaction queue.
#[derive(Default)]
pub struct TransactionQueue {
	inner: Mutex<Inner>,
}

impl TransactionQueue {
	/// Fresh empty queue.
	pub fn new() -> Self {
		TransactionQueue::default()
	}

	/// Import a decoded transaction.
	pub fn import(&self, tx: SignedTransaction) -> TransactionImportResult {
		let mut inner = self.inner.lock();
		if inner.by_hash.contains_key(&tx.hash()) {
			inner.rejections += 1;
			return TransactionImportResult::AlreadyKnown;
		}
		let sender = tx.sender();
		let nonce = tx.nonce;
		if let Some(&existing) = inner.by_sender.get(&sender).and_then(|m| m.get(&nonce)) {
			let existing_price = inner.by_hash[&existing].gas_price;
			if existing_price >= tx.gas_price {
				inner.rejections += 1;
				return TransactionImportResult::AlreadyKnown;
			}
			inner.by_hash.remove(&existing);
			inner.by_hash.insert(tx.hash(), tx.clone());
			inner
				.by_sender
				.get_mut(&sender)
				.expect("sender entry checked above; qed")
				.insert(nonce, tx.hash());
			trace!(target: "client", "Replaced queued transaction {:?} with higher-priced {:?}", existing, tx.hash());
			return TransactionImportResult::Replaced;
		}
		inner
			.by_sender
			.entry(sender)
			.or_insert_with(BTreeMap::new)
			.insert(nonce, tx.hash());
		inner.by_hash.insert(tx.hash(), tx);
		TransactionImportResult::Current
	}

	/// Import a raw RLP-encoded transaction.
	pub fn import_rlp(&self, bytes: &[u8]) -> Result<TransactionImportResult, Error> {
		let tx: SignedTransaction = rlp::decode(bytes)?;
		Ok(self.import(tx))
	}

	/// Remove the transaction with the given hash, if queued.
	pub fn remove(&self, hash: &H256) -> Option<SignedTransaction> {
		let mut inner = self.inner.lock();
		let tx = inner.by_hash.remove(hash)?;
		let sender = tx.sender();
		if let Some(nonces) = inner.by_sender.get_mut(&sender) {
			nonces.remove(&tx.nonce);
			if nonces.is_empty() {
				inner.by_sender.remove(&sender);
			}
		}
		Some(tx)
	}

	/// Drop everything.
	pub fn clear(&self) {
		let mut inner = self.inner.lock();
		inner.by_hash.clear();
		inner.by_sender.clear();
	}

	/// Queued transactions in priority order.
	pub fn pending(&self) -> Vec<SignedTransaction> {
		let inner = self.inner.lock();
		let mut senders: Vec<&BTreeMap<U256, H256>> = inner.by_sender.values().collect();
		senders.sort_by_key(|nonces| {
			let first = nonces
				.values()
				.next()
				.expect("sender maps are removed when emptied; qed");
			std::cmp::Reverse(inner.by_hash[first].gas_price)
		});
		senders
			.into_iter()
			.flat_map(|nonces| nonces.values())
			.map(|hash| inner.by_hash[hash].clone())
			.collect()
	}

	/// Whether a transaction with this hash is queued.
	pub fn contains(&self, hash: &H256) -> bool {
		self.inner.lock().by_hash.contains_key(hash)
	}

	/// Number of queued transactions.
	pub fn len(&self) -> usize {
		self.inner.lock().by_hash.len()
	}

	/// Whether the queue is empty.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// How many imports were rejected as duplicates.
	pub fn rejections(&self) -> usize {
		self.inner.lock().rejections
	}
}

#[cfg(test)]
mod tests {
	use ethereum_types::{Address, U256};
	use crate::types::transaction::{Action, Transaction};
	use super::{TransactionImportResult, TransactionQueue};

	fn tx(sender: u64, nonce: u64, gas_price: u64) -> crate::types::transaction::SignedTransaction {
		Transaction {
			nonce: nonce.into(),
			gas_price: gas_price.into(),
			gas: 21_000.into(),
			action: Action::Call(Address::zero()),
			value: U256::zero(),
			data: vec![],
		}
		.fake_sign(Address::from_low_u64_be(sender))
	}

	#[test]
	fn deduplicates_by_hash() {
		let queue = TransactionQueue::new();
		let t = tx(1, 0, 10);
		assert_eq!(queue.import(t.clone()), TransactionImportResult::Current);
		assert_eq!(queue.import(t), TransactionImportResult::AlreadyKnown);
		assert_eq!(queue.len(), 1);
		assert_eq!(queue.rejections(), 1);
	}

	#[test]
	fn orders_sender_nonces_ascending() {
		let queue = TransactionQueue::new();
		queue.import(tx(1, 1, 10));
		queue.import(tx(1, 0, 10));
		let pending = queue.pending();
		assert_eq!(pending.len(), 2);
		assert!(pending[0].nonce < pending[1].nonce);
	}

	#[test]
	fn best_paying_sender_goes_first() {
		let queue = TransactionQueue::new();
		queue.import(tx(1, 0, 1));
		queue.import(tx(2, 0, 100));
		let pending = queue.pending();
		assert_eq!(pending[0].sender(), Address::from_low_u64_be(2));
	}

	#[test]
	fn same_nonce_replacement_needs_higher_price() {
		let queue = TransactionQueue::new();
		queue.import(tx(1, 0, 10));
		assert_eq!(queue.import(tx(1, 0, 5)), TransactionImportResult::AlreadyKnown);
		assert_eq!(queue.import(tx(1, 0, 20)), TransactionImportResult::Replaced);
		let pending = queue.pending();
		assert_eq!(pending.len(), 1);
		assert_eq!(pending[0].gas_price, U256::from(20));
	}

	#[test]
	fn remove_forgets_sender_when_drained() {
		let queue = TransactionQueue::new();
		let t = tx(1, 0, 10);
		queue.import(t.clone());
		assert!(queue.remove(&t.hash()).is_some());
		assert!(queue.remove(&t.hash()).is_none());
		assert!(queue.is_empty());
	}
}
