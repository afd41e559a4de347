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

//! Content-addressed state database: a detachable in-memory overlay over the
//! shared key-value backing.
//!
//! Every value is keyed by its keccak, so two overlays can never disagree
//! about a key and handing a detached clone to a long-running operation is
//! safe: anything it journals into the backing is data every other clone
//! would have written identically.

use std::collections::HashMap;
use std::sync::Arc;

use ethereum_types::H256;
use keccak_hash::keccak;
use kvdb::{DBTransaction, DBValue, KeyValueDB};

use crate::db::COL_STATE;

/// State database with speculative overlay.
pub struct StateDB {
	backing: Arc<dyn KeyValueDB>,
	overlay: HashMap<H256, DBValue>,
}

impl StateDB {
	/// Create a new state DB over the given backing.
	pub fn new(backing: Arc<dyn KeyValueDB>) -> StateDB {
		StateDB {
			backing,
			overlay: HashMap::new(),
		}
	}

	/// A detached copy: shares the backing, duplicates the overlay.
	pub fn boxed_clone(&self) -> StateDB {
		StateDB {
			backing: self.backing.clone(),
			overlay: self.overlay.clone(),
		}
	}

	/// Insert a value, keyed by its keccak. Stays in the overlay until
	/// journalled.
	pub fn insert(&mut self, value: &[u8]) -> H256 {
		let key = keccak(value);
		self.overlay.entry(key).or_insert_with(|| value.to_vec());
		key
	}

	/// Look a value up, overlay first.
	pub fn get(&self, key: &H256) -> std::io::Result<Option<DBValue>> {
		if let Some(value) = self.overlay.get(key) {
			return Ok(Some(value.clone()));
		}
		self.backing.get(COL_STATE, key.as_bytes())
	}

	/// Whether the key resolves in the overlay or the backing.
	pub fn contains(&self, key: &H256) -> bool {
		self.overlay.contains_key(key)
			|| self
				.backing
				.get(COL_STATE, key.as_bytes())
				.map_or(false, |v| v.is_some())
	}

	/// Move the overlay into `batch`; the caller writes the batch to the
	/// backing. Used when a block becomes canonical.
	pub fn journal_under(&mut self, batch: &mut DBTransaction) {
		for (key, value) in self.overlay.drain() {
			batch.put(COL_STATE, key.as_bytes(), &value);
		}
	}

	/// Drop speculative entries that were never journalled.
	pub fn clear_overlay(&mut self) {
		self.overlay.clear();
	}

	/// The shared backing database.
	pub fn backing(&self) -> &Arc<dyn KeyValueDB> {
		&self.backing
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use keccak_hash::keccak;
	use kvdb::DBTransaction;
	use crate::db::NUM_COLUMNS;
	use super::StateDB;

	fn new_state_db() -> StateDB {
		StateDB::new(Arc::new(kvdb_memorydb::create(NUM_COLUMNS)))
	}

	#[test]
	fn insert_is_content_addressed() {
		let mut db = new_state_db();
		let key = db.insert(b"value");
		assert_eq!(key, keccak(b"value"));
		assert_eq!(db.get(&key).unwrap().unwrap(), b"value".to_vec());
	}

	#[test]
	fn detached_clone_shares_backing_not_overlay() {
		let mut db = new_state_db();
		let mut clone = db.boxed_clone();

		let speculative = clone.insert(b"speculative");
		assert!(!db.contains(&speculative));

		let journalled = db.insert(b"journalled");
		let mut batch = DBTransaction::new();
		db.journal_under(&mut batch);
		db.backing().write(batch).unwrap();
		assert!(clone.contains(&journalled));
	}

	#[test]
	fn clear_overlay_keeps_backing(){
		let mut db = new_state_db();
		let key = db.insert(b"value");
		let mut batch = DBTransaction::new();
		db.journal_under(&mut batch);
		db.backing().write(batch).unwrap();
		db.insert(b"other");
		db.clear_overlay();
		assert!(db.contains(&key));
		assert!(!db.contains(&keccak(b"other")));
	}
}
