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

//! FIFO of candidate blocks delivered by peers, awaiting chain sync.
//! Deduplicates by header hash. Internally synchronised.

use std::collections::{HashSet, VecDeque};

use ethereum_types::H256;
use keccak_hash::keccak;
use parity_bytes::Bytes;
use parking_lot::Mutex;
use rlp::Rlp;

use crate::error::{Error, ImportError};

#[derive(Default)]
struct Inner {
	blocks: VecDeque<(H256, Bytes)>,
	known: HashSet<H256>,
	rejections: usize,
}

/// Internally synchronised incoming-block queue.
#[derive(Default)]
pub struct BlockQueue {
	inner: Mutex<Inner>,
}

impl BlockQueue {
	/// Fresh empty queue.
	pub fn new() -> Self {
		BlockQueue::default()
	}

	/// Queue a raw block for import. The header must at least decode;
	/// everything else is checked at import time.
	pub fn import(&self, bytes: Bytes) -> Result<H256, Error> {
		let rlp = Rlp::new(&bytes);
		let header_rlp = rlp.at(0)?;
		let hash = keccak(header_rlp.as_raw());
		let mut inner = self.inner.lock();
		if inner.known.contains(&hash) {
			inner.rejections += 1;
			return Err(ImportError::AlreadyQueued.into());
		}
		inner.known.insert(hash);
		inner.blocks.push_back((hash, bytes));
		Ok(hash)
	}

	/// Pull up to `max` blocks off the front of the queue.
	pub fn drain(&self, max: usize) -> Vec<Bytes> {
		let mut inner = self.inner.lock();
		let count = std::cmp::min(max, inner.blocks.len());
		let mut out = Vec::with_capacity(count);
		for _ in 0..count {
			let (hash, bytes) = inner
				.blocks
				.pop_front()
				.expect("count bounded by len; qed");
			inner.known.remove(&hash);
			out.push(bytes);
		}
		out
	}

	/// Drop everything.
	pub fn clear(&self) {
		let mut inner = self.inner.lock();
		inner.blocks.clear();
		inner.known.clear();
	}

	/// Number of queued blocks.
	pub fn len(&self) -> usize {
		self.inner.lock().blocks.len()
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
