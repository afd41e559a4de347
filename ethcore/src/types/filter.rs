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

//! Blockchain filter

use ethereum_types::{Address, Bloom, BloomInput, H256};
use keccak_hash::keccak;
use rlp::RlpStream;

use crate::types::header::BlockNumber;
use crate::types::ids::BlockId;
use crate::types::log_entry::LogEntry;
use crate::types::receipt::Receipt;

/// The position a produced log is observed from: speculatively as part of
/// the pending block, or as part of a newly canonical block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeBlock {
	/// The pending block (head + 1, not yet sealed).
	Pending,
	/// A block of the canonical chain.
	Latest,
}

/// Blockchain log filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
	/// Blockchain will be searched from this block.
	pub from_block: BlockId,
	/// Till this block.
	pub to_block: BlockId,
	/// Search addresses.
	///
	/// If None, match all.
	/// If specified, log must be produced by one of these addresses.
	pub address: Option<Vec<Address>>,
	/// Search topics.
	///
	/// If None, match all.
	/// If specified, log must contain one of these topics at the same index.
	pub topics: Vec<Option<Vec<H256>>>,
}

impl Default for Filter {
	fn default() -> Self {
		Filter {
			from_block: BlockId::Earliest,
			to_block: BlockId::Latest,
			address: None,
			topics: vec![None, None, None, None],
		}
	}
}

impl Filter {
	/// Whether a log observed at block `number` falls inside this filter's
	/// block-range envelope, given the current chain `head`.
	///
	/// Hash-addressed bounds cannot be resolved without chain context and
	/// never envelop live events; they are served by the historical query.
	pub fn envelops(&self, _relative: RelativeBlock, number: BlockNumber, head: BlockNumber) -> bool {
		let from = match self.from_block {
			BlockId::Earliest => 0,
			BlockId::Number(n) => n,
			BlockId::Latest => head,
			BlockId::Hash(_) => return false,
		};
		let to = match self.to_block {
			BlockId::Earliest => 0,
			BlockId::Number(n) => n,
			BlockId::Latest => BlockNumber::max_value(),
			BlockId::Hash(_) => return false,
		};
		from <= number && number <= to
	}

	/// Fast probabilistic test: could a block with this bloom contain a
	/// matching log?
	pub fn matches_bloom(&self, bloom: &Bloom) -> bool {
		let address_possible = match self.address {
			Some(ref addresses) if !addresses.is_empty() => addresses
				.iter()
				.any(|a| bloom.contains_input(BloomInput::Raw(a.as_bytes()))),
			_ => true,
		};
		let topics_possible = self.topics.iter().all(|topic| match topic {
			Some(ts) if !ts.is_empty() => ts
				.iter()
				.any(|t| bloom.contains_input(BloomInput::Raw(t.as_bytes()))),
			_ => true,
		});
		address_possible && topics_possible
	}

	/// Returns true if given log entry matches filter.
	pub fn matches_log(&self, log: &LogEntry) -> bool {
		let matches_address = match self.address {
			Some(ref addresses) if !addresses.is_empty() => addresses.contains(&log.address),
			_ => true,
		};
		matches_address
			&& self.topics.iter().enumerate().all(|(i, topic)| match topic {
				Some(ts) if !ts.is_empty() => {
					log.topics.get(i).map_or(false, |t| ts.contains(t))
				}
				_ => true,
			})
	}

	/// The logs of `receipt` this filter catches.
	pub fn matches(&self, receipt: &Receipt) -> Vec<LogEntry> {
		if !self.matches_bloom(&receipt.log_bloom) {
			return Vec::new();
		}
		receipt
			.logs
			.iter()
			.filter(|log| self.matches_log(log))
			.cloned()
			.collect()
	}

	/// Content hash of the predicate; installed filters are keyed by this,
	/// so installing an identical filter twice yields the same id.
	pub fn content_hash(&self) -> H256 {
		let mut s = RlpStream::new_list(4);
		append_block_id(&mut s, &self.from_block);
		append_block_id(&mut s, &self.to_block);
		match self.address {
			Some(ref addresses) => s.append_list::<Address, _>(addresses),
			None => s.begin_list(0),
		};
		s.begin_list(self.topics.len());
		for topic in &self.topics {
			match topic {
				Some(ts) => s.append_list::<H256, _>(ts),
				None => s.begin_list(0),
			};
		}
		keccak(s.out())
	}
}

fn append_block_id(s: &mut RlpStream, id: &BlockId) {
	s.begin_list(2);
	match *id {
		BlockId::Hash(ref h) => {
			s.append(&0u8);
			s.append(h);
		}
		BlockId::Number(n) => {
			s.append(&1u8);
			s.append(&n);
		}
		BlockId::Earliest => {
			s.append(&2u8);
			s.append(&0u8);
		}
		BlockId::Latest => {
			s.append(&3u8);
			s.append(&0u8);
		}
	}
}

#[cfg(test)]
mod tests {
	use ethereum_types::Address;
	use keccak_hash::keccak;
	use crate::types::ids::BlockId;
	use crate::types::log_entry::LogEntry;
	use crate::types::receipt::Receipt;
	use super::{Filter, RelativeBlock};

	fn receipt_with_log(address: Address, topic: &[u8]) -> Receipt {
		Receipt::new(
			21_000.into(),
			vec![LogEntry {
				address,
				topics: vec![keccak(topic)],
				data: topic.to_vec(),
			}],
		)
	}

	#[test]
	fn default_filter_envelops_pending_and_latest() {
		let f = Filter::default();
		assert!(f.envelops(RelativeBlock::Pending, 11, 10));
		assert!(f.envelops(RelativeBlock::Latest, 10, 10));
		assert!(f.envelops(RelativeBlock::Latest, 0, 10));
	}

	#[test]
	fn bounded_filter_rejects_outside_range() {
		let f = Filter {
			from_block: BlockId::Number(5),
			to_block: BlockId::Number(6),
			..Default::default()
		};
		assert!(!f.envelops(RelativeBlock::Latest, 4, 10));
		assert!(f.envelops(RelativeBlock::Latest, 5, 10));
		assert!(f.envelops(RelativeBlock::Latest, 6, 10));
		assert!(!f.envelops(RelativeBlock::Latest, 7, 10));
	}

	#[test]
	fn latest_lower_bound_accepts_pending() {
		let f = Filter {
			from_block: BlockId::Latest,
			to_block: BlockId::Latest,
			..Default::default()
		};
		assert!(f.envelops(RelativeBlock::Latest, 10, 10));
		assert!(f.envelops(RelativeBlock::Pending, 11, 10));
		assert!(!f.envelops(RelativeBlock::Latest, 9, 10));
	}

	#[test]
	fn address_filter_matches() {
		let target = Address::from_low_u64_be(0xa);
		let f = Filter {
			address: Some(vec![target]),
			..Default::default()
		};
		assert_eq!(f.matches(&receipt_with_log(target, b"x")).len(), 1);
		assert!(f.matches(&receipt_with_log(Address::from_low_u64_be(0xb), b"x")).is_empty());
	}

	#[test]
	fn topic_filter_is_positional() {
		let topic = keccak(b"x");
		let f = Filter {
			topics: vec![Some(vec![topic]), None, None, None],
			..Default::default()
		};
		assert_eq!(f.matches(&receipt_with_log(Address::zero(), b"x")).len(), 1);
		assert!(f.matches(&receipt_with_log(Address::zero(), b"y")).is_empty());
	}

	#[test]
	fn content_hash_is_stable_and_discriminating() {
		let a = Filter::default();
		let b = Filter::default();
		assert_eq!(a.content_hash(), b.content_hash());
		let c = Filter {
			address: Some(vec![Address::from_low_u64_be(1)]),
			..Default::default()
		};
		assert_ne!(a.content_hash(), c.content_hash());
	}
}
