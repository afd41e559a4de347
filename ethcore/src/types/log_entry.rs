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

//! Block log.

use ethereum_types::{Address, Bloom, BloomInput, H256};
use parity_bytes::Bytes;
use rlp::{DecoderError, Encodable, Decodable, Rlp, RlpStream};

use crate::types::header::BlockNumber;

/// A record of execution for a `LOG` operation.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
	/// The address of the contract executing at the point of the `LOG` operation.
	pub address: Address,
	/// The topics associated with the `LOG` operation.
	pub topics: Vec<H256>,
	/// The data associated with the `LOG` operation.
	pub data: Bytes,
}

impl Encodable for LogEntry {
	fn rlp_append(&self, s: &mut RlpStream) {
		s.begin_list(3);
		s.append(&self.address);
		s.append_list::<H256, _>(&self.topics);
		s.append(&self.data);
	}
}

impl Decodable for LogEntry {
	fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
		Ok(LogEntry {
			address: rlp.val_at(0)?,
			topics: rlp.list_at(1)?,
			data: rlp.val_at(2)?,
		})
	}
}

impl LogEntry {
	/// Calculates the bloom of this log entry.
	pub fn bloom(&self) -> Bloom {
		self.topics.iter().fold(
			Bloom::from(BloomInput::Raw(self.address.as_bytes())),
			|mut b, t| {
				b.accrue(BloomInput::Raw(t.as_bytes()));
				b
			},
		)
	}
}

/// Log localized to a block of the canonical chain, or to the pending block.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct LocalizedLogEntry {
	/// Plain log entry.
	pub entry: LogEntry,
	/// Block in which this log was created. For pending logs this is the
	/// number the block will carry once sealed (head + 1).
	pub block_number: BlockNumber,
	/// Hash of the transaction which created the log.
	pub transaction_hash: H256,
}

impl LocalizedLogEntry {
	/// The marker entry delivered to watches observing the reserved
	/// pending-changed/chain-changed pseudo-filters.
	pub fn sentinel() -> Self {
		LocalizedLogEntry::default()
	}
}

#[cfg(test)]
mod tests {
	use ethereum_types::{Address, Bloom, BloomInput};
	use keccak_hash::keccak;
	use super::LogEntry;

	#[test]
	fn log_bloom_covers_address_and_topics() {
		let entry = LogEntry {
			address: Address::from_low_u64_be(0x0f),
			topics: vec![keccak(b"topic")],
			data: b"hello".to_vec(),
		};
		let bloom = entry.bloom();
		assert!(bloom.contains_input(BloomInput::Raw(entry.address.as_bytes())));
		assert!(bloom.contains_input(BloomInput::Raw(entry.topics[0].as_bytes())));
		assert!(!bloom.contains_input(BloomInput::Raw(Address::from_low_u64_be(0xff).as_bytes())));
		assert_ne!(bloom, Bloom::default());
	}

	#[test]
	fn log_rlp_round_trips() {
		let entry = LogEntry {
			address: Address::from_low_u64_be(5),
			topics: vec![keccak(b"a"), keccak(b"b")],
			data: vec![1, 2, 3],
		};
		let encoded = rlp::encode(&entry);
		let decoded: LogEntry = rlp::decode(&encoded).unwrap();
		assert_eq!(entry, decoded);
	}
}
