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

//! Receipt

use ethereum_types::{Bloom, U256};
use rlp::{DecoderError, Decodable, Encodable, Rlp, RlpStream};

use crate::types::log_entry::LogEntry;

/// Information describing execution of a transaction.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
	/// The total gas used in the block following execution of the transaction.
	pub gas_used: U256,
	/// The OR-wide combination of all logs' blooms for this transaction.
	pub log_bloom: Bloom,
	/// The logs stemming from this transaction.
	pub logs: Vec<LogEntry>,
}

impl Receipt {
	/// Create a new receipt; the bloom is accrued from the logs.
	pub fn new(gas_used: U256, logs: Vec<LogEntry>) -> Receipt {
		Receipt {
			gas_used,
			log_bloom: logs.iter().fold(Bloom::default(), |mut b, l| {
				b.accrue_bloom(&l.bloom());
				b
			}),
			logs,
		}
	}
}

/// Root committing to an ordered list of receipts.
pub fn receipts_root(receipts: &[Receipt]) -> ethereum_types::H256 {
	keccak_hash::keccak(rlp::encode_list::<Receipt, _>(receipts))
}

impl Encodable for Receipt {
	fn rlp_append(&self, s: &mut RlpStream) {
		s.begin_list(3);
		s.append(&self.gas_used);
		s.append(&self.log_bloom.as_bytes().to_vec());
		s.append_list::<LogEntry, _>(&self.logs);
	}
}

impl Decodable for Receipt {
	fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
		let bloom_bytes: Vec<u8> = rlp.val_at(1)?;
		if bloom_bytes.len() != 256 {
			return Err(DecoderError::Custom("invalid bloom length"));
		}
		Ok(Receipt {
			gas_used: rlp.val_at(0)?,
			log_bloom: Bloom::from_slice(&bloom_bytes),
			logs: rlp.list_at(2)?,
		})
	}
}

#[cfg(test)]
mod tests {
	use ethereum_types::Address;
	use keccak_hash::keccak;
	use crate::types::log_entry::LogEntry;
	use super::Receipt;

	#[test]
	fn receipt_rlp_round_trips() {
		let r = Receipt::new(
			21_000.into(),
			vec![LogEntry {
				address: Address::from_low_u64_be(9),
				topics: vec![keccak(b"t")],
				data: vec![5, 6, 7],
			}],
		);
		let decoded: Receipt = rlp::decode(&rlp::encode(&r)).unwrap();
		assert_eq!(decoded, r);
	}

	#[test]
	fn bloom_accrues_logs() {
		let r = Receipt::new(
			0.into(),
			vec![LogEntry {
				address: Address::from_low_u64_be(9),
				topics: vec![],
				data: vec![],
			}],
		);
		assert!(r.log_bloom.contains_bloom(&r.logs[0].bloom()));
	}
}
