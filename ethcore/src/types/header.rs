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

//! Block header.

use ethereum_types::{Address, Bloom, H256, U256};
use keccak_hash::keccak;
use parity_bytes::Bytes;
use rlp::{DecoderError, Decodable, Encodable, Rlp, RlpStream};

/// Type for block number.
pub type BlockNumber = u64;

/// A block header.
///
/// Carries the chain linkage, the roots committing to the block's state and
/// receipts, and the proof-of-work seal nonce. The seal is excluded from
/// `bare_hash`, which is the value miners grind against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
	/// Parent hash.
	pub parent_hash: H256,
	/// Block author.
	pub author: Address,
	/// State root.
	pub state_root: H256,
	/// Block receipts root.
	pub receipts_root: H256,
	/// Block bloom.
	pub log_bloom: Bloom,
	/// Block difficulty.
	pub difficulty: U256,
	/// Block number.
	pub number: BlockNumber,
	/// Block gas limit.
	pub gas_limit: U256,
	/// Gas used for contracts execution.
	pub gas_used: U256,
	/// Block timestamp.
	pub timestamp: u64,
	/// Block extra data.
	pub extra_data: Bytes,
	/// Proof-of-work seal.
	pub nonce: u64,
}

impl Default for Header {
	fn default() -> Self {
		Header {
			parent_hash: H256::zero(),
			author: Address::zero(),
			state_root: keccak_hash::KECCAK_NULL_RLP,
			receipts_root: keccak_hash::KECCAK_NULL_RLP,
			log_bloom: Bloom::default(),
			difficulty: U256::zero(),
			number: 0,
			gas_limit: U256::zero(),
			gas_used: U256::zero(),
			timestamp: 0,
			extra_data: Bytes::new(),
			nonce: 0,
		}
	}
}

impl Header {
	/// The keccak of the RLP representation, seal included. Identifies the
	/// block.
	pub fn hash(&self) -> H256 {
		keccak(self.rlp(true))
	}

	/// The keccak of the RLP representation with the seal stripped: the
	/// value the proof-of-work commits to.
	pub fn bare_hash(&self) -> H256 {
		keccak(self.rlp(false))
	}

	/// Get the RLP representation of this Header.
	pub fn rlp(&self, with_seal: bool) -> Bytes {
		let mut s = RlpStream::new();
		self.stream_rlp(&mut s, with_seal);
		s.out().to_vec()
	}

	/// Place this header into an RLP stream `s`, optionally `with_seal`.
	fn stream_rlp(&self, s: &mut RlpStream, with_seal: bool) {
		s.begin_list(if with_seal { 12 } else { 11 });
		s.append(&self.parent_hash);
		s.append(&self.author);
		s.append(&self.state_root);
		s.append(&self.receipts_root);
		s.append(&self.log_bloom.as_bytes().to_vec());
		s.append(&self.difficulty);
		s.append(&self.number);
		s.append(&self.gas_limit);
		s.append(&self.gas_used);
		s.append(&self.timestamp);
		s.append(&self.extra_data);
		if with_seal {
			s.append(&self.nonce);
		}
	}
}

impl Encodable for Header {
	fn rlp_append(&self, s: &mut RlpStream) {
		self.stream_rlp(s, true);
	}
}

impl Decodable for Header {
	fn decode(r: &Rlp) -> Result<Self, DecoderError> {
		let bloom_bytes: Vec<u8> = r.val_at(4)?;
		if bloom_bytes.len() != 256 {
			return Err(DecoderError::Custom("invalid bloom length"));
		}
		Ok(Header {
			parent_hash: r.val_at(0)?,
			author: r.val_at(1)?,
			state_root: r.val_at(2)?,
			receipts_root: r.val_at(3)?,
			log_bloom: Bloom::from_slice(&bloom_bytes),
			difficulty: r.val_at(5)?,
			number: r.val_at(6)?,
			gas_limit: r.val_at(7)?,
			gas_used: r.val_at(8)?,
			timestamp: r.val_at(9)?,
			extra_data: r.val_at(10)?,
			nonce: r.val_at(11)?,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::Header;

	#[test]
	fn header_rlp_round_trips() {
		let mut header = Header::default();
		header.number = 7;
		header.difficulty = 0x20000.into();
		header.timestamp = 1_500_000_000;
		header.extra_data = b"conformance".to_vec();
		header.nonce = 0xdead_beef;

		let decoded: Header = rlp::decode(&rlp::encode(&header)).unwrap();
		assert_eq!(decoded, header);
	}

	#[test]
	fn bare_hash_excludes_seal() {
		let mut a = Header::default();
		let mut b = Header::default();
		a.nonce = 1;
		b.nonce = 2;
		assert_eq!(a.bare_hash(), b.bare_hash());
		assert_ne!(a.hash(), b.hash());
	}
}
