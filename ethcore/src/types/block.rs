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

//! Blocks: the wire form, and the closed (executed, unsealed) form produced
//! when the pending state is frozen for mining.

use parity_bytes::Bytes;
use rlp::{DecoderError, Decodable, Encodable, Rlp, RlpStream};

use crate::types::header::Header;
use crate::types::receipt::Receipt;
use crate::types::transaction::SignedTransaction;

/// A block, encoded as it is on the block chain.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Block {
	/// The header of this block.
	pub header: Header,
	/// The transactions in this block.
	pub transactions: Vec<SignedTransaction>,
}

impl Block {
	/// Get the RLP-encoding of the block.
	pub fn rlp_bytes(&self) -> Bytes {
		rlp::encode(self).to_vec()
	}
}

impl Encodable for Block {
	fn rlp_append(&self, s: &mut RlpStream) {
		s.begin_list(2);
		s.append(&self.header);
		s.append_list::<SignedTransaction, _>(&self.transactions);
	}
}

impl Decodable for Block {
	fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
		if rlp.item_count()? != 2 {
			return Err(DecoderError::RlpIncorrectListLen);
		}
		Ok(Block {
			header: rlp.val_at(0)?,
			transactions: rlp.list_at(1)?,
		})
	}
}

/// A block that has been executed against its parent state but not yet
/// sealed: the output of freezing the pending state for mining. The header
/// nonce is zero until a proof is found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedBlock {
	/// The unsealed block.
	pub block: Block,
	/// Receipts for each of the block's transactions, in order.
	pub receipts: Vec<Receipt>,
}

impl ClosedBlock {
	/// Seal with the given proof-of-work nonce, yielding chain-importable
	/// bytes.
	pub fn seal(mut self, nonce: u64) -> Bytes {
		self.block.header.nonce = nonce;
		self.block.rlp_bytes()
	}
}

#[cfg(test)]
mod tests {
	use ethereum_types::Address;
	use crate::types::transaction::Transaction;
	use super::Block;

	#[test]
	fn block_rlp_round_trips() {
		let mut block = Block::default();
		block.header.number = 1;
		block.transactions = vec![
			Transaction::default().fake_sign(Address::from_low_u64_be(1)),
			Transaction::default().fake_sign(Address::from_low_u64_be(2)),
		];
		let decoded: Block = rlp::decode(&block.rlp_bytes()).unwrap();
		assert_eq!(decoded, block);
	}
}
