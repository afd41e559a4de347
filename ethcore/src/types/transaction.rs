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

//! Transaction data structure.

use std::ops::Deref;

use ethereum_types::{Address, H256, U256};
use keccak_hash::keccak;
use parity_bytes::Bytes;
use rlp::{DecoderError, Decodable, Encodable, Rlp, RlpStream};

/// Transaction action: either a contract creation or a message call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
	/// Create creates new contract.
	Create,
	/// Calls contract at given address.
	/// In the case of a transfer, this is the receiver's address.
	Call(Address),
}

impl Default for Action {
	fn default() -> Action {
		Action::Create
	}
}

impl Encodable for Action {
	fn rlp_append(&self, s: &mut RlpStream) {
		match *self {
			Action::Create => s.append_internal(&""),
			Action::Call(ref addr) => s.append_internal(addr),
		};
	}
}

impl Decodable for Action {
	fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
		if rlp.is_empty() {
			if rlp.is_data() {
				Ok(Action::Create)
			} else {
				Err(DecoderError::RlpExpectedToBeData)
			}
		} else {
			Ok(Action::Call(rlp.as_val()?))
		}
	}
}

/// A set of information describing an externally-originating message call
/// or contract creation operation.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
	/// Nonce.
	pub nonce: U256,
	/// Gas price.
	pub gas_price: U256,
	/// Gas paid up front for transaction execution.
	pub gas: U256,
	/// Action, see `Action`.
	pub action: Action,
	/// Transferred value.
	pub value: U256,
	/// Transaction data.
	pub data: Bytes,
}

impl Transaction {
	/// Attach a sender to this transaction, producing a queueable
	/// transaction. Key management lives outside this crate; the sender is
	/// taken at face value and the executive enforces nonce and balance.
	pub fn fake_sign(self, sender: Address) -> SignedTransaction {
		SignedTransaction {
			unsigned: self,
			sender,
			hash: H256::zero(),
		}
		.compute_hash()
	}
}

/// A transaction with a known sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
	unsigned: Transaction,
	sender: Address,
	hash: H256,
}

impl Deref for SignedTransaction {
	type Target = Transaction;

	fn deref(&self) -> &Self::Target {
		&self.unsigned
	}
}

impl Encodable for SignedTransaction {
	fn rlp_append(&self, s: &mut RlpStream) {
		s.begin_list(7);
		s.append(&self.unsigned.nonce);
		s.append(&self.unsigned.gas_price);
		s.append(&self.unsigned.gas);
		s.append(&self.unsigned.action);
		s.append(&self.unsigned.value);
		s.append(&self.unsigned.data);
		s.append(&self.sender);
	}
}

impl Decodable for SignedTransaction {
	fn decode(d: &Rlp) -> Result<Self, DecoderError> {
		if d.item_count()? != 7 {
			return Err(DecoderError::RlpIncorrectListLen);
		}
		Ok(SignedTransaction {
			unsigned: Transaction {
				nonce: d.val_at(0)?,
				gas_price: d.val_at(1)?,
				gas: d.val_at(2)?,
				action: d.val_at(3)?,
				value: d.val_at(4)?,
				data: d.val_at(5)?,
			},
			sender: d.val_at(6)?,
			hash: keccak(d.as_raw()),
		})
	}
}

impl SignedTransaction {
	fn compute_hash(mut self) -> SignedTransaction {
		self.hash = keccak(&*rlp::encode(&self));
		self
	}

	/// Transaction sender.
	pub fn sender(&self) -> Address {
		self.sender
	}

	/// Get the hash of this transaction.
	pub fn hash(&self) -> H256 {
		self.hash
	}

	/// Returns a reference to the plain transaction.
	pub fn as_unsigned(&self) -> &Transaction {
		&self.unsigned
	}

	/// RLP bytes of this transaction.
	pub fn rlp_bytes(&self) -> Bytes {
		rlp::encode(self).to_vec()
	}
}

#[cfg(test)]
mod tests {
	use ethereum_types::{Address, U256};
	use super::{Action, Transaction};

	#[test]
	fn signed_transaction_rlp_round_trips() {
		let t = Transaction {
			nonce: U256::from(3),
			gas_price: U256::from(10),
			gas: U256::from(21_000),
			action: Action::Call(Address::from_low_u64_be(0xcafe)),
			value: U256::from(100),
			data: vec![0xde, 0xad],
		}
		.fake_sign(Address::from_low_u64_be(1));

		let decoded: super::SignedTransaction = rlp::decode(&rlp::encode(&t)).unwrap();
		assert_eq!(decoded, t);
		assert_eq!(decoded.hash(), t.hash());
		assert_eq!(decoded.sender(), Address::from_low_u64_be(1));
	}

	#[test]
	fn create_action_encodes_as_empty() {
		let t = Transaction {
			action: Action::Create,
			..Default::default()
		}
		.fake_sign(Address::from_low_u64_be(2));
		let decoded: super::SignedTransaction = rlp::decode(&rlp::encode(&t)).unwrap();
		assert_eq!(decoded.action, Action::Create);
	}

	#[test]
	fn hash_depends_on_sender() {
		let t = |sender| {
			Transaction::default().fake_sign(Address::from_low_u64_be(sender))
		};
		assert_ne!(t(1).hash(), t(2).hash());
	}
}
