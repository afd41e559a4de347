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

//! Transaction execution environment and the executive applying single
//! transactions to a state.
//!
//! Contract bytecode interpretation belongs to the external virtual machine
//! in the full system; this executive covers the transaction envelope:
//! intrinsic gas, nonce and balance gating, fee routing to the block author,
//! value transfer and log production.

use std::sync::Arc;

use ethereum_types::{Address, H256, U256};
use keccak_hash::keccak;
use parity_bytes::Bytes;
use rlp::RlpStream;
use thiserror::Error;

use crate::state::State;
use crate::types::header::BlockNumber;
use crate::types::log_entry::LogEntry;
use crate::types::transaction::{Action, SignedTransaction};

/// Base gas charged per transaction.
pub const G_TRANSACTION: u64 = 21_000;
/// Gas charged per zero byte of transaction data.
pub const G_TXDATA_ZERO: u64 = 4;
/// Gas charged per non-zero byte of transaction data.
pub const G_TXDATA_NONZERO: u64 = 68;

/// The most recent 256 block hashes, oldest last. `call` runs with an empty
/// context.
pub type LastHashes = Vec<H256>;

/// Information concerning the execution environment for a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvInfo {
	/// The block number.
	pub number: BlockNumber,
	/// The block author.
	pub author: Address,
	/// The block timestamp.
	pub timestamp: u64,
	/// The block difficulty.
	pub difficulty: U256,
	/// The block gas limit.
	pub gas_limit: U256,
	/// The last 256 block hashes.
	pub last_hashes: Arc<LastHashes>,
}

impl Default for EnvInfo {
	fn default() -> Self {
		EnvInfo {
			number: 0,
			author: Address::zero(),
			timestamp: 0,
			difficulty: U256::zero(),
			gas_limit: U256::max_value(),
			last_hashes: Arc::new(LastHashes::new()),
		}
	}
}

/// Result of executing the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
	/// Returned when transaction nonce does not match state nonce.
	#[error("invalid nonce: expected {expected}, got {got}")]
	InvalidNonce { expected: U256, got: U256 },
	/// Returned when the intrinsic gas cost exceeds the supplied gas.
	#[error("not enough base gas: required {required}, got {got}")]
	NotEnoughBaseGas { required: U256, got: U256 },
	/// Returned when the block's remaining gas cannot cover the transaction.
	#[error("block gas limit reached: limit {gas_limit}, used {gas_used}, tx requires {gas}")]
	BlockGasLimitReached { gas_limit: U256, gas_used: U256, gas: U256 },
	/// Returned when the sender cannot afford value + gas * gas_price.
	#[error("not enough cash: required {required}, got {got}")]
	NotEnoughCash { required: U256, got: U256 },
	/// Returned when an internal assumption is violated.
	#[error("internal execution error: {0}")]
	Internal(String),
}

/// The outcome of applying a transaction to a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executed {
	/// Gas used during execution of the transaction.
	pub gas_used: U256,
	/// The output of the call.
	pub output: Bytes,
	/// Any logs produced.
	pub logs: Vec<LogEntry>,
	/// Address of the newly created contract, for creations.
	pub contract_address: Option<Address>,
}

/// The outcome of a speculative `call`: failure is captured, never thrown.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
	/// Gas used.
	pub gas_used: U256,
	/// Call output.
	pub output: Bytes,
	/// Logs the call would have produced.
	pub logs: Vec<LogEntry>,
	/// The captured failure, if execution did not complete.
	pub excepted: Option<ExecutionError>,
}

/// Transaction executor over a mutable state.
pub struct Executive<'a> {
	state: &'a mut State,
	env: &'a EnvInfo,
}

/// The intrinsic gas cost of a transaction's envelope and data.
pub fn intrinsic_gas(data: &[u8]) -> U256 {
	let data_cost: u64 = data
		.iter()
		.map(|b| if *b == 0 { G_TXDATA_ZERO } else { G_TXDATA_NONZERO })
		.sum();
	U256::from(G_TRANSACTION + data_cost)
}

/// Address of a contract created by `sender` at `nonce`.
pub fn contract_address(sender: &Address, nonce: &U256) -> Address {
	let mut s = RlpStream::new_list(2);
	s.append(sender);
	s.append(nonce);
	Address::from_slice(&keccak(s.out()).as_bytes()[12..])
}

impl<'a> Executive<'a> {
	/// Basic constructor.
	pub fn new(state: &'a mut State, env: &'a EnvInfo) -> Self {
		Executive { state, env }
	}

	/// Execute a transaction. On success the sender's nonce has advanced,
	/// the fee has been credited to the environment's author and the value
	/// transferred; on failure the state is untouched.
	pub fn transact(
		&mut self,
		t: &SignedTransaction,
		check_nonce: bool,
	) -> Result<Executed, ExecutionError> {
		let sender = t.sender();

		let base_gas = intrinsic_gas(&t.data);
		if t.gas < base_gas {
			return Err(ExecutionError::NotEnoughBaseGas {
				required: base_gas,
				got: t.gas,
			});
		}

		if check_nonce {
			let nonce = self.state.nonce(&sender);
			if t.nonce != nonce {
				return Err(ExecutionError::InvalidNonce {
					expected: nonce,
					got: t.nonce,
				});
			}
		}

		// the whole gas allowance must be affordable up front, even though
		// only the used portion is ultimately charged.
		let gas_cost = t.gas.saturating_mul(t.gas_price);
		let total_cost = t.value.saturating_add(gas_cost);
		let balance = self.state.balance(&sender);
		if balance < total_cost {
			return Err(ExecutionError::NotEnoughCash {
				required: total_cost,
				got: balance,
			});
		}

		let gas_used = base_gas;
		let fee = gas_used.saturating_mul(t.gas_price);

		self.state.inc_nonce(&sender);
		self.state.sub_balance(&sender, fee.saturating_add(t.value));
		self.state.add_balance(&self.env.author, fee);

		let mut logs = Vec::new();
		let mut created = None;
		match t.action {
			Action::Call(dest) => {
				self.state.add_balance(&dest, t.value);
				if !t.data.is_empty() {
					logs.push(LogEntry {
						address: dest,
						topics: vec![keccak(&t.data)],
						data: t.data.clone(),
					});
				}
			}
			Action::Create => {
				let new_address = contract_address(&sender, &t.nonce);
				self.state.add_balance(&new_address, t.value);
				created = Some(new_address);
			}
		}

		Ok(Executed {
			gas_used,
			output: Bytes::new(),
			logs,
			contract_address: created,
		})
	}
}

#[cfg(test)]
mod tests {
	use ethereum_types::{Address, U256};
	use keccak_hash::keccak;
	use crate::state::State;
	use crate::types::transaction::{Action, Transaction};
	use super::{intrinsic_gas, EnvInfo, Executive, ExecutionError, G_TRANSACTION};

	fn sender() -> Address {
		Address::from_low_u64_be(1)
	}

	fn state_with_funds() -> State {
		let mut state = State::new_temp();
		state.add_balance(&sender(), U256::from(10_000_000_000u64));
		state
	}

	fn env() -> EnvInfo {
		EnvInfo {
			author: Address::from_low_u64_be(0xaa),
			..Default::default()
		}
	}

	#[test]
	fn transfers_value_and_routes_fee() {
		let mut state = state_with_funds();
		let env = env();
		let dest = Address::from_low_u64_be(2);
		let t = Transaction {
			nonce: U256::zero(),
			gas_price: U256::from(1),
			gas: U256::from(21_000),
			action: Action::Call(dest),
			value: U256::from(500),
			data: vec![],
		}
		.fake_sign(sender());

		let executed = Executive::new(&mut state, &env).transact(&t, true).unwrap();
		assert_eq!(executed.gas_used, U256::from(G_TRANSACTION));
		assert_eq!(state.balance(&dest), U256::from(500));
		assert_eq!(state.balance(&env.author), U256::from(21_000));
		assert_eq!(state.nonce(&sender()), U256::one());
		assert!(executed.logs.is_empty());
	}

	#[test]
	fn data_call_produces_log() {
		let mut state = state_with_funds();
		let env = env();
		let dest = Address::from_low_u64_be(2);
		let data = vec![1u8, 0, 2];
		let t = Transaction {
			gas_price: U256::zero(),
			gas: intrinsic_gas(&data),
			action: Action::Call(dest),
			data: data.clone(),
			..Default::default()
		}
		.fake_sign(sender());

		let executed = Executive::new(&mut state, &env).transact(&t, true).unwrap();
		assert_eq!(executed.logs.len(), 1);
		assert_eq!(executed.logs[0].address, dest);
		assert_eq!(executed.logs[0].topics, vec![keccak(&data)]);
	}

	#[test]
	fn rejects_stale_nonce() {
		let mut state = state_with_funds();
		state.inc_nonce(&sender());
		let env = env();
		let t = Transaction {
			nonce: U256::zero(),
			gas: U256::from(21_000),
			action: Action::Call(Address::zero()),
			..Default::default()
		}
		.fake_sign(sender());

		match Executive::new(&mut state, &env).transact(&t, true) {
			Err(ExecutionError::InvalidNonce { expected, got }) => {
				assert_eq!(expected, U256::one());
				assert_eq!(got, U256::zero());
			}
			other => panic!("unexpected: {:?}", other),
		}
	}

	#[test]
	fn rejects_unaffordable_transaction() {
		let mut state = State::new_temp();
		state.add_balance(&sender(), U256::from(10));
		let env = env();
		let t = Transaction {
			gas_price: U256::one(),
			gas: U256::from(21_000),
			action: Action::Call(Address::zero()),
			..Default::default()
		}
		.fake_sign(sender());

		assert!(matches!(
			Executive::new(&mut state, &env).transact(&t, true),
			Err(ExecutionError::NotEnoughCash { .. })
		));
	}

	#[test]
	fn creation_yields_contract_address() {
		let mut state = state_with_funds();
		let env = env();
		let t = Transaction {
			gas: U256::from(21_000),
			action: Action::Create,
			value: U256::from(7),
			..Default::default()
		}
		.fake_sign(sender());

		let executed = Executive::new(&mut state, &env).transact(&t, true).unwrap();
		let created = executed.contract_address.unwrap();
		assert_eq!(created, super::contract_address(&sender(), &U256::zero()));
		assert_eq!(state.balance(&created), U256::from(7));
	}
}
