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

//! General error types for the client core.

use ethereum_types::{H256, U256};
use thiserror::Error;

use crate::executive::ExecutionError;
use crate::types::header::BlockNumber;

/// Error rejecting a block on import.
///
/// These are dropped (and logged) by the work cycle rather than propagated;
/// the queues count rejections.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImportError {
	#[error("block already in chain")]
	AlreadyInChain,
	#[error("block already queued")]
	AlreadyQueued,
	#[error("parent {0} not found")]
	UnknownParent(H256),
	#[error("seal does not meet difficulty boundary")]
	InvalidSeal,
	#[error("invalid difficulty: expected {expected}, found {found}")]
	InvalidDifficulty { expected: U256, found: U256 },
	#[error("invalid block number: expected {expected}, found {found}")]
	InvalidNumber { expected: BlockNumber, found: BlockNumber },
	#[error("invalid gas limit: expected {expected}, found {found}")]
	InvalidGasLimit { expected: U256, found: U256 },
	#[error("timestamp {found} not after parent {parent}")]
	InvalidTimestamp { parent: u64, found: u64 },
	#[error("state root mismatch: header {expected}, computed {found}")]
	InvalidStateRoot { expected: H256, found: H256 },
	#[error("receipts root mismatch: header {expected}, computed {found}")]
	InvalidReceiptsRoot { expected: H256, found: H256 },
	#[error("transaction invalid within block: {0}")]
	InvalidTransaction(ExecutionError),
}

/// Top-level client error.
#[derive(Debug, Error)]
pub enum Error {
	#[error("i/o error: {0}")]
	Io(#[from] std::io::Error),
	#[error("decoding error: {0}")]
	Decoder(#[from] rlp::DecoderError),
	#[error("block import rejected: {0}")]
	Import(#[from] ImportError),
	#[error("execution error: {0}")]
	Execution(#[from] ExecutionError),
	#[error("state for root {0} unavailable in the backing database")]
	StateUnavailable(H256),
	#[error("block {0} unknown")]
	UnknownBlock(H256),
}
