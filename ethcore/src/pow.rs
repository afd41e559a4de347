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

//! Proof-of-work sealing and verification, plus the difficulty schedule.
//!
//! The proof value is `keccak(bare_header_hash ++ nonce_le)`; a seal is
//! valid when the value, read as a 256-bit big-endian integer, is at most
//! `U256::MAX / difficulty`.

use ethereum_types::{H256, U256};
use keccak_hash::keccak;

use crate::error::ImportError;
use crate::spec::ChainSpec;
use crate::types::header::Header;

/// The proof value for `pow_hash` under `nonce`.
pub fn proof_value(pow_hash: &H256, nonce: u64) -> H256 {
	let mut buf = [0u8; 40];
	buf[..32].copy_from_slice(pow_hash.as_bytes());
	buf[32..].copy_from_slice(&nonce.to_le_bytes());
	keccak(&buf[..])
}

/// The largest acceptable proof value for `difficulty`.
pub fn boundary(difficulty: &U256) -> U256 {
	if *difficulty <= U256::one() {
		U256::max_value()
	} else {
		U256::max_value() / *difficulty
	}
}

/// Whether `nonce` seals `pow_hash` at `difficulty`.
pub fn quick_verify(pow_hash: &H256, nonce: u64, difficulty: &U256) -> bool {
	U256::from_big_endian(proof_value(pow_hash, nonce).as_bytes()) <= boundary(difficulty)
}

/// Verify a header's seal against its own difficulty.
pub fn verify_seal(header: &Header) -> Result<(), ImportError> {
	if quick_verify(&header.bare_hash(), header.nonce, &header.difficulty) {
		Ok(())
	} else {
		Err(ImportError::InvalidSeal)
	}
}

/// The difficulty of a child of `parent` sealed at `timestamp`.
///
/// Frontier rule: adjust by `parent / bound_divisor` upwards when the block
/// came quickly, downwards otherwise, floored at the chain's minimum.
pub fn child_difficulty(spec: &ChainSpec, parent: &Header, timestamp: u64) -> U256 {
	let step = parent.difficulty / spec.difficulty_bound_divisor;
	let raw = if timestamp.saturating_sub(parent.timestamp) < spec.duration_limit {
		parent.difficulty.saturating_add(step)
	} else {
		parent.difficulty.saturating_sub(step)
	};
	std::cmp::max(raw, spec.min_difficulty)
}

#[cfg(test)]
mod tests {
	use ethereum_types::{H256, U256};
	use crate::spec::ChainSpec;
	use crate::types::header::Header;
	use super::{boundary, child_difficulty, quick_verify, verify_seal};

	#[test]
	fn unit_difficulty_accepts_any_nonce() {
		let hash = H256::repeat_byte(0xab);
		assert!(quick_verify(&hash, 0, &U256::one()));
		assert!(quick_verify(&hash, u64::max_value(), &U256::one()));
	}

	#[test]
	fn boundary_shrinks_with_difficulty() {
		assert!(boundary(&U256::from(1_000_000)) < boundary(&U256::from(2)));
		assert_eq!(boundary(&U256::zero()), U256::max_value());
	}

	#[test]
	fn seal_verification_matches_grinding() {
		let mut header = Header::default();
		header.difficulty = U256::from(4);
		let pow_hash = header.bare_hash();
		let mut nonce = 0u64;
		while !quick_verify(&pow_hash, nonce, &header.difficulty) {
			nonce += 1;
		}
		header.nonce = nonce;
		assert!(verify_seal(&header).is_ok());
	}

	#[test]
	fn difficulty_walks_with_timestamps() {
		let spec = ChainSpec::default();
		let mut parent = Header::default();
		parent.difficulty = spec.genesis_difficulty;
		parent.timestamp = 1000;
		let quick = child_difficulty(&spec, &parent, 1001);
		let slow = child_difficulty(&spec, &parent, 1000 + spec.duration_limit + 1);
		assert!(quick > parent.difficulty);
		assert!(slow < parent.difficulty);
		assert!(slow >= spec.min_difficulty);
	}
}
