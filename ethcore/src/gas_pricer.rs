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

//! Recommends a minimal acceptable gas price from recent history.

use std::collections::BTreeMap;

use ethereum_types::U256;

use crate::blockchain::BlockChain;

/// How many blocks deep the calibrated pricer looks.
const PRICE_WINDOW: usize = 1000;

/// Gas price recommender.
#[derive(Debug, Clone)]
pub enum GasPricer {
	/// Always recommends the same price, ignoring history.
	Fixed(U256),
	/// Recommends from an octile distribution over recent blocks.
	Calibrated(OctileGasPricer),
}

impl GasPricer {
	/// A calibrated pricer with zeroed octiles; call `update` before use.
	pub fn new_calibrated() -> GasPricer {
		GasPricer::Calibrated(OctileGasPricer::default())
	}

	/// The minimal gas price the node should accept for inclusion.
	pub fn ask(&self) -> U256 {
		match self {
			GasPricer::Fixed(price) => *price,
			GasPricer::Calibrated(octiles) => octiles.median(),
		}
	}

	/// Recalibrate from the chain. A no-op for the fixed variant.
	pub fn update(&mut self, chain: &BlockChain) {
		if let GasPricer::Calibrated(octiles) = self {
			octiles.update(chain);
		}
	}
}

/// Nine thresholds partitioning observed gas prices into eight
/// gas-weighted slices, plus the head's per-block gas allowance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OctileGasPricer {
	octiles: [U256; 9],
	gas_per_block: U256,
}

impl OctileGasPricer {
	/// The `i`-th octile threshold; 0 is the cheapest observed price, 8 the
	/// dearest.
	pub fn octile(&self, i: usize) -> U256 {
		self.octiles[i]
	}

	/// The median observed price.
	pub fn median(&self) -> U256 {
		self.octiles[4]
	}

	/// Gas allowance of the current head block.
	pub fn gas_per_block(&self) -> U256 {
		self.gas_per_block
	}

	/// Walk back at most a thousand blocks from the head, binning gas used
	/// per price; octile `q` becomes the cheapest price at which the
	/// cumulative gas-weighted fraction crosses `q/8`. Retains the previous
	/// octiles when the window holds no transactions.
	pub fn update(&mut self, chain: &BlockChain) {
		let mut hash = chain.best_block_hash();
		self.gas_per_block = chain.best_block_header().gas_limit;

		let mut dist: BTreeMap<U256, u64> = BTreeMap::new();
		let mut total: u64 = 0;
		for _ in 0..PRICE_WINDOW {
			let header = match chain.block_header(&hash) {
				Some(header) => header,
				None => break,
			};
			let transactions = chain.transactions(&hash);
			if !transactions.is_empty() {
				let receipts = chain.receipts(&hash);
				let mut prior = U256::zero();
				for (tx, receipt) in transactions.iter().zip(receipts.iter()) {
					let gas_used = (receipt.gas_used - prior).as_u64();
					prior = receipt.gas_used;
					*dist.entry(tx.gas_price).or_insert(0) += gas_used;
					total += gas_used;
				}
			}
			if header.number == 0 {
				break;
			}
			hash = header.parent_hash;
		}

		if total == 0 {
			trace!(target: "client", "No transactions in the last {} blocks; keeping previous octiles", PRICE_WINDOW);
			return;
		}

		let mut t: u64 = 0;
		let mut q: u64 = 1;
		self.octiles[0] = *dist.keys().next().expect("total > 0 implies a bin; qed");
		for (price, gas) in &dist {
			while q <= 7 && t <= total * q / 8 && t + gas > total * q / 8 {
				self.octiles[q as usize] = *price;
				q += 1;
			}
			t += gas;
			if q > 7 {
				break;
			}
		}
		self.octiles[8] = *dist.keys().next_back().expect("total > 0 implies a bin; qed");
		debug!(target: "client", "Recalibrated gas price octiles: {:?}", self.octiles);
	}
}

#[cfg(test)]
mod tests {
	use ethereum_types::U256;
	use crate::test_helpers::{build_block, new_chain_and_state, transfer_priced};
	use super::{GasPricer, OctileGasPricer};

	#[test]
	fn fixed_pricer_ignores_history() {
		let (chain, _state_db) = new_chain_and_state();
		let mut pricer = GasPricer::Fixed(U256::from(11));
		pricer.update(&chain);
		assert_eq!(pricer.ask(), U256::from(11));
	}

	#[test]
	fn octiles_follow_equal_weight_distribution() {
		let (chain, state_db) = new_chain_and_state();
		// three blocks, one transaction each at prices 10, 20, 30 with equal
		// gas weight.
		let mut parent = chain.genesis_hash();
		for (i, price) in [10u64, 20, 30].iter().enumerate() {
			let block = build_block(
				&chain,
				&state_db,
				parent,
				vec![transfer_priced(1, i as u64, *price)],
				0,
			);
			parent = crate::test_helpers::block_hash(&block);
			chain.attempt_import(&block, &state_db).unwrap();
		}

		let mut pricer = OctileGasPricer::default();
		pricer.update(&chain);
		let expected: Vec<U256> = [10u64, 10, 10, 20, 20, 20, 30, 30, 30]
			.iter()
			.map(|p| U256::from(*p))
			.collect();
		let got: Vec<U256> = (0..9).map(|i| pricer.octile(i)).collect();
		assert_eq!(got, expected);
	}

	#[test]
	fn octiles_are_monotonic() {
		let (chain, state_db) = new_chain_and_state();
		let mut parent = chain.genesis_hash();
		for (i, price) in [5u64, 40, 7, 7, 100].iter().enumerate() {
			let block = build_block(
				&chain,
				&state_db,
				parent,
				vec![transfer_priced(1, i as u64, *price)],
				0,
			);
			parent = crate::test_helpers::block_hash(&block);
			chain.attempt_import(&block, &state_db).unwrap();
		}
		let mut pricer = OctileGasPricer::default();
		pricer.update(&chain);
		for i in 0..8 {
			assert!(pricer.octile(i) <= pricer.octile(i + 1), "octile {} > octile {}", i, i + 1);
		}
	}

	#[test]
	fn empty_window_retains_octiles() {
		let (chain, _state_db) = new_chain_and_state();
		let mut pricer = OctileGasPricer::default();
		pricer.octiles = [U256::from(9); 9];
		pricer.update(&chain);
		assert_eq!(pricer.octile(4), U256::from(9));
		assert_eq!(pricer.gas_per_block(), chain.spec().genesis_gas_limit);
	}
}
