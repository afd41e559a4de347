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

//! The two miner kinds sharing one capability set: local miners owning a
//! grinder thread, and the remote miner fed over the getWork/submitWork
//! protocol.
//!
//! Miners work on an immutable snapshot of the sealing task and never touch
//! the state locks; the client invalidates stale work with
//! `note_state_change` and hands out fresh tasks once the world has
//! settled.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ethereum_types::{H256, U256};
use itertools::{EitherOrBoth, Itertools};
use parity_bytes::Bytes;
use parking_lot::Mutex;

use crate::pow;
use crate::types::block::Block;

/// Nonces tried between checks of the abort/staleness flags.
const PROOF_BATCH: u64 = 1024;
/// How often a grinder thread records a history sample.
const SAMPLE_PERIOD: Duration = Duration::from_secs(1);
/// History samples kept per miner.
const MAX_HISTORY: usize = 60;

/// An immutable unit of sealing work: the unsealed candidate block.
#[derive(Debug, Clone)]
pub struct SealingTask {
	/// The candidate block; its header nonce is zero until sealed.
	pub block: Block,
}

impl SealingTask {
	/// The hash the proof-of-work commits to.
	pub fn pow_hash(&self) -> H256 {
		self.block.header.bare_hash()
	}

	/// The difficulty the proof must meet.
	pub fn difficulty(&self) -> U256 {
		self.block.header.difficulty
	}
}

/// Hashing progress of a miner.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MiningProgress {
	/// Hashes tried.
	pub hashes: u64,
	/// Milliseconds spent.
	pub ms: u64,
}

impl MiningProgress {
	/// Aggregate with another progress report. Commutative.
	pub fn combine(self, other: MiningProgress) -> MiningProgress {
		MiningProgress {
			hashes: self.hashes + other.hashes,
			ms: self.ms.max(other.ms),
		}
	}

	/// Hashes per second.
	pub fn rate(&self) -> u64 {
		self.hashes.saturating_mul(1000) / self.ms.max(1)
	}
}

/// Zip-combine per-time-step samples from several miners.
pub fn combine_histories(
	acc: Vec<MiningProgress>,
	other: Vec<MiningProgress>,
) -> Vec<MiningProgress> {
	acc.into_iter()
		.zip_longest(other)
		.map(|pair| match pair {
			EitherOrBoth::Both(a, b) => a.combine(b),
			EitherOrBoth::Left(a) => a,
			EitherOrBoth::Right(b) => b,
		})
		.collect()
}

/// The capability set both miner kinds expose.
pub trait Miner: Send + Sync {
	/// Replace the current sealing task. `None` idles the miner.
	fn assign_work(&self, task: Option<SealingTask>);
	/// Invalidate the current task; any proof in flight is for a stale
	/// world.
	fn note_state_change(&self);
	/// Whether a sealed block is waiting to be collected.
	fn is_complete(&self) -> bool;
	/// Take the sealed block bytes, if any.
	fn block_data(&self) -> Option<Bytes>;
	/// Progress of the current grind.
	fn mining_progress(&self) -> MiningProgress;
	/// Per-time-step progress samples, oldest first.
	fn mining_history(&self) -> Vec<MiningProgress>;
}

#[derive(Default)]
struct MinerInner {
	task: Mutex<Option<SealingTask>>,
	generation: AtomicU64,
	complete: AtomicBool,
	sealed: Mutex<Option<Bytes>>,
	abort: AtomicBool,
	progress: Mutex<MiningProgress>,
	history: Mutex<VecDeque<MiningProgress>>,
}

/// A miner owning one grinder thread.
pub struct LocalMiner {
	index: usize,
	inner: Arc<MinerInner>,
	handle: Option<thread::JoinHandle<()>>,
}

impl LocalMiner {
	/// Spawn a grinder with the given ordinal index. It idles until work is
	/// assigned.
	pub fn spawn(index: usize) -> LocalMiner {
		let inner = Arc::new(MinerInner::default());
		let thread_inner = inner.clone();
		let handle = thread::Builder::new()
			.name(format!("miner-{}", index))
			.spawn(move || grind(thread_inner))
			.expect("spawning a named thread only fails on OOM; qed");
		trace!(target: "miner", "Spawned local miner {}", index);
		LocalMiner {
			index,
			inner,
			handle: Some(handle),
		}
	}

	/// This miner's ordinal index within the pool.
	pub fn index(&self) -> usize {
		self.index
	}
}

impl Miner for LocalMiner {
	fn assign_work(&self, task: Option<SealingTask>) {
		{
			let mut slot = self.inner.task.lock();
			*slot = task;
		}
		*self.inner.sealed.lock() = None;
		self.inner.complete.store(false, AtomicOrdering::SeqCst);
		self.inner.generation.fetch_add(1, AtomicOrdering::SeqCst);
	}

	fn note_state_change(&self) {
		{
			let mut slot = self.inner.task.lock();
			*slot = None;
		}
		*self.inner.sealed.lock() = None;
		self.inner.complete.store(false, AtomicOrdering::SeqCst);
		self.inner.generation.fetch_add(1, AtomicOrdering::SeqCst);
	}

	fn is_complete(&self) -> bool {
		self.inner.complete.load(AtomicOrdering::SeqCst)
	}

	fn block_data(&self) -> Option<Bytes> {
		self.inner.sealed.lock().take()
	}

	fn mining_progress(&self) -> MiningProgress {
		*self.inner.progress.lock()
	}

	fn mining_history(&self) -> Vec<MiningProgress> {
		self.inner.history.lock().iter().copied().collect()
	}
}

impl Drop for LocalMiner {
	fn drop(&mut self) {
		self.inner.abort.store(true, AtomicOrdering::SeqCst);
		if let Some(handle) = self.handle.take() {
			let _ = handle.join();
		}
	}
}

fn grind(inner: Arc<MinerInner>) {
	loop {
		if inner.abort.load(AtomicOrdering::SeqCst) {
			return;
		}
		let generation = inner.generation.load(AtomicOrdering::SeqCst);
		let task = match (
			inner.task.lock().clone(),
			inner.complete.load(AtomicOrdering::SeqCst),
		) {
			(Some(task), false) => task,
			_ => {
				thread::sleep(Duration::from_millis(10));
				continue;
			}
		};

		let pow_hash = task.pow_hash();
		let difficulty = task.difficulty();
		let mut nonce: u64 = rand::random();
		let started = Instant::now();
		let mut last_sample = started;
		let mut hashes: u64 = 0;
		let mut sampled_hashes: u64 = 0;

		loop {
			if inner.abort.load(AtomicOrdering::SeqCst) {
				return;
			}
			if inner.generation.load(AtomicOrdering::SeqCst) != generation {
				break;
			}
			let mut found = None;
			for _ in 0..PROOF_BATCH {
				if pow::quick_verify(&pow_hash, nonce, &difficulty) {
					found = Some(nonce);
					break;
				}
				nonce = nonce.wrapping_add(1);
				hashes += 1;
			}
			*inner.progress.lock() = MiningProgress {
				hashes,
				ms: started.elapsed().as_millis() as u64,
			};
			if last_sample.elapsed() >= SAMPLE_PERIOD {
				let mut history = inner.history.lock();
				if history.len() == MAX_HISTORY {
					history.pop_front();
				}
				history.push_back(MiningProgress {
					hashes: hashes - sampled_hashes,
					ms: last_sample.elapsed().as_millis() as u64,
				});
				sampled_hashes = hashes;
				last_sample = Instant::now();
			}
			if let Some(winning) = found {
				let mut block = task.block.clone();
				block.header.nonce = winning;
				debug!(target: "miner", "Sealed block #{} with nonce {}", block.header.number, winning);
				*inner.sealed.lock() = Some(block.rlp_bytes());
				inner.complete.store(true, AtomicOrdering::SeqCst);
				break;
			}
		}
	}
}

#[derive(Default)]
struct RemoteInner {
	task: Mutex<Option<SealingTask>>,
	sealed: Mutex<Option<Bytes>>,
	complete: AtomicBool,
}

/// The miner behind the getWork/submitWork protocol. Proof search happens
/// elsewhere; this end hands out the task and validates returned proofs.
#[derive(Default)]
pub struct RemoteMiner {
	inner: RemoteInner,
}

impl RemoteMiner {
	/// Fresh remote miner with no work.
	pub fn new() -> RemoteMiner {
		RemoteMiner::default()
	}

	/// Replace the task if the sealing target moved.
	pub fn update(&self, task: SealingTask) {
		let mut slot = self.inner.task.lock();
		let changed = slot
			.as_ref()
			.map_or(true, |current| current.pow_hash() != task.pow_hash());
		if changed {
			trace!(target: "miner", "Remote work updated to {:?}", task.pow_hash());
			*slot = Some(task);
			*self.inner.sealed.lock() = None;
			self.inner.complete.store(false, AtomicOrdering::SeqCst);
		}
	}

	/// The current `(pow_hash, difficulty)` pair, if any work is out.
	pub fn work(&self) -> Option<(H256, U256)> {
		self.inner
			.task
			.lock()
			.as_ref()
			.map(|task| (task.pow_hash(), task.difficulty()))
	}

	/// Check a returned proof; on success the sealed block becomes
	/// collectable and the pool picks it up in the next work cycle.
	pub fn submit_proof(&self, nonce: u64) -> bool {
		let slot = self.inner.task.lock();
		let task = match slot.as_ref() {
			Some(task) => task,
			None => return false,
		};
		if !pow::quick_verify(&task.pow_hash(), nonce, &task.difficulty()) {
			debug!(target: "miner", "Rejected remote proof {} for {:?}", nonce, task.pow_hash());
			return false;
		}
		let mut block = task.block.clone();
		block.header.nonce = nonce;
		info!(target: "miner", "Accepted remote proof for block #{}", block.header.number);
		*self.inner.sealed.lock() = Some(block.rlp_bytes());
		self.inner.complete.store(true, AtomicOrdering::SeqCst);
		true
	}
}

impl Miner for RemoteMiner {
	fn assign_work(&self, task: Option<SealingTask>) {
		match task {
			Some(task) => self.update(task),
			None => {
				*self.inner.task.lock() = None;
				*self.inner.sealed.lock() = None;
				self.inner.complete.store(false, AtomicOrdering::SeqCst);
			}
		}
	}

	fn note_state_change(&self) {
		*self.inner.task.lock() = None;
		*self.inner.sealed.lock() = None;
		self.inner.complete.store(false, AtomicOrdering::SeqCst);
	}

	fn is_complete(&self) -> bool {
		self.inner.complete.load(AtomicOrdering::SeqCst)
	}

	fn block_data(&self) -> Option<Bytes> {
		self.inner.sealed.lock().take()
	}

	fn mining_progress(&self) -> MiningProgress {
		MiningProgress::default()
	}

	fn mining_history(&self) -> Vec<MiningProgress> {
		Vec::new()
	}
}

#[cfg(test)]
mod tests {
	use std::time::{Duration, Instant};
	use ethereum_types::U256;
	use crate::types::block::Block;
	use super::{combine_histories, LocalMiner, Miner, MiningProgress, RemoteMiner, SealingTask};

	fn unit_task(number: u64) -> SealingTask {
		let mut block = Block::default();
		block.header.number = number;
		block.header.difficulty = U256::one();
		block.header.timestamp = number;
		SealingTask { block }
	}

	fn wait_complete(miner: &dyn Miner) -> bool {
		let deadline = Instant::now() + Duration::from_secs(5);
		while Instant::now() < deadline {
			if miner.is_complete() {
				return true;
			}
			std::thread::sleep(Duration::from_millis(5));
		}
		false
	}

	#[test]
	fn local_miner_seals_unit_difficulty() {
		let miner = LocalMiner::spawn(0);
		miner.assign_work(Some(unit_task(1)));
		assert!(wait_complete(&miner));
		let bytes = miner.block_data().expect("complete implies sealed bytes");
		let block: Block = rlp::decode(&bytes).unwrap();
		assert_eq!(block.header.number, 1);
		assert!(crate::pow::verify_seal(&block.header).is_ok());
		// collected once.
		assert!(miner.block_data().is_none());
	}

	#[test]
	fn state_change_invalidates_work() {
		let miner = LocalMiner::spawn(0);
		miner.assign_work(Some(unit_task(1)));
		assert!(wait_complete(&miner));
		miner.note_state_change();
		assert!(!miner.is_complete());
		assert!(miner.block_data().is_none());
	}

	#[test]
	fn remote_miner_round_trip() {
		let remote = RemoteMiner::new();
		assert!(remote.work().is_none());
		assert!(!remote.submit_proof(0));

		let task = unit_task(1);
		let pow_hash = task.pow_hash();
		remote.update(task);
		let (hash, difficulty) = remote.work().unwrap();
		assert_eq!(hash, pow_hash);
		assert_eq!(difficulty, U256::one());

		assert!(remote.submit_proof(42));
		assert!(remote.is_complete());
		let block: Block = rlp::decode(&remote.block_data().unwrap()).unwrap();
		assert_eq!(block.header.nonce, 42);
	}

	#[test]
	fn remote_update_is_idempotent_for_same_target() {
		let remote = RemoteMiner::new();
		remote.update(unit_task(1));
		assert!(remote.submit_proof(7));
		// same target again must not clear the finished proof.
		remote.update(unit_task(1));
		assert!(remote.is_complete());
	}

	#[test]
	fn progress_combines_commutatively() {
		let a = MiningProgress { hashes: 10, ms: 100 };
		let b = MiningProgress { hashes: 5, ms: 120 };
		assert_eq!(a.combine(b), b.combine(a));
		assert_eq!(a.combine(b).hashes, 15);
	}

	#[test]
	fn histories_zip_combine() {
		let a = vec![
			MiningProgress { hashes: 1, ms: 10 },
			MiningProgress { hashes: 2, ms: 10 },
		];
		let b = vec![MiningProgress { hashes: 4, ms: 12 }];
		let combined = combine_histories(a, b);
		assert_eq!(combined.len(), 2);
		assert_eq!(combined[0].hashes, 5);
		assert_eq!(combined[1].hashes, 2);
	}
}
