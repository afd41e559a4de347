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

//! Blockchain database client. Owns the chain, the queues, the
//! pre-mine/post-mine state pair, the mining pool and the filter/watch
//! registry, and keeps them mutually consistent through a periodic work
//! cycle.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Instant;

use ethereum_types::{Address, H256, U256};
use kvdb::KeyValueDB;
use parity_bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use crate::block_queue::BlockQueue;
use crate::blockchain::BlockChain;
use crate::db;
use crate::error::Error;
use crate::executive::{EnvInfo, ExecutionResult, Executive, LastHashes};
use crate::gas_pricer::GasPricer;
use crate::host::{EthereumHost, Host, HostHandle};
use crate::miner::{combine_histories, LocalMiner, Miner, MiningProgress, RemoteMiner, SealingTask};
use crate::spec::ChainSpec;
use crate::state::{self, State, StateDB};
use crate::transaction_queue::{TransactionImportResult, TransactionQueue};
use crate::types::block::Block;
use crate::types::filter::{Filter, RelativeBlock};
use crate::types::header::{BlockNumber, Header};
use crate::types::ids::BlockId;
use crate::types::log_entry::LocalizedLogEntry;
use crate::types::receipt::Receipt;
use crate::types::transaction::{Action, Transaction};
use crate::version::{VersionChecker, WithExisting};

use super::config::ClientConfig;

/// Watches are handed out under monotonically assigned ids.
pub type WatchId = u64;

/// Reserved filter id delivering a sentinel entry whenever the pending
/// block changed.
pub fn pending_changed_filter() -> H256 {
	H256::from_low_u64_be(0)
}

/// Reserved filter id delivering a sentinel entry whenever the canonical
/// chain changed.
pub fn chain_changed_filter() -> H256 {
	H256::from_low_u64_be(1)
}

/// An installed filter with its accumulated, not yet drained, changes.
struct InstalledFilter {
	filter: Filter,
	changes: Vec<LocalizedLogEntry>,
}

/// A user-owned watch observing a filter id.
struct Watch {
	filter_id: H256,
	/// `None` pins the watch: it is never garbage collected.
	last_poll: Option<Instant>,
	changes: Vec<LocalizedLogEntry>,
}

#[derive(Default)]
struct FilterRegistry {
	filters: HashMap<H256, InstalledFilter>,
	watches: BTreeMap<WatchId, Watch>,
	next_watch_id: WatchId,
}

/// Everything guarded by the state lock: the overlay database and the
/// pre-mine/post-mine pair derived from it.
struct States {
	db: StateDB,
	pre_mine: State,
	post_mine: State,
}

/// Blockchain database client backed by a persistent database. Owns and
/// manages a blockchain, the pending queues and the mining pool.
///
/// Lock order, outermost first: `state` -> `local_miners` -> `remote_miner`
/// -> `filters_watches`. The chain and both queues are internally
/// synchronised leaves and may be used under any of the above.
pub struct Client {
	config: ClientConfig,
	spec: Arc<ChainSpec>,
	db: Arc<dyn KeyValueDB>,
	chain: Arc<BlockChain>,
	transaction_queue: Arc<TransactionQueue>,
	block_queue: Arc<BlockQueue>,
	gas_pricer: Mutex<GasPricer>,

	state: RwLock<States>,
	local_miners: RwLock<Vec<LocalMiner>>,
	remote_miner: Mutex<RemoteMiner>,
	filters_watches: Mutex<FilterRegistry>,

	host: Mutex<Option<Weak<dyn HostHandle>>>,
	// handed to the worker thread so it never keeps the client alive.
	weak_self: Weak<Client>,
	mining: AtomicBool,
	force_mining: AtomicBool,
	stop_worker: AtomicBool,
	worker: Mutex<Option<thread::JoinHandle<()>>>,
	last_gc: Mutex<Instant>,
}

impl Client {
	/// Create a new client over `db`, register its capability with the peer
	/// host, run one work cycle and start the worker.
	///
	/// Database and protocol version gating happens here: a mismatching
	/// status record (or a `force` action) wipes or re-verifies existing
	/// chain and state data before anything else runs.
	pub fn new(
		config: ClientConfig,
		spec: ChainSpec,
		gas_pricer: GasPricer,
		host: &dyn Host,
		db: Arc<dyn KeyValueDB>,
		force: WithExisting,
	) -> Result<Arc<Client>, Error> {
		let version_checker = VersionChecker::new(&config.db_path);
		let action = std::cmp::max(version_checker.action(), force);
		let spec = Arc::new(spec);

		if action == WithExisting::Kill {
			db::wipe_column(&*db, db::COL_STATE)?;
		}
		let mut state_db = StateDB::new(db.clone());
		let genesis_root = spec.ensure_db_good(&mut state_db)?;
		let chain = Arc::new(BlockChain::new(
			spec.clone(),
			spec.genesis_block(genesis_root),
			db.clone(),
			action,
		)?);

		let mut gas_pricer = gas_pricer;
		gas_pricer.update(&chain);

		let mut pre_mine = State::from_existing(
			state_db.boxed_clone(),
			chain.best_block_header().state_root,
			config.author,
			spec.account_start_nonce,
		)?;
		pre_mine.sync(&chain)?;
		let post_mine = pre_mine.clone();

		let transaction_queue = Arc::new(TransactionQueue::new());
		let block_queue = Arc::new(BlockQueue::new());

		let force_mining = config.force_mining;
		let miners = config.miners;
		let client = Arc::new_cyclic(|weak_self| Client {
			config,
			spec: spec.clone(),
			db,
			chain: chain.clone(),
			transaction_queue: transaction_queue.clone(),
			block_queue: block_queue.clone(),
			gas_pricer: Mutex::new(gas_pricer),
			state: RwLock::new(States {
				db: state_db,
				pre_mine,
				post_mine,
			}),
			local_miners: RwLock::new(Vec::new()),
			remote_miner: Mutex::new(RemoteMiner::new()),
			filters_watches: Mutex::new(FilterRegistry::default()),
			host: Mutex::new(None),
			weak_self: weak_self.clone(),
			mining: AtomicBool::new(false),
			force_mining: AtomicBool::new(force_mining),
			stop_worker: AtomicBool::new(false),
			worker: Mutex::new(None),
			last_gc: Mutex::new(Instant::now()),
		});

		let capability = Arc::new(EthereumHost::new(
			chain,
			transaction_queue,
			block_queue,
			spec.network_id,
		));
		*client.host.lock() = Some(host.register_capability(capability));

		client.set_mining_threads(miners.unwrap_or(0));
		if let Err(e) = version_checker.set_ok() {
			warn!(target: "client", "Failed to write status record: {}", e);
		}
		client.do_work();
		client.start_working();
		Ok(client)
	}

	// --- worker lifecycle -------------------------------------------------

	/// Start the worker thread if it is not already running.
	pub fn start_working(&self) {
		let mut worker = self.worker.lock();
		if worker.is_some() {
			return;
		}
		self.stop_worker.store(false, AtomicOrdering::SeqCst);
		let weak = self.weak_self.clone();
		let handle = thread::Builder::new()
			.name("eth".into())
			.spawn(move || loop {
				let client = match weak.upgrade() {
					Some(client) => client,
					None => break,
				};
				if client.stop_worker.load(AtomicOrdering::SeqCst) {
					break;
				}
				client.do_work();
			})
			.expect("spawning a named thread only fails on OOM; qed");
		*worker = Some(handle);
	}

	/// Stop the worker thread and wait for the cycle in flight to finish.
	pub fn stop_working(&self) {
		self.stop_worker.store(true, AtomicOrdering::SeqCst);
		let handle = self.worker.lock().take();
		if let Some(handle) = handle {
			if thread::current().id() != handle.thread().id() {
				let _ = handle.join();
			}
		}
	}

	/// Run one synchronous work cycle; used by embedders that just pushed a
	/// transaction and want it reflected immediately.
	pub fn flush_transactions(&self) {
		self.do_work();
	}

	// --- the work cycle ---------------------------------------------------

	/// One full cycle: harvest completed miners, drain the block queue into
	/// the chain, rebuild the state pair, replay the transaction queue,
	/// notify filters and watches, restart miners, collect garbage.
	fn do_work(&self) {
		let mut changeds: HashSet<H256> = HashSet::new();
		// chain-reorg log events are buffered here and only land on the
		// filters after Phase D has recorded its pending events: within one
		// cycle, pending events are delivered before chain events.
		let mut chain_events: Vec<(H256, LocalizedLogEntry)> = Vec::new();
		let mut imported_any = false;
		let mut resync_needed = false;

		// Phase A: harvest completed miners. Sealed bytes are collected
		// under the miner locks and imported afterwards under the state
		// lock, keeping the acquisition order outer-to-inner.
		let mut sealed: Vec<Bytes> = Vec::new();
		{
			let miners = self.local_miners.read();
			for miner in miners.iter() {
				if miner.is_complete() {
					if let Some(bytes) = miner.block_data() {
						sealed.push(bytes);
					}
				}
			}
		}
		{
			let remote = self.remote_miner.lock();
			if remote.is_complete() {
				if let Some(bytes) = remote.block_data() {
					sealed.push(bytes);
				}
			}
		}
		let had_miner_work = !sealed.is_empty();
		for bytes in &sealed {
			let state = self.state.write();
			match self.chain.attempt_import(bytes, &state.db) {
				Ok((imported, head)) => {
					if !imported.is_empty() {
						for hash in &imported {
							if *hash != head {
								self.append_from_new_block(*hash, &mut changeds, &mut chain_events);
							}
						}
						changeds.insert(chain_changed_filter());
						imported_any = true;
					}
				}
				Err(e) => debug!(target: "miner", "Mined block rejected: {}", e),
			}
			drop(state);
		}
		if imported_any {
			let miners = self.local_miners.read();
			for miner in miners.iter() {
				miner.note_state_change();
			}
		}

		// Phase B: drain the block queue into the chain. The long sync runs
		// against a detached overlay clone with the state lock released; the
		// worker is the only state writer, and Phase C re-verifies the head
		// on re-entry.
		let detached = self.state.read().db.boxed_clone();
		let (fresh, dead, still_got_work) =
			self.chain
				.sync(&self.block_queue, &detached, self.config.max_round_blocks);

		for hash in &dead {
			debug!(target: "client", "Dead block: {:?}", hash);
			for transaction in self.chain.transactions(hash) {
				trace!(target: "client", "Resubmitting transaction {:?}", transaction.hash());
				self.transaction_queue.import(transaction);
			}
		}
		for hash in &fresh {
			trace!(target: "client", "Live block: {:?}", hash);
			for transaction_hash in self.chain.transaction_hashes(hash) {
				self.transaction_queue.remove(&transaction_hash);
			}
		}

		{
			let mut state = self.state.write();
			if !fresh.is_empty() {
				for hash in &fresh {
					self.append_from_new_block(*hash, &mut changeds, &mut chain_events);
				}
				changeds.insert(chain_changed_filter());
				imported_any = true;
			}

			// Phase C: reseat the canonical-head state; if it moved (or the
			// author changed under us) the speculative state restarts from
			// it.
			let authors_differ = state.post_mine.author() != state.pre_mine.author();
			match state.pre_mine.sync(&self.chain) {
				Ok(head_moved) => {
					if head_moved || authors_differ {
						if self.is_mining() {
							debug!(target: "miner", "New block on chain: restarting mining operation");
						}
						state.post_mine = state.pre_mine.clone();
						changeds.insert(pending_changed_filter());
						resync_needed = true;
					}
				}
				Err(e) => warn!(target: "client", "Head state unavailable: {}", e),
			}

			// Phase D: replay the transaction queue onto the speculative
			// state.
			let minimal_gas_price = self.gas_pricer.lock().ask();
			let already_pending = state.post_mine.pending().len();
			let new_receipts = state.post_mine.sync_queue(
				&self.chain,
				&self.transaction_queue,
				minimal_gas_price,
			);
			if !new_receipts.is_empty() {
				for (i, receipt) in new_receipts.iter().enumerate() {
					let transaction_hash = state.post_mine.pending()[already_pending + i].hash();
					self.append_from_new_pending(receipt, &mut changeds, transaction_hash);
				}
				changeds.insert(pending_changed_filter());
				if self.is_mining() {
					debug!(target: "miner", "Additional transaction ready: restarting mining operation");
				}
				resync_needed = true;
				self.with_host(|host| host.note_new_transactions());
			}
		}

		// Phase E: notify. The buffered chain events land behind whatever
		// Phase D recorded, then everything drains into the watches.
		if !chain_events.is_empty() {
			let mut registry = self.filters_watches.lock();
			for (id, entry) in chain_events {
				if let Some(installed) = registry.filters.get_mut(&id) {
					installed.changes.push(entry);
				}
			}
		}
		if !changeds.is_empty() {
			self.with_host(|host| host.note_new_blocks());
		}
		if resync_needed {
			self.restart_miners();
		}
		self.note_changed(&changeds);

		// Phase F: back off when idle, then periodic garbage collection.
		if !still_got_work && !imported_any && !had_miner_work {
			thread::sleep(self.config.idle_back_off);
		}
		let gc_due = {
			let mut last_gc = self.last_gc.lock();
			if last_gc.elapsed() >= self.config.gc_period {
				*last_gc = Instant::now();
				true
			} else {
				false
			}
		};
		if gc_due {
			let stale: Vec<WatchId> = {
				let registry = self.filters_watches.lock();
				registry
					.watches
					.iter()
					.filter(|(_, watch)| {
						watch
							.last_poll
							.map_or(false, |last| last.elapsed() > self.config.watch_lifetime)
					})
					.map(|(id, _)| *id)
					.collect()
			};
			for id in stale {
				info!(target: "client", "GC: uninstalling stale watch {}", id);
				self.uninstall_watch(id);
			}
			self.chain.collect_garbage();
		}
	}

	// --- filters and watches ----------------------------------------------

	/// Record matching logs of a new pending receipt on every enveloping
	/// filter.
	fn append_from_new_pending(
		&self,
		receipt: &Receipt,
		changed: &mut HashSet<H256>,
		transaction_hash: H256,
	) {
		let head = self.chain.best_block_number();
		let mut registry = self.filters_watches.lock();
		for (id, installed) in registry.filters.iter_mut() {
			if installed
				.filter
				.envelops(RelativeBlock::Pending, head + 1, head)
			{
				let matched = installed.filter.matches(receipt);
				if !matched.is_empty() {
					for log in matched {
						installed.changes.push(LocalizedLogEntry {
							entry: log,
							block_number: head + 1,
							transaction_hash,
						});
					}
					changed.insert(*id);
				}
			}
		}
	}

	/// Match a newly canonical block against every enveloping filter whose
	/// bloom test passes. The localised logs go into `events` rather than
	/// straight onto the filters: pending events recorded later in the same
	/// cycle must precede them when the watches are served.
	fn append_from_new_block(
		&self,
		hash: H256,
		changed: &mut HashSet<H256>,
		events: &mut Vec<(H256, LocalizedLogEntry)>,
	) {
		let header = match self.chain.block_header(&hash) {
			Some(header) => header,
			None => return,
		};
		let receipts = self.chain.receipts(&hash);
		let transaction_hashes = self.chain.transaction_hashes(&hash);
		let head = self.chain.best_block_number();

		let registry = self.filters_watches.lock();
		for (id, installed) in registry.filters.iter() {
			if installed
				.filter
				.envelops(RelativeBlock::Latest, header.number, head)
				&& installed.filter.matches_bloom(&header.log_bloom)
			{
				for (index, receipt) in receipts.iter().enumerate() {
					let matched = installed.filter.matches(receipt);
					if !matched.is_empty() {
						let transaction_hash =
							transaction_hashes.get(index).copied().unwrap_or_default();
						for log in matched {
							events.push((
								*id,
								LocalizedLogEntry {
									entry: log,
									block_number: header.number,
									transaction_hash,
								},
							));
						}
						changed.insert(*id);
					}
				}
			}
		}
	}

	/// Drain accumulated filter changes into the watches observing them.
	/// Watches keep their changes until polled; filters are cleared here.
	fn note_changed(&self, changed: &HashSet<H256>) {
		let mut registry = self.filters_watches.lock();
		if !changed.is_empty() {
			trace!(target: "client", "note_changed: {} filters touched", changed.len());
		}
		let FilterRegistry {
			filters, watches, ..
		} = &mut *registry;
		for (id, watch) in watches.iter_mut() {
			if changed.contains(&watch.filter_id) {
				match filters.get(&watch.filter_id) {
					Some(installed) => {
						trace!(target: "client", "Watch {} accrues {} changes", id, installed.changes.len());
						watch.changes.extend(installed.changes.iter().cloned());
					}
					// pseudo-filter: a single marker entry.
					None => watch.changes.push(LocalizedLogEntry::sentinel()),
				}
			}
		}
		for installed in filters.values_mut() {
			installed.changes.clear();
		}
	}

	/// Install a filter; the id is the content hash of the predicate.
	pub fn install_filter(&self, filter: Filter) -> H256 {
		let id = filter.content_hash();
		let mut registry = self.filters_watches.lock();
		registry.filters.entry(id).or_insert_with(|| InstalledFilter {
			filter,
			changes: Vec::new(),
		});
		id
	}

	/// Install a watch on the given filter id; also accepts the reserved
	/// pseudo-filter ids.
	pub fn install_watch_raw(&self, filter_id: H256) -> WatchId {
		let mut registry = self.filters_watches.lock();
		let id = registry.next_watch_id;
		registry.next_watch_id += 1;
		registry.watches.insert(
			id,
			Watch {
				filter_id,
				last_poll: Some(Instant::now()),
				changes: Vec::new(),
			},
		);
		id
	}

	/// Install a filter and a watch observing it in one step.
	pub fn install_watch(&self, filter: Filter) -> WatchId {
		let filter_id = self.install_filter(filter);
		self.install_watch_raw(filter_id)
	}

	/// Remove a watch; the backing filter goes with it once unreferenced.
	pub fn uninstall_watch(&self, id: WatchId) -> bool {
		let mut registry = self.filters_watches.lock();
		let watch = match registry.watches.remove(&id) {
			Some(watch) => watch,
			None => return false,
		};
		let still_referenced = registry
			.watches
			.values()
			.any(|other| other.filter_id == watch.filter_id);
		if !still_referenced {
			registry.filters.remove(&watch.filter_id);
		}
		true
	}

	/// Poll a watch, draining its accumulated changes.
	pub fn check_watch(&self, id: WatchId) -> Option<Vec<LocalizedLogEntry>> {
		let mut registry = self.filters_watches.lock();
		let watch = registry.watches.get_mut(&id)?;
		watch.last_poll = Some(Instant::now());
		Some(std::mem::take(&mut watch.changes))
	}

	/// Look at a watch's accumulated changes without draining them.
	pub fn peek_watch(&self, id: WatchId) -> Option<Vec<LocalizedLogEntry>> {
		let mut registry = self.filters_watches.lock();
		let watch = registry.watches.get_mut(&id)?;
		watch.last_poll = Some(Instant::now());
		Some(watch.changes.clone())
	}

	/// Historical log query: walk the filter's block range over the
	/// canonical chain.
	pub fn logs(&self, filter: &Filter) -> Vec<LocalizedLogEntry> {
		let head = self.chain.best_block_number();
		let resolve = |id: &BlockId| -> Option<BlockNumber> {
			match id {
				BlockId::Earliest => Some(0),
				BlockId::Number(n) => Some(*n),
				BlockId::Latest => Some(head),
				BlockId::Hash(h) => self.chain.block_header(h).map(|header| header.number),
			}
		};
		let from = match resolve(&filter.from_block) {
			Some(n) => n,
			None => return Vec::new(),
		};
		let to = match resolve(&filter.to_block) {
			Some(n) => std::cmp::min(n, head),
			None => return Vec::new(),
		};

		let mut out = Vec::new();
		let mut number = from;
		while number <= to {
			if let Some(hash) = self.chain.block_hash(number) {
				if let Some(header) = self.chain.block_header(&hash) {
					if filter.matches_bloom(&header.log_bloom) {
						let transaction_hashes = self.chain.transaction_hashes(&hash);
						for (index, receipt) in self.chain.receipts(&hash).iter().enumerate() {
							for log in filter.matches(receipt) {
								out.push(LocalizedLogEntry {
									entry: log,
									block_number: number,
									transaction_hash: transaction_hashes
										.get(index)
										.copied()
										.unwrap_or_default(),
								});
							}
						}
					}
				}
			}
			number += 1;
		}
		out
	}

	// --- mining -----------------------------------------------------------

	/// Resize the pool of local miners. Zero threads means hardware
	/// parallelism; an enabled accelerated backend with turbo mining on
	/// forces a single local miner.
	pub fn set_mining_threads(&self, threads: usize) {
		let count = if self.config.accelerated && self.config.turbo_mining {
			1
		} else if threads == 0 {
			thread::available_parallelism().map_or(1, |n| n.get())
		} else {
			threads
		};
		{
			let mut miners = self.local_miners.write();
			miners.clear();
			for index in 0..count {
				miners.push(LocalMiner::spawn(index));
			}
		}
		debug!(target: "miner", "Mining pool resized to {} local miners", count);
		if self.is_mining() {
			self.restart_miners();
		}
	}

	/// Begin sealing on top of the speculative state.
	pub fn start_mining(&self) {
		self.mining.store(true, AtomicOrdering::SeqCst);
		self.restart_miners();
	}

	/// Stop sealing; grinder threads idle but stay alive.
	pub fn stop_mining(&self) {
		self.mining.store(false, AtomicOrdering::SeqCst);
		let miners = self.local_miners.read();
		for miner in miners.iter() {
			miner.assign_work(None);
		}
	}

	/// Whether local sealing is active.
	pub fn is_mining(&self) -> bool {
		self.mining.load(AtomicOrdering::SeqCst) && !self.local_miners.read().is_empty()
	}

	/// Mine even without pending transactions.
	pub fn set_force_mining(&self, force: bool) {
		self.force_mining.store(force, AtomicOrdering::SeqCst);
		self.restart_miners();
	}

	fn prepare_sealing_task(&self, require_work: bool) -> Option<SealingTask> {
		let mut candidate = {
			let state = self.state.read();
			state.post_mine.clone()
		};
		if require_work
			&& candidate.pending().is_empty()
			&& !self.force_mining.load(AtomicOrdering::SeqCst)
		{
			return None;
		}
		let closed = candidate.commit_to_mine(&self.chain);
		trace!(target: "miner", "Prepared sealing task for block #{} ({} transactions)", closed.block.header.number, closed.block.transactions.len());
		Some(SealingTask {
			block: closed.block,
		})
	}

	/// Invalidate all local work and hand out a task derived from the
	/// current speculative state.
	fn restart_miners(&self) {
		if !self.is_mining() {
			return;
		}
		let task = self.prepare_sealing_task(true);
		let miners = self.local_miners.read();
		for miner in miners.iter() {
			miner.note_state_change();
			miner.assign_work(task.clone());
		}
	}

	/// The remote-miner protocol: current `(pow_hash, difficulty)`. The
	/// state snapshot is taken before the remote lock per the lock order.
	pub fn get_work(&self) -> Option<(H256, U256)> {
		let task = self.prepare_sealing_task(false);
		let remote = self.remote_miner.lock();
		if let Some(task) = task {
			remote.update(task);
		}
		remote.work()
	}

	/// The remote-miner protocol: accept a proof for the work handed out.
	/// The sealed block is imported by the next work cycle.
	pub fn submit_work(&self, nonce: u64) -> bool {
		self.remote_miner.lock().submit_proof(nonce)
	}

	/// Aggregate progress across the pool.
	pub fn mining_progress(&self) -> MiningProgress {
		let miners = self.local_miners.read();
		miners
			.iter()
			.fold(MiningProgress::default(), |acc, miner| {
				acc.combine(miner.mining_progress())
			})
	}

	/// Per-time-step progress samples zip-combined across the pool.
	pub fn mining_history(&self) -> Vec<MiningProgress> {
		let miners = self.local_miners.read();
		miners.iter().fold(Vec::new(), |acc, miner| {
			combine_histories(acc, miner.mining_history())
		})
	}

	/// Pool-wide hashes per second.
	pub fn hashrate(&self) -> u64 {
		let miners = self.local_miners.read();
		miners.iter().map(|miner| miner.mining_progress().rate()).sum()
	}

	// --- public chain / state API -----------------------------------------

	/// Push a raw transaction into the queue, waking the worker.
	pub fn inject(&self, rlp: &[u8]) -> Result<TransactionImportResult, Error> {
		self.start_working();
		self.transaction_queue.import_rlp(rlp)
	}

	/// Queue a candidate block as if a peer had delivered it.
	pub fn import_block(&self, bytes: Bytes) -> Result<H256, Error> {
		self.block_queue.import(bytes)
	}

	/// Speculative execution against the post-mine state. The sender is
	/// synthetically credited with the full allowance, nothing is
	/// committed, and failures are captured in the result.
	pub fn call(
		&self,
		dest: Address,
		data: Bytes,
		gas: U256,
		value: U256,
		gas_price: U256,
		from: Address,
	) -> ExecutionResult {
		let mut temp = {
			let state = self.state.read();
			state.post_mine.clone()
		};
		temp.add_balance(&from, value.saturating_add(gas_price.saturating_mul(gas)));
		let transaction = Transaction {
			nonce: temp.nonce(&from),
			gas_price,
			gas,
			action: Action::Call(dest),
			value,
			data,
		}
		.fake_sign(from);
		let env = EnvInfo {
			number: self.chain.best_block_number() + 1,
			author: temp.author(),
			timestamp: self.chain.best_block_header().timestamp + 1,
			difficulty: U256::zero(),
			gas_limit: U256::max_value(),
			last_hashes: Arc::new(LastHashes::new()),
		};
		match Executive::new(&mut temp, &env).transact(&transaction, true) {
			Ok(executed) => ExecutionResult {
				gas_used: executed.gas_used,
				output: executed.output,
				logs: executed.logs,
				excepted: None,
			},
			Err(e) => {
				trace!(target: "client", "Speculative call failed: {}", e);
				ExecutionResult {
					excepted: Some(e),
					..Default::default()
				}
			}
		}
	}

	/// Drop all pending transactions and reset the speculative state to the
	/// canonical head.
	pub fn clear_pending(&self) {
		let mut changed = HashSet::new();
		{
			let mut state = self.state.write();
			if state.post_mine.pending().is_empty() {
				return;
			}
			changed.insert(pending_changed_filter());
			self.transaction_queue.clear();
			state.post_mine = state.pre_mine.clone();
		}
		{
			let miners = self.local_miners.read();
			for miner in miners.iter() {
				miner.note_state_change();
			}
		}
		self.restart_miners();
		self.note_changed(&changed);
	}

	/// Wipe the chain and state and restart from genesis, leaving the
	/// system as a fresh construction over an empty database.
	pub fn kill_chain(&self) -> Result<(), Error> {
		info!(target: "client", "Killing chain and state");
		let was_mining = self.is_mining();
		if was_mining {
			self.stop_mining();
		}
		self.stop_working();

		self.transaction_queue.clear();
		self.block_queue.clear();
		self.local_miners.write().clear();
		self.remote_miner.lock().note_state_change();

		{
			let mut state = self.state.write();
			db::wipe_column(&*self.db, db::COL_STATE)?;
			let mut state_db = StateDB::new(self.db.clone());
			let genesis_root = self.spec.ensure_db_good(&mut state_db)?;
			self.chain.reopen(WithExisting::Kill)?;
			let author = state.pre_mine.author();
			let mut pre_mine = State::from_existing(
				state_db.boxed_clone(),
				genesis_root,
				author,
				self.spec.account_start_nonce,
			)?;
			pre_mine.sync(&self.chain)?;
			state.post_mine = pre_mine.clone();
			state.pre_mine = pre_mine;
			state.db = state_db;
		}

		self.with_host(|host| host.reset());
		self.do_work();
		self.set_mining_threads(0);
		self.start_working();
		if was_mining {
			self.start_mining();
		}
		Ok(())
	}

	/// The canonical head header.
	pub fn best_block_header(&self) -> Header {
		self.chain.best_block_header()
	}

	/// The canonical head number.
	pub fn best_block_number(&self) -> BlockNumber {
		self.chain.best_block_number()
	}

	/// Raw block bytes for any block id.
	pub fn block(&self, id: BlockId) -> Option<Bytes> {
		self.block_hash_of(id).and_then(|hash| self.chain.block(&hash))
	}

	/// Decoded header for any block id.
	pub fn block_header(&self, id: BlockId) -> Option<Header> {
		self.block_hash_of(id)
			.and_then(|hash| self.chain.block_header(&hash))
	}

	fn block_hash_of(&self, id: BlockId) -> Option<H256> {
		match id {
			BlockId::Hash(hash) => Some(hash),
			BlockId::Number(number) => self.chain.block_hash(number),
			BlockId::Earliest => self.chain.block_hash(0),
			BlockId::Latest => Some(self.chain.best_block_hash()),
		}
	}

	/// The transactions waiting in the speculative state.
	pub fn pending_transactions(&self) -> Vec<crate::types::transaction::SignedTransaction> {
		self.state.read().post_mine.pending().to_vec()
	}

	/// The state as of the given block.
	pub fn state_at(&self, id: BlockId) -> Option<State> {
		let header = self.block_header(id)?;
		let state = self.state.read();
		State::from_existing(
			state.db.boxed_clone(),
			header.state_root,
			state.pre_mine.author(),
			self.spec.account_start_nonce,
		)
		.ok()
	}

	/// Synonym of `state_at`, matching the historical-query taxonomy.
	pub fn as_of(&self, id: BlockId) -> Option<State> {
		self.state_at(id)
	}

	/// The speculative state just before its `i`-th pending transaction.
	pub fn state_at_pending(&self, i: usize) -> Option<State> {
		self.state.read().post_mine.from_pending(i).ok()
	}

	/// The state just before the `i`-th transaction of the given block.
	pub fn state_at_index(&self, i: usize, id: BlockId) -> Option<State> {
		let raw = self.block(id)?;
		let block: Block = rlp::decode(&raw).ok()?;
		let parent = self.chain.block_header(&block.header.parent_hash)?;
		let db = self.state.read().db.boxed_clone();
		state::enact_prefix(db, &self.spec, &parent, &block, i, self.chain.last_hashes()).ok()
	}

	/// The recommended minimal gas price.
	pub fn gas_price(&self) -> U256 {
		self.gas_pricer.lock().ask()
	}

	// --- host plumbing ----------------------------------------------------

	fn with_host<T, F>(&self, f: F) -> T
	where
		T: Default,
		F: FnOnce(&dyn HostHandle) -> T,
	{
		let host = self.host.lock();
		match host.as_ref().and_then(Weak::upgrade) {
			Some(handle) => f(&*handle),
			// the host predeceased us; everything degrades to a no-op.
			None => T::default(),
		}
	}

	/// Change the network id announced to peers.
	pub fn set_network_id(&self, network_id: U256) {
		self.with_host(|host| host.set_network_id(network_id));
	}

	/// Whether the host is still downloading the chain.
	pub fn is_syncing(&self) -> bool {
		self.with_host(|host| host.is_syncing())
	}

	/// Change the mining beneficiary; the speculative state follows in the
	/// next cycle.
	pub fn set_author(&self, author: Address) {
		self.state.write().pre_mine.set_author(author);
	}

	/// The current mining beneficiary.
	pub fn author(&self) -> Address {
		self.state.read().pre_mine.author()
	}

	// --- test accessors ---------------------------------------------------

	#[cfg(test)]
	pub fn chain(&self) -> Arc<BlockChain> {
		self.chain.clone()
	}

	#[cfg(test)]
	pub fn transaction_queue(&self) -> Arc<TransactionQueue> {
		self.transaction_queue.clone()
	}

	#[cfg(test)]
	pub fn state_roots(&self) -> (H256, H256) {
		let state = self.state.read();
		(state.pre_mine.root(), state.post_mine.root())
	}

	#[cfg(test)]
	pub fn watch_count(&self) -> usize {
		self.filters_watches.lock().watches.len()
	}
}

impl Drop for Client {
	fn drop(&mut self) {
		self.stop_worker.store(true, AtomicOrdering::SeqCst);
		// local miners join their grinder threads on drop; the worker holds
		// only a weak reference and unwinds on its next upgrade.
	}
}
