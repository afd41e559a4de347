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

//! Shared helpers for the crate's tests: in-memory databases, a test host
//! recording notifications, and block/transaction generators.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use ethereum_types::{Address, Bloom, H256, U256};
use kvdb::KeyValueDB;
use parity_bytes::Bytes;
use parking_lot::Mutex;

use crate::block_queue::BlockQueue;
use crate::blockchain::BlockChain;
use crate::client::ClientConfig;
use crate::host::{EthereumHost, Host, HostHandle};
use crate::pow;
use crate::spec::ChainSpec;
use crate::state::{self, StateDB};
use crate::transaction_queue::TransactionQueue;
use crate::types::block::Block;
use crate::types::header::Header;
use crate::types::receipt::receipts_root;
use crate::types::transaction::{Action, SignedTransaction, Transaction};
use crate::version::WithExisting;

/// A fresh in-memory backing database with the client's column layout.
pub fn new_db() -> Arc<dyn KeyValueDB> {
	Arc::new(kvdb_memorydb::create(crate::db::NUM_COLUMNS))
}

/// A test chain over a fresh database, with the genesis state committed.
pub fn new_chain_and_state() -> (BlockChain, StateDB) {
	let spec = Arc::new(ChainSpec::test());
	let db = new_db();
	let mut state_db = StateDB::new(db.clone());
	let genesis_root = spec.ensure_db_good(&mut state_db).unwrap();
	let chain = BlockChain::new(
		spec.clone(),
		spec.genesis_block(genesis_root),
		db,
		WithExisting::Trust,
	)
	.unwrap();
	(chain, state_db)
}

/// Client configuration pointed at `path`, with timing knobs tightened for
/// tests. Watch lifetime stays long so only the GC test ever collects.
pub fn test_config(path: &Path) -> ClientConfig {
	ClientConfig {
		db_path: path.to_path_buf(),
		author: Address::from_low_u64_be(0xaa),
		miners: Some(1),
		idle_back_off: Duration::from_millis(1),
		gc_period: Duration::from_millis(50),
		watch_lifetime: Duration::from_secs(60),
		..Default::default()
	}
}

/// A plain value transfer from the `sender`-th premined account.
pub fn transfer(sender: u64, nonce: u64) -> SignedTransaction {
	transfer_priced(sender, nonce, 0)
}

/// A value transfer at an explicit gas price.
pub fn transfer_priced(sender: u64, nonce: u64, gas_price: u64) -> SignedTransaction {
	Transaction {
		nonce: nonce.into(),
		gas_price: gas_price.into(),
		gas: 21_000.into(),
		action: Action::Call(Address::from_low_u64_be(0xff)),
		value: 100.into(),
		data: vec![],
	}
	.fake_sign(Address::from_low_u64_be(sender))
}

/// A log-producing call: the data becomes the log payload.
pub fn transfer_data(sender: u64, nonce: u64, data: Bytes) -> SignedTransaction {
	Transaction {
		nonce: nonce.into(),
		gas_price: U256::zero(),
		gas: 100_000.into(),
		action: Action::Call(Address::from_low_u64_be(0xff)),
		value: 1.into(),
		data,
	}
	.fake_sign(Address::from_low_u64_be(sender))
}

/// The header hash of an encoded block.
pub fn block_hash(bytes: &[u8]) -> H256 {
	rlp::decode::<Block>(bytes).unwrap().header.hash()
}

/// Build and seal a valid child of `parent` carrying `transactions`.
/// `seed` shifts the timestamp and author so sibling branches diverge.
pub fn build_block(
	chain: &BlockChain,
	state_db: &StateDB,
	parent: H256,
	transactions: Vec<SignedTransaction>,
	seed: u64,
) -> Bytes {
	let spec = chain.spec();
	let parent_header = chain
		.block_header(&parent)
		.expect("tests build on known parents");
	let timestamp = parent_header.timestamp + 1 + seed;
	let mut header = Header {
		parent_hash: parent,
		author: Address::from_low_u64_be(0xbeef + seed),
		state_root: H256::zero(),
		receipts_root: H256::zero(),
		log_bloom: Bloom::default(),
		difficulty: pow::child_difficulty(spec, &parent_header, timestamp),
		number: parent_header.number + 1,
		gas_limit: parent_header.gas_limit,
		gas_used: U256::zero(),
		timestamp,
		extra_data: Vec::new(),
		nonce: 0,
	};
	let block = Block {
		header: header.clone(),
		transactions,
	};
	let (state, receipts) = state::enact(
		state_db.boxed_clone(),
		spec,
		&parent_header,
		&block,
		vec![parent],
	)
	.expect("test blocks carry valid transactions");

	header.state_root = state.root();
	header.receipts_root = receipts_root(&receipts);
	header.log_bloom = receipts.iter().fold(Bloom::default(), |mut b, r| {
		b.accrue_bloom(&r.log_bloom);
		b
	});
	header.gas_used = receipts.last().map_or_else(U256::zero, |r| r.gas_used);

	let pow_hash = header.bare_hash();
	let mut nonce = 0u64;
	while !pow::quick_verify(&pow_hash, nonce, &header.difficulty) {
		nonce += 1;
	}
	header.nonce = nonce;
	Block {
		header,
		transactions: block.transactions,
	}
	.rlp_bytes()
}

/// Spin until `condition` holds or `timeout` passes.
pub fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut condition: F) -> bool {
	let deadline = Instant::now() + timeout;
	while Instant::now() < deadline {
		if condition() {
			return true;
		}
		std::thread::sleep(Duration::from_millis(5));
	}
	condition()
}

/// Host-side counters the tests assert against.
#[derive(Default)]
pub struct TestHostHandle {
	/// `note_new_blocks` invocations.
	pub new_blocks: AtomicUsize,
	/// `note_new_transactions` invocations.
	pub new_transactions: AtomicUsize,
	/// `reset` invocations.
	pub resets: AtomicUsize,
	/// Pretend a chain download is running.
	pub syncing: AtomicBool,
	/// Last network id set.
	pub network_id: Mutex<U256>,
}

impl HostHandle for TestHostHandle {
	fn set_network_id(&self, network_id: U256) {
		*self.network_id.lock() = network_id;
	}

	fn is_syncing(&self) -> bool {
		self.syncing.load(AtomicOrdering::SeqCst)
	}

	fn note_new_transactions(&self) {
		self.new_transactions.fetch_add(1, AtomicOrdering::SeqCst);
	}

	fn note_new_blocks(&self) {
		self.new_blocks.fetch_add(1, AtomicOrdering::SeqCst);
	}

	fn reset(&self) {
		self.resets.fetch_add(1, AtomicOrdering::SeqCst);
	}
}

/// A host that records what the client tells it.
#[derive(Default)]
pub struct TestHost {
	handle: Arc<TestHostHandle>,
	capability: Mutex<Option<Arc<EthereumHost>>>,
}

impl TestHost {
	/// Fresh host with zeroed counters.
	pub fn new() -> TestHost {
		TestHost::default()
	}

	/// The host-side counters.
	pub fn handle(&self) -> &TestHostHandle {
		&self.handle
	}

	/// The queues the client registered, as a peer would drive them.
	pub fn queues(&self) -> Option<(Arc<TransactionQueue>, Arc<BlockQueue>)> {
		self.capability
			.lock()
			.as_ref()
			.map(|c| (c.transaction_queue.clone(), c.block_queue.clone()))
	}
}

impl Host for TestHost {
	fn register_capability(&self, capability: Arc<EthereumHost>) -> Weak<dyn HostHandle> {
		*self.capability.lock() = Some(capability);
		Arc::downgrade(&self.handle) as Weak<dyn HostHandle>
	}
}
