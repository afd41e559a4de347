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

//! Database column layout shared by the state DB and the block chain.

use kvdb::{DBTransaction, KeyValueDB};

/// Column for state nodes.
pub const COL_STATE: u32 = 0;
/// Column for block bodies keyed by header hash.
pub const COL_BLOCKS: u32 = 1;
/// Column for block receipts keyed by header hash.
pub const COL_RECEIPTS: u32 = 2;
/// Column for extras: block details, the canonical number index and the
/// best-block pointer.
pub const COL_EXTRA: u32 = 3;
/// Number of columns the client expects the backend to have been opened with.
pub const NUM_COLUMNS: u32 = 4;

/// Remove every key of the given column.
pub fn wipe_column(db: &dyn KeyValueDB, col: u32) -> std::io::Result<()> {
	let mut batch = DBTransaction::new();
	batch.delete_prefix(col, &[]);
	db.write(batch)
}
