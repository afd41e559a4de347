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

//! Gate on the persisted database/protocol versions.
//!
//! A small status record next to the database remembers which versions
//! wrote it; on startup the gate decides whether existing data can be
//! trusted, must be re-verified, or has to go.

use std::path::{Path, PathBuf};

use rlp::{Rlp, RlpStream};

use crate::error::Error;

/// The wire protocol version this build speaks.
pub const PROTOCOL_VERSION: u64 = 63;
/// Minor protocol revision; mismatches only require re-verification.
pub const MINOR_PROTOCOL_VERSION: u64 = 2;
/// Layout version of the on-disk database.
pub const DATABASE_VERSION: u64 = 12;

/// What to do with existing on-disk data. Ordered by severity so a forced
/// action can be combined with the gate's own verdict via `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WithExisting {
	/// Data was written by this version; use as-is.
	Trust,
	/// Minor revision changed; rescan and revalidate.
	Verify,
	/// Incompatible; wipe chain and state.
	Kill,
}

/// Compares the persisted status record against the build's constants.
/// Construction never fails: an absent or malformed record simply demands
/// `Kill`.
pub struct VersionChecker {
	path: PathBuf,
	action: WithExisting,
}

impl VersionChecker {
	/// Read `<db_path>/status` and decide what to do with existing data.
	pub fn new(db_path: &Path) -> VersionChecker {
		let action = match read_status(&db_path.join("status")) {
			Some((protocol, minor, database)) => {
				if protocol != PROTOCOL_VERSION || database != DATABASE_VERSION {
					info!(target: "client", "Protocol/database version mismatch (got {}/{}, want {}/{}); existing data will be wiped", protocol, database, PROTOCOL_VERSION, DATABASE_VERSION);
					WithExisting::Kill
				} else if minor != MINOR_PROTOCOL_VERSION {
					info!(target: "client", "Minor protocol version changed ({} -> {}); existing data will be re-verified", minor, MINOR_PROTOCOL_VERSION);
					WithExisting::Verify
				} else {
					WithExisting::Trust
				}
			}
			None => WithExisting::Kill,
		};
		VersionChecker {
			path: db_path.to_path_buf(),
			action,
		}
	}

	/// The action existing data requires.
	pub fn action(&self) -> WithExisting {
		self.action
	}

	/// Accept the database as it now stands, rewriting the status record
	/// with this build's versions. The record is advisory; failures here
	/// are worth a warning but nothing more.
	pub fn set_ok(&self) -> Result<(), Error> {
		if self.action == WithExisting::Trust {
			return Ok(());
		}
		std::fs::create_dir_all(&self.path)?;
		let mut s = RlpStream::new_list(3);
		s.append(&PROTOCOL_VERSION);
		s.append(&MINOR_PROTOCOL_VERSION);
		s.append(&DATABASE_VERSION);
		std::fs::write(self.path.join("status"), s.out())?;
		Ok(())
	}
}

fn read_status(path: &Path) -> Option<(u64, u64, u64)> {
	let bytes = std::fs::read(path).ok()?;
	let rlp = Rlp::new(&bytes);
	let protocol = rlp.val_at(0).ok()?;
	let minor = rlp.val_at(1).ok()?;
	let database = rlp.val_at(2).ok()?;
	Some((protocol, minor, database))
}

/// Write an arbitrary status record; used by tests to simulate other
/// builds.
#[cfg(test)]
pub fn write_status(db_path: &Path, protocol: u64, minor: u64, database: u64) {
	std::fs::create_dir_all(db_path).unwrap();
	let mut s = RlpStream::new_list(3);
	s.append(&protocol);
	s.append(&minor);
	s.append(&database);
	std::fs::write(db_path.join("status"), s.out()).unwrap();
}

#[cfg(test)]
mod tests {
	use tempdir::TempDir;
	use super::*;

	#[test]
	fn missing_record_demands_kill() {
		let dir = TempDir::new("status").unwrap();
		assert_eq!(VersionChecker::new(dir.path()).action(), WithExisting::Kill);
	}

	#[test]
	fn malformed_record_demands_kill() {
		let dir = TempDir::new("status").unwrap();
		std::fs::write(dir.path().join("status"), b"junk").unwrap();
		assert_eq!(VersionChecker::new(dir.path()).action(), WithExisting::Kill);
	}

	#[test]
	fn matching_record_is_trusted() {
		let dir = TempDir::new("status").unwrap();
		write_status(dir.path(), PROTOCOL_VERSION, MINOR_PROTOCOL_VERSION, DATABASE_VERSION);
		assert_eq!(VersionChecker::new(dir.path()).action(), WithExisting::Trust);
	}

	#[test]
	fn minor_mismatch_demands_verify() {
		let dir = TempDir::new("status").unwrap();
		write_status(dir.path(), PROTOCOL_VERSION, MINOR_PROTOCOL_VERSION + 1, DATABASE_VERSION);
		assert_eq!(VersionChecker::new(dir.path()).action(), WithExisting::Verify);
	}

	#[test]
	fn database_mismatch_demands_kill() {
		let dir = TempDir::new("status").unwrap();
		write_status(dir.path(), PROTOCOL_VERSION, MINOR_PROTOCOL_VERSION, DATABASE_VERSION + 1);
		assert_eq!(VersionChecker::new(dir.path()).action(), WithExisting::Kill);
	}

	#[test]
	fn set_ok_rewrites_the_record() {
		let dir = TempDir::new("status").unwrap();
		let checker = VersionChecker::new(dir.path());
		assert_eq!(checker.action(), WithExisting::Kill);
		checker.set_ok().unwrap();
		assert_eq!(VersionChecker::new(dir.path()).action(), WithExisting::Trust);
	}

	#[test]
	fn forced_action_combines_by_severity() {
		assert_eq!(
			std::cmp::max(WithExisting::Trust, WithExisting::Verify),
			WithExisting::Verify
		);
		assert_eq!(
			std::cmp::max(WithExisting::Verify, WithExisting::Kill),
			WithExisting::Kill
		);
	}
}
