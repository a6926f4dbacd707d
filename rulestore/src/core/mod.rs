//! Deterministic, pure logic shared by the repository.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! values (snapshots, ledgers, records) and return deterministic outputs
//! suitable for tests.

pub mod assembler;
pub mod format;
pub mod invariants;
pub mod ledger;
pub mod names;
pub mod types;
