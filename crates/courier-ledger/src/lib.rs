// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit ledger for metering tenant usage against a prepaid balance.
//!
//! The ledger is the only component that mutates a tenant's balance. Every
//! balance change appends an entry to the append-only transaction log in the
//! same storage transaction, so the live counter always equals the sum of
//! entries. Overdraws are rejected, never clamped.

pub mod ledger;

pub use ledger::{CreditLedger, LedgerPage};
