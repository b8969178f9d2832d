// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider session lifecycle: one connection handle per tenant, a
//! background event pump per handle, and crash recovery on startup.

pub mod registry;

pub use registry::{ConnectOutcome, SessionRegistry};
