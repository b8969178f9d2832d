// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use courier_storage::queries::tenants;
use courier_storage::Database;
use tempfile::TempDir;

/// A migrated database in a fresh temp directory. Keep the `TempDir` alive
/// for the duration of the test.
pub async fn test_database() -> (Database, TempDir) {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("courier-test.db");
    let db = Database::open(path.to_str().expect("utf-8 temp path"))
        .await
        .expect("open test database");
    (db, dir)
}

/// Create a tenant with an opening balance.
pub async fn seed_tenant(db: &Database, tenant_id: &str, credits: i64) {
    tenants::create_tenant(db, tenant_id, &format!("{tenant_id} test tenant"), credits)
        .await
        .expect("seed tenant");
}
