//! Numbered, forward-only schema migrations.
//!
//! Every entry carries separate SQL for each supported backend, per §4.1:
//! "Schema is created or migrated on startup by an ordered list of
//! numbered migrations, each with forward SQL for each supported
//! backend." IDs, timestamps, booleans and JSON payloads are all stored
//! as `TEXT` in both backends deliberately — see DESIGN.md — so the row
//! decoding code in `sqlite.rs`/`postgres.rs` never has to special-case
//! a column's wire type per backend.

pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub sqlite: &'static str,
    pub postgres: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_pools",
        sqlite: r"
            CREATE TABLE IF NOT EXISTS pools (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL,
                target_state_id TEXT,
                sync_policy TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        ",
        postgres: r"
            CREATE TABLE IF NOT EXISTS pools (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL,
                target_state_id TEXT,
                sync_policy TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        ",
    },
    Migration {
        version: 2,
        name: "create_endpoints",
        sqlite: r"
            CREATE TABLE IF NOT EXISTS endpoints (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                hostname TEXT NOT NULL,
                pool_id TEXT REFERENCES pools(id),
                last_seen TEXT NOT NULL,
                sync_status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(name, hostname)
            );
            CREATE INDEX IF NOT EXISTS idx_endpoints_pool_id ON endpoints(pool_id);
        ",
        postgres: r"
            CREATE TABLE IF NOT EXISTS endpoints (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                hostname TEXT NOT NULL,
                pool_id TEXT REFERENCES pools(id),
                last_seen TEXT NOT NULL,
                sync_status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(name, hostname)
            );
            CREATE INDEX IF NOT EXISTS idx_endpoints_pool_id ON endpoints(pool_id);
        ",
    },
    Migration {
        version: 3,
        name: "create_package_states",
        sqlite: r"
            CREATE TABLE IF NOT EXISTS package_states (
                id TEXT PRIMARY KEY,
                endpoint_id TEXT NOT NULL REFERENCES endpoints(id),
                timestamp TEXT NOT NULL,
                pacman_version TEXT NOT NULL,
                architecture TEXT NOT NULL,
                state_data TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_package_states_endpoint_id
                ON package_states(endpoint_id, timestamp DESC);
        ",
        postgres: r"
            CREATE TABLE IF NOT EXISTS package_states (
                id TEXT PRIMARY KEY,
                endpoint_id TEXT NOT NULL REFERENCES endpoints(id),
                timestamp TEXT NOT NULL,
                pacman_version TEXT NOT NULL,
                architecture TEXT NOT NULL,
                state_data TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_package_states_endpoint_id
                ON package_states(endpoint_id, timestamp DESC);
        ",
    },
    Migration {
        version: 4,
        name: "create_repositories",
        sqlite: r"
            CREATE TABLE IF NOT EXISTS repositories (
                id TEXT PRIMARY KEY,
                endpoint_id TEXT NOT NULL REFERENCES endpoints(id),
                repo_name TEXT NOT NULL,
                primary_url TEXT NOT NULL,
                mirrors TEXT NOT NULL,
                packages TEXT NOT NULL,
                authoritative INTEGER NOT NULL,
                last_updated TEXT NOT NULL,
                UNIQUE(endpoint_id, repo_name)
            );
        ",
        postgres: r"
            CREATE TABLE IF NOT EXISTS repositories (
                id TEXT PRIMARY KEY,
                endpoint_id TEXT NOT NULL REFERENCES endpoints(id),
                repo_name TEXT NOT NULL,
                primary_url TEXT NOT NULL,
                mirrors TEXT NOT NULL,
                packages TEXT NOT NULL,
                authoritative INTEGER NOT NULL,
                last_updated TEXT NOT NULL,
                UNIQUE(endpoint_id, repo_name)
            );
        ",
    },
    Migration {
        version: 5,
        name: "create_sync_operations",
        sqlite: r"
            CREATE TABLE IF NOT EXISTS sync_operations (
                id TEXT PRIMARY KEY,
                pool_id TEXT,
                endpoint_id TEXT NOT NULL REFERENCES endpoints(id),
                operation_type TEXT NOT NULL,
                status TEXT NOT NULL,
                details TEXT NOT NULL,
                created_at TEXT NOT NULL,
                completed_at TEXT,
                error_message TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_sync_operations_endpoint_id
                ON sync_operations(endpoint_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_sync_operations_pool_id
                ON sync_operations(pool_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_sync_operations_status
                ON sync_operations(endpoint_id, status);
        ",
        postgres: r"
            CREATE TABLE IF NOT EXISTS sync_operations (
                id TEXT PRIMARY KEY,
                pool_id TEXT,
                endpoint_id TEXT NOT NULL REFERENCES endpoints(id),
                operation_type TEXT NOT NULL,
                status TEXT NOT NULL,
                details TEXT NOT NULL,
                created_at TEXT NOT NULL,
                completed_at TEXT,
                error_message TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_sync_operations_endpoint_id
                ON sync_operations(endpoint_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_sync_operations_pool_id
                ON sync_operations(pool_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_sync_operations_status
                ON sync_operations(endpoint_id, status);
        ",
    },
    Migration {
        version: 6,
        name: "add_sync_operations_started_at",
        sqlite: r"
            ALTER TABLE sync_operations ADD COLUMN started_at TEXT;
            CREATE INDEX IF NOT EXISTS idx_sync_operations_started_at
                ON sync_operations(status, started_at);
        ",
        postgres: r"
            ALTER TABLE sync_operations ADD COLUMN started_at TEXT;
            CREATE INDEX IF NOT EXISTS idx_sync_operations_started_at
                ON sync_operations(status, started_at);
        ",
    },
];
