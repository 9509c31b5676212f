use dispatch_db::{create_pool, run_migrations, DbRuntimeSettings};

#[test]
fn file_database_survives_reopen() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("dispatch.db");
    let path = path.to_str().expect("temp path should be utf-8");

    {
        let pool = create_pool(path, DbRuntimeSettings::default()).expect("failed to create pool");
        let conn = pool.get().expect("failed to get connection");
        let applied = run_migrations(&conn).expect("failed to run migrations");
        assert!(applied > 0);

        conn.execute(
            "INSERT INTO agent_configs (id, name, scenario_type, system_prompt, conversation_flow, created_at, updated_at)
             VALUES ('cfg-1', 'Night check', 'check_in', 'p', 'f', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
            [],
        )
        .expect("failed to insert agent config");
    }

    let pool = create_pool(path, DbRuntimeSettings::default()).expect("failed to reopen pool");
    let conn = pool.get().expect("failed to get connection");
    let applied = run_migrations(&conn).expect("failed to re-run migrations");
    assert_eq!(applied, 0, "reopened database should already be migrated");

    let mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .expect("failed to query journal mode");
    assert_eq!(mode, "wal");

    let name: String = conn
        .query_row("SELECT name FROM agent_configs WHERE id = 'cfg-1'", [], |row| row.get(0))
        .expect("failed to read back agent config");
    assert_eq!(name, "Night check");
}

#[test]
fn orphaned_call_is_rejected() {
    let pool = dispatch_db::create_memory_pool().expect("failed to create pool");
    let conn = pool.get().expect("failed to get connection");

    let result = conn.execute(
        "INSERT INTO calls (id, agent_config_id, provider_call_id, driver_name, load_number, started_at)
         VALUES ('call-1', 'missing-config', 'prov-1', 'Mike', 'L-1', '2024-01-01T00:00:00Z')",
        [],
    );
    assert!(result.is_err(), "foreign key should reject unknown agent config");
}
