//! Unit tests for the persistence gateway.

use dispatch_types::{CallStatus, DeliveryStatus, ProcessingStatus, ScenarioType};
use rusqlite::Connection;
use serde_json::json;

use crate::*;

/// Creates an in-memory SQLite database with migrations applied and foreign
/// keys enforced.
fn test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("should open in-memory db");
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .expect("should enable foreign keys");
    dispatch_db::run_migrations(&conn).expect("migrations should succeed");
    conn
}

fn sample_config() -> NewAgentConfig {
    NewAgentConfig {
        name: "Standard Check-in".to_string(),
        scenario_type: ScenarioType::CheckIn,
        system_prompt: "You are a dispatch agent.".to_string(),
        conversation_flow: "Greet, ask for status, ask for ETA.".to_string(),
        emergency_triggers: vec!["accident".to_string(), "blowout".to_string()],
        max_retries: 2,
        interruption_sensitivity: 0.7,
        backchannel_enabled: false,
        filler_words_enabled: true,
    }
}

fn seed_call(conn: &Connection) -> Call {
    let config = create_agent_config(conn, &sample_config()).expect("config should insert");
    create_call(
        conn,
        &NewCall {
            agent_config_id: config.id,
            driver_name: "Mike Johnson".to_string(),
            driver_phone: Some("+15551234567".to_string()),
            load_number: "7891-B".to_string(),
        },
    )
    .expect("call should insert")
}

fn completion(outcome: &str) -> CompletedCall {
    CompletedCall {
        ended_at: Some("2024-01-01T00:05:30Z".to_string()),
        duration: Some(330),
        result: NewCallResult::from_structured_data(
            json!({
                "call_outcome": outcome,
                "driver_status": "Driving",
                "current_location": "I-10 near Indio, CA",
                "eta": "Tomorrow 8:00 AM",
            }),
            Some("Agent: Hi Mike\nUser: Driving on I-10".to_string()),
            ProcessingStatus::Processed,
        ),
    }
}

// ── agent configs ────────────────────────────────────────────────────

#[test]
fn agent_config_round_trips() {
    let conn = test_db();
    let new = sample_config();

    let created = create_agent_config(&conn, &new).expect("create should succeed");
    let fetched = get_agent_config(&conn, &created.id).expect("get should succeed");

    assert_eq!(fetched, created);
    assert_eq!(fetched.name, new.name);
    assert_eq!(fetched.scenario_type, new.scenario_type);
    assert_eq!(fetched.system_prompt, new.system_prompt);
    assert_eq!(fetched.conversation_flow, new.conversation_flow);
    assert_eq!(fetched.emergency_triggers, new.emergency_triggers);
    assert_eq!(fetched.max_retries, new.max_retries);
    assert_eq!(fetched.interruption_sensitivity, new.interruption_sensitivity);
    assert_eq!(fetched.backchannel_enabled, new.backchannel_enabled);
    assert_eq!(fetched.filler_words_enabled, new.filler_words_enabled);
    assert_eq!(fetched.created_at, fetched.updated_at);
}

#[test]
fn agent_config_defaults_apply_on_deserialize() {
    let new: NewAgentConfig = serde_json::from_value(json!({
        "name": "Emergency",
        "scenario_type": "emergency",
        "system_prompt": "p",
        "conversation_flow": "f",
    }))
    .expect("minimal payload should deserialize");

    assert_eq!(new.max_retries, 3);
    assert_eq!(new.interruption_sensitivity, 0.5);
    assert!(new.backchannel_enabled);
    assert!(new.filler_words_enabled);
    assert!(new.emergency_triggers.is_empty());
}

#[test]
fn agent_config_validation_rejects_bad_fields() {
    let mut new = sample_config();
    new.interruption_sensitivity = 1.5;
    assert!(new.validate().is_err());

    new.interruption_sensitivity = 0.2;
    new.name = "   ".to_string();
    assert!(new.validate().is_err());

    let update = AgentConfigUpdate {
        interruption_sensitivity: Some(-0.1),
        ..Default::default()
    };
    assert!(update.validate().is_err());
    assert!(AgentConfigUpdate::default().validate().is_ok());
}

#[test]
fn list_agent_configs_newest_first() {
    let conn = test_db();
    let first = create_agent_config(&conn, &sample_config()).unwrap();
    let mut second_new = sample_config();
    second_new.name = "Emergency Protocol".to_string();
    let second = create_agent_config(&conn, &second_new).unwrap();

    let listed = list_agent_configs(&conn).unwrap();
    let ids: Vec<_> = listed.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
}

#[test]
fn update_agent_config_changes_only_given_fields() {
    let conn = test_db();
    let created = create_agent_config(&conn, &sample_config()).unwrap();

    let updated = update_agent_config(
        &conn,
        &created.id,
        &AgentConfigUpdate {
            name: Some("Renamed".to_string()),
            emergency_triggers: Some(vec!["fire".to_string()]),
            ..Default::default()
        },
    )
    .expect("update should succeed");

    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.emergency_triggers, vec!["fire".to_string()]);
    assert_eq!(updated.system_prompt, created.system_prompt);
    assert_eq!(updated.max_retries, created.max_retries);
    assert_eq!(updated.created_at, created.created_at);
}

#[test]
fn update_missing_agent_config_is_not_found() {
    let conn = test_db();
    let err = update_agent_config(&conn, "nope", &AgentConfigUpdate::default()).unwrap_err();
    assert!(matches!(err, RecordError::NotFound { .. }), "got {err:?}");
}

#[test]
fn delete_agent_config_with_calls_is_conflict() {
    let conn = test_db();
    let call = seed_call(&conn);

    let err = delete_agent_config(&conn, &call.agent_config_id).unwrap_err();
    assert!(matches!(err, RecordError::Conflict(_)), "got {err:?}");
    assert!(get_agent_config(&conn, &call.agent_config_id).is_ok());
}

#[test]
fn delete_agent_config_removes_row() {
    let conn = test_db();
    let created = create_agent_config(&conn, &sample_config()).unwrap();

    delete_agent_config(&conn, &created.id).expect("delete should succeed");
    assert!(matches!(
        get_agent_config(&conn, &created.id),
        Err(RecordError::NotFound { .. })
    ));
    assert!(matches!(
        delete_agent_config(&conn, &created.id),
        Err(RecordError::NotFound { .. })
    ));
}

// ── calls ────────────────────────────────────────────────────────────

#[test]
fn create_call_starts_initiated_with_placeholder() {
    let conn = test_db();
    let call = seed_call(&conn);

    assert_eq!(call.call_status, CallStatus::Initiated);
    assert!(call.provider_call_id.starts_with("pending-"));
    assert!(call.ended_at.is_none());
    assert!(call.duration.is_none());
}

#[test]
fn create_call_for_unknown_config_is_conflict() {
    let conn = test_db();
    let err = create_call(
        &conn,
        &NewCall {
            agent_config_id: "missing".to_string(),
            driver_name: "A".to_string(),
            driver_phone: None,
            load_number: "L".to_string(),
        },
    )
    .unwrap_err();
    assert!(matches!(err, RecordError::Conflict(_)), "got {err:?}");
}

#[test]
fn provider_id_lookup_after_assignment() {
    let conn = test_db();
    let call = seed_call(&conn);

    set_provider_call_id(&conn, &call.id, "call_abc").unwrap();
    let found = find_call_by_provider_id(&conn, "call_abc")
        .unwrap()
        .expect("call should be found by provider id");
    assert_eq!(found.id, call.id);
    assert!(find_call_by_provider_id(&conn, "call_other").unwrap().is_none());
}

#[test]
fn status_only_moves_forward() {
    let conn = test_db();
    let call = seed_call(&conn);

    assert!(mark_call_in_progress(&conn, &call.id).unwrap());
    assert!(!mark_call_in_progress(&conn, &call.id).unwrap());

    record_completion(&conn, &call.id, &completion("In-Transit Update"))
        .unwrap()
        .expect("first completion should write a result");

    assert!(!mark_call_in_progress(&conn, &call.id).unwrap());
    assert!(!mark_call_failed(&conn, &call.id).unwrap());
    assert_eq!(get_call(&conn, &call.id).unwrap().call_status, CallStatus::Completed);
}

#[test]
fn record_completion_writes_once() {
    let conn = test_db();
    let call = seed_call(&conn);

    let result = record_completion(&conn, &call.id, &completion("In-Transit Update"))
        .unwrap()
        .expect("first completion should write a result");
    assert_eq!(result.call_outcome.as_deref(), Some("In-Transit Update"));
    assert_eq!(result.current_location.as_deref(), Some("I-10 near Indio, CA"));
    assert_eq!(result.processing_status, ProcessingStatus::Processed);

    let second = record_completion(&conn, &call.id, &completion("Arrival Confirmation")).unwrap();
    assert!(second.is_none(), "second completion must not write");

    let stored = get_result_for_call(&conn, &call.id).unwrap();
    assert_eq!(stored.id, result.id);
    assert_eq!(stored.call_outcome.as_deref(), Some("In-Transit Update"));

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM call_results", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);

    let call = get_call(&conn, &call.id).unwrap();
    assert_eq!(call.call_status, CallStatus::Completed);
    assert_eq!(call.duration, Some(330));
    assert_eq!(call.ended_at.as_deref(), Some("2024-01-01T00:05:30Z"));
}

#[test]
fn record_completion_on_failed_call_rolls_back() {
    let conn = test_db();
    let call = seed_call(&conn);
    assert!(mark_call_failed(&conn, &call.id).unwrap());

    let err = record_completion(&conn, &call.id, &completion("x")).unwrap_err();
    assert!(matches!(err, RecordError::Conflict(_)), "got {err:?}");
    assert!(find_result_for_call(&conn, &call.id).unwrap().is_none());
}

#[test]
fn final_transcript_overwrites_existing_result() {
    let conn = test_db();
    let call = seed_call(&conn);

    record_completion(&conn, &call.id, &completion("x")).unwrap();
    assert_eq!(
        apply_final_transcript(&conn, &call.id, "analyzed transcript").unwrap(),
        TranscriptUpdate::Applied
    );
    assert_eq!(
        get_result_for_call(&conn, &call.id)
            .unwrap()
            .raw_transcript
            .as_deref(),
        Some("analyzed transcript")
    );
}

#[test]
fn early_final_transcript_is_applied_on_completion() {
    let conn = test_db();
    let call = seed_call(&conn);

    assert_eq!(
        apply_final_transcript(&conn, &call.id, "final transcript").unwrap(),
        TranscriptUpdate::Deferred
    );
    assert!(find_result_for_call(&conn, &call.id).unwrap().is_none());

    let result = record_completion(&conn, &call.id, &completion("x"))
        .unwrap()
        .expect("completion should write a result");
    assert_eq!(result.raw_transcript.as_deref(), Some("final transcript"));

    let pending: Option<String> = conn
        .query_row(
            "SELECT pending_transcript FROM calls WHERE id = ?1",
            [&call.id],
            |row| row.get(0),
        )
        .unwrap();
    assert!(pending.is_none(), "parked transcript should be cleared");
}

#[test]
fn completion_without_parked_transcript_keeps_fetched_one() {
    let conn = test_db();
    let call = seed_call(&conn);

    let result = record_completion(&conn, &call.id, &completion("x"))
        .unwrap()
        .unwrap();
    assert_eq!(
        result.raw_transcript.as_deref(),
        Some("Agent: Hi Mike\nUser: Driving on I-10")
    );
}

#[test]
fn final_transcript_for_unknown_call_is_not_found() {
    let conn = test_db();
    let err = apply_final_transcript(&conn, "missing", "t").unwrap_err();
    assert!(matches!(err, RecordError::NotFound { .. }), "got {err:?}");
}

#[test]
fn call_summary_joins_config_and_result() {
    let conn = test_db();
    let call = seed_call(&conn);

    let summary = get_call_summary(&conn, &call.id).unwrap();
    assert_eq!(summary.call_info.call.id, call.id);
    assert_eq!(summary.call_info.agent_name.as_deref(), Some("Standard Check-in"));
    assert_eq!(summary.call_info.scenario_type, Some(ScenarioType::CheckIn));
    assert!(summary.results.is_none());

    record_completion(&conn, &call.id, &completion("In-Transit Update")).unwrap();
    let summary = get_call_summary(&conn, &call.id).unwrap();
    let results = summary.results.expect("result should be joined");
    assert_eq!(results.call_id, call.id);
    assert_eq!(results.structured_data["eta"], "Tomorrow 8:00 AM");

    assert!(matches!(
        get_call_summary(&conn, "missing"),
        Err(RecordError::NotFound { .. })
    ));
}

#[test]
fn list_calls_includes_agent_details() {
    let conn = test_db();
    let first = seed_call(&conn);
    let second = seed_call(&conn);

    let calls = list_calls(&conn, None).unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].call.id, second.id);
    assert_eq!(calls[1].call.id, first.id);
    assert_eq!(calls[0].agent_name.as_deref(), Some("Standard Check-in"));

    assert_eq!(list_calls(&conn, Some(1)).unwrap().len(), 1);
}

#[test]
fn result_fields_ignore_non_strings() {
    let result = NewCallResult::from_structured_data(
        json!({"call_outcome": "Emergency Detected", "eta": null, "driver_status": 4}),
        None,
        ProcessingStatus::Degraded,
    );
    assert_eq!(result.call_outcome.as_deref(), Some("Emergency Detected"));
    assert!(result.eta.is_none());
    assert!(result.driver_status.is_none());
}

// ── webhook deliveries ───────────────────────────────────────────────

fn delivery(event_type: &str) -> NewDelivery {
    NewDelivery {
        provider_call_id: "call_abc".to_string(),
        event_type: event_type.to_string(),
        payload: json!({"event": event_type, "data": {"call_id": "call_abc"}}),
    }
}

#[test]
fn duplicate_delivery_is_not_reprocessed() {
    let conn = test_db();

    let first = record_delivery(&conn, &delivery("call_ended")).unwrap();
    assert!(matches!(first, DeliveryDisposition::Accepted(_)));
    assert!(first.should_process());

    let second = record_delivery(&conn, &delivery("call_ended")).unwrap();
    assert_eq!(
        second,
        DeliveryDisposition::Duplicate {
            id: first.id(),
            status: DeliveryStatus::Queued
        }
    );
    assert!(!second.should_process());

    let other = record_delivery(&conn, &delivery("call_started")).unwrap();
    assert_ne!(other.id(), first.id());
}

#[test]
fn failed_delivery_is_requeued() {
    let conn = test_db();
    let first = record_delivery(&conn, &delivery("call_ended")).unwrap();
    mark_delivery(&conn, first.id(), DeliveryStatus::Failed, Some("provider down")).unwrap();

    let again = record_delivery(&conn, &delivery("call_ended")).unwrap();
    assert_eq!(again, DeliveryDisposition::Requeued(first.id()));

    let rows = list_deliveries(&conn, &DeliveryFilter::default()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, DeliveryStatus::Queued);
    assert_eq!(rows[0].attempts, 2);
    assert!(rows[0].detail.is_none());
}

#[test]
fn list_deliveries_filters_by_status() {
    let conn = test_db();
    let a = record_delivery(&conn, &delivery("call_started")).unwrap();
    let b = record_delivery(&conn, &delivery("call_ended")).unwrap();
    mark_delivery(&conn, a.id(), DeliveryStatus::Processed, Some("call_started")).unwrap();

    let processed = list_deliveries(
        &conn,
        &DeliveryFilter {
            status: Some(DeliveryStatus::Processed),
            limit: None,
        },
    )
    .unwrap();
    assert_eq!(processed.len(), 1);
    assert_eq!(processed[0].id, a.id());
    assert!(processed[0].processed_at.is_some());

    let limited = list_deliveries(
        &conn,
        &DeliveryFilter {
            status: None,
            limit: Some(1),
        },
    )
    .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, b.id());
}

// ── dashboard ────────────────────────────────────────────────────────

#[test]
fn dashboard_stats_empty_database() {
    let conn = test_db();
    let stats = dashboard_stats(&conn).expect("empty stats should not fail");
    assert_eq!(stats.stats, StatusCounts::default());
    assert!(stats.recent_calls.is_empty());
}

#[test]
fn dashboard_stats_counts_by_status() {
    let conn = test_db();
    let a = seed_call(&conn);
    let b = seed_call(&conn);
    let _c = seed_call(&conn);
    mark_call_in_progress(&conn, &a.id).unwrap();
    mark_call_failed(&conn, &b.id).unwrap();

    let stats = dashboard_stats(&conn).unwrap();
    assert_eq!(stats.stats.total_calls, 3);
    assert_eq!(stats.stats.in_progress_calls, 1);
    assert_eq!(stats.stats.failed_calls, 1);
    assert_eq!(stats.stats.initiated_calls, 1);
    assert_eq!(stats.stats.completed_calls, 0);
    assert_eq!(stats.recent_calls.len(), 3);
    assert_eq!(
        stats.recent_calls[0].agent_name.as_deref(),
        Some("Standard Check-in")
    );
}
