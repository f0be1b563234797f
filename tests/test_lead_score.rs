use sea_orm::{ActiveModelBehavior, ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;

use flowmail::database::{contact_events, contacts, establish_connection, event_cursors};
use flowmail::pipeline::lead_score;

async fn test_db() -> Arc<DatabaseConnection> {
    Arc::new(
        establish_connection("sqlite::memory:")
            .await
            .expect("Failed to connect to database"),
    )
}

async fn insert_contact(db: &DatabaseConnection, score: i32, temperature: &str) -> contacts::Model {
    let mut contact = contacts::ActiveModel::new();
    contact.workspace_id = Set("default".to_string());
    contact.email = Set("ada@example.com".to_string());
    contact.lead_score = Set(score);
    contact.temperature = Set(temperature.to_string());
    contact.insert(db).await.unwrap()
}

async fn insert_event(
    db: &DatabaseConnection,
    contact_id: &str,
    event_type: &str,
    occurred_at: i64,
    meta: serde_json::Value,
) -> contact_events::Model {
    let mut event = contact_events::ActiveModel::new();
    event.workspace_id = Set("default".to_string());
    event.contact_id = Set(contact_id.to_string());
    event.event_type = Set(event_type.to_string());
    event.occurred_at = Set(occurred_at);
    event.meta = Set(meta.to_string());
    event.insert(db).await.unwrap()
}

#[tokio::test]
async fn aggregates_deltas_and_recomputes_temperature() {
    let db = test_db().await;
    let contact = insert_contact(&db, 18, "cold").await;

    // 2 opens (+2), a pricing click (+5), a cancelled purchase (-10): -3
    let base = chrono::Utc::now().timestamp_micros();
    insert_event(&db, &contact.id, "email_open", base + 1, serde_json::json!({})).await;
    insert_event(&db, &contact.id, "email_open", base + 2, serde_json::json!({})).await;
    insert_event(
        &db,
        &contact.id,
        "link_click",
        base + 3,
        serde_json::json!({"url": "https://x.test/pricing"}),
    )
    .await;
    insert_event(
        &db,
        &contact.id,
        "purchase_cancelled",
        base + 4,
        serde_json::json!({}),
    )
    .await;

    let outcome = lead_score::run(&db, "default", 500).await.unwrap();
    assert_eq!(outcome.processed_events, 4);
    assert_eq!(outcome.updated_contacts, 1);

    let reloaded = contacts::Entity::find_by_id(contact.id.clone())
        .one(&*db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.lead_score, 15);
    assert_eq!(reloaded.temperature, "cold");
}

#[tokio::test]
async fn score_is_clamped_to_bounds() {
    let db = test_db().await;
    let contact = insert_contact(&db, 5, "cold").await;

    let base = chrono::Utc::now().timestamp_micros();
    insert_event(
        &db,
        &contact.id,
        "purchase_cancelled",
        base + 1,
        serde_json::json!({}),
    )
    .await;
    lead_score::run(&db, "default", 500).await.unwrap();

    let reloaded = contacts::Entity::find_by_id(contact.id.clone())
        .one(&*db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.lead_score, 0);

    // Nine purchases would be 135 raw; the stored score stops at 100.
    for i in 0..9 {
        insert_event(&db, &contact.id, "purchase", base + 10 + i, serde_json::json!({})).await;
    }
    lead_score::run(&db, "default", 500).await.unwrap();

    let reloaded = contacts::Entity::find_by_id(contact.id.clone())
        .one(&*db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.lead_score, 100);
    assert_eq!(reloaded.temperature, "hot");
}

#[tokio::test]
async fn cursor_advances_past_processed_batch() {
    let db = test_db().await;
    let contact = insert_contact(&db, 0, "cold").await;

    let base = chrono::Utc::now().timestamp_micros();
    insert_event(&db, &contact.id, "email_open", base + 1, serde_json::json!({})).await;
    let last = insert_event(&db, &contact.id, "email_open", base + 2, serde_json::json!({})).await;

    lead_score::run(&db, "default", 500).await.unwrap();

    let (mark, event_id) = event_cursors::load(&*db, "default", "lead_score").await.unwrap();
    assert_eq!(mark, last.occurred_at);
    assert_eq!(event_id.as_deref(), Some(last.id.as_str()));

    // Re-running against an empty window is a no-op and leaves the
    // cursor where it was.
    let outcome = lead_score::run(&db, "default", 500).await.unwrap();
    assert_eq!(outcome.processed_events, 0);
    assert_eq!(outcome.updated_contacts, 0);
    let (mark_after, _) = event_cursors::load(&*db, "default", "lead_score").await.unwrap();
    assert_eq!(mark_after, mark);

    let reloaded = contacts::Entity::find_by_id(contact.id.clone())
        .one(&*db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.lead_score, 2);
}

#[tokio::test]
async fn events_from_other_workspaces_are_ignored() {
    let db = test_db().await;
    let contact = insert_contact(&db, 0, "cold").await;

    let mut event = contact_events::ActiveModel::new();
    event.workspace_id = Set("other".to_string());
    event.contact_id = Set(contact.id.clone());
    event.event_type = Set("purchase".to_string());
    event.insert(&*db).await.unwrap();

    let outcome = lead_score::run(&db, "default", 500).await.unwrap();
    assert_eq!(outcome.processed_events, 0);

    let reloaded = contacts::Entity::find_by_id(contact.id.clone())
        .one(&*db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.lead_score, 0);
}
