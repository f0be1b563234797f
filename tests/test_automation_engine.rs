use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use std::sync::Arc;

use flowmail::automation::{executor, scanner};
use flowmail::config::{Config, TickConfig};
use flowmail::database::{
    automation_queue, automation_runs, automations, contact_events, contacts, email_sends,
    establish_connection,
};

fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        port: 0,
        mail_gateway_url: "http://gateway.invalid".to_string(),
        mail_gateway_token: None,
        public_base_url: None,
        unsubscribe_signing_key: None,
        default_from_email: "hello@test.local".to_string(),
        default_from_name: "Test".to_string(),
        team_notify_email: Some("team@test.local".to_string()),
        runner_token: None,
        resend_api_key: None,
        rate_limit_per_minute: 600,
        rate_limit_burst: 100,
        ticks: TickConfig {
            delivery_secs: 5,
            pipeline_secs: 15,
            automation_secs: 5,
            scheduler_secs: 60,
        },
    }
}

async fn test_db() -> Arc<DatabaseConnection> {
    Arc::new(
        establish_connection("sqlite::memory:")
            .await
            .expect("Failed to connect to database"),
    )
}

async fn insert_automation(db: &DatabaseConnection, steps_json: &str) -> automations::Model {
    let mut automation = automations::ActiveModel::new();
    automation.workspace_id = Set("default".to_string());
    automation.name = Set("Welcome flow".to_string());
    automation.status = Set("Running".to_string());
    automation.steps = Set(steps_json.to_string());
    automation.insert(db).await.unwrap()
}

async fn insert_contact(db: &DatabaseConnection, email: &str, lead_score: i32) -> contacts::Model {
    let mut contact = contacts::ActiveModel::new();
    contact.workspace_id = Set("default".to_string());
    contact.email = Set(email.to_string());
    contact.lead_score = Set(lead_score);
    contact.insert(db).await.unwrap()
}

async fn insert_event(
    db: &DatabaseConnection,
    contact_id: &str,
    event_type: &str,
    meta: serde_json::Value,
) -> contact_events::Model {
    let mut event = contact_events::ActiveModel::new();
    event.workspace_id = Set("default".to_string());
    event.contact_id = Set(contact_id.to_string());
    event.event_type = Set(event_type.to_string());
    event.meta = Set(meta.to_string());
    event.insert(db).await.unwrap()
}

async fn queued_items(db: &DatabaseConnection) -> Vec<automation_queue::Model> {
    automation_queue::Entity::find()
        .filter(automation_queue::Column::Status.eq("queued"))
        .all(db)
        .await
        .unwrap()
}

async fn make_item_due(db: &DatabaseConnection, item_id: &str) {
    let item = automation_queue::Entity::find_by_id(item_id.to_string())
        .one(db)
        .await
        .unwrap()
        .unwrap();
    let mut update: automation_queue::ActiveModel = item.into();
    update.execute_at = Set(chrono::Utc::now().timestamp_micros() - 1_000_000);
    update.update(db).await.unwrap();
}

const WAIT_THEN_SEND: &str = r#"[
    {"type":"trigger","id":"t1","config":{"kind":"trigger.form_submitted","form":"demo"}},
    {"type":"wait","id":"w1","config":{"days":1.0}},
    {"type":"action","id":"a1","config":{"kind":"action.send_email","subject":"Hi","body":"Thanks {{firstName}}"}}
]"#;

#[tokio::test]
async fn scanner_starts_run_at_trigger_successor() {
    let db = test_db().await;
    let automation = insert_automation(&db, WAIT_THEN_SEND).await;
    let contact = insert_contact(&db, "ada@example.com", 0).await;
    insert_event(&db, &contact.id, "form_submitted", serde_json::json!({"form": "demo"})).await;

    let outcome = scanner::run(&db, "default", 200).await.unwrap();
    assert_eq!(outcome.processed_events, 1);
    assert_eq!(outcome.started_runs, 1);

    let runs = automation_runs::Entity::find().all(&*db).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].automation_id, automation.id);
    assert_eq!(runs[0].status, "running");
    assert_eq!(runs[0].current_step_id.as_deref(), Some("w1"));
    let meta = serde_json::from_str::<serde_json::Value>(&runs[0].meta).unwrap();
    assert_eq!(meta["trigger_kind"], "trigger.form_submitted");

    let items = queued_items(&db).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].step_id, "w1");
    assert!(items[0].execute_at <= chrono::Utc::now().timestamp_micros());

    // A second scan over an empty window starts nothing new.
    let outcome = scanner::run(&db, "default", 200).await.unwrap();
    assert_eq!(outcome.processed_events, 0);
    assert_eq!(outcome.started_runs, 0);
}

#[tokio::test]
async fn non_matching_form_does_not_trigger() {
    let db = test_db().await;
    insert_automation(&db, WAIT_THEN_SEND).await;
    let contact = insert_contact(&db, "ada@example.com", 0).await;
    insert_event(&db, &contact.id, "form_submitted", serde_json::json!({"form": "newsletter"}))
        .await;

    let outcome = scanner::run(&db, "default", 200).await.unwrap();
    assert_eq!(outcome.processed_events, 1);
    assert_eq!(outcome.started_runs, 0);
    assert!(automation_runs::Entity::find().all(&*db).await.unwrap().is_empty());
}

#[tokio::test]
async fn wait_then_send_flow_completes() {
    let db = test_db().await;
    let config = test_config();
    let automation = insert_automation(&db, WAIT_THEN_SEND).await;
    let contact = insert_contact(&db, "ada@example.com", 0).await;
    insert_event(&db, &contact.id, "form_submitted", serde_json::json!({"form": "demo"})).await;

    scanner::run(&db, "default", 200).await.unwrap();

    // Executes the wait step: its successor lands roughly a day out.
    let before = chrono::Utc::now().timestamp_micros();
    let processed = executor::run(&db, &config, "default", 25).await.unwrap();
    assert_eq!(processed, 1);

    let items = queued_items(&db).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].step_id, "a1");
    let day_micros = 86_400 * 1_000_000i64;
    assert!(items[0].execute_at >= before + day_micros - 5_000_000);
    assert!(items[0].execute_at <= before + day_micros + 60_000_000);

    let run = automation_runs::Entity::find().one(&*db).await.unwrap().unwrap();
    assert_eq!(run.current_step_id.as_deref(), Some("a1"));

    // Not due yet: nothing processed.
    let processed = executor::run(&db, &config, "default", 25).await.unwrap();
    assert_eq!(processed, 0);

    // Bring the send step due and finish the run.
    make_item_due(&db, &items[0].id).await;
    let processed = executor::run(&db, &config, "default", 25).await.unwrap();
    assert_eq!(processed, 1);

    let sends = email_sends::Entity::find().all(&*db).await.unwrap();
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].campaign_id, automation.id);
    assert_eq!(sends[0].subject, "Hi");
    assert_eq!(sends[0].status, "queued");
    let meta = sends[0].meta_value();
    assert_eq!(meta["source"], "automation");
    assert_eq!(meta["step_id"], "a1");

    let queued_events = contact_events::Entity::find()
        .filter(contact_events::Column::EventType.eq("email_queued"))
        .all(&*db)
        .await
        .unwrap();
    assert_eq!(queued_events.len(), 1);

    // Run is terminal and no queued items reference it.
    let run = automation_runs::Entity::find().one(&*db).await.unwrap().unwrap();
    assert_eq!(run.status, "completed");
    assert!(run.finished_at.is_some());
    assert!(queued_items(&db).await.is_empty());
}

const SCORE_GATE: &str = r#"[
    {"type":"trigger","id":"t1","config":{"kind":"trigger.purchase"}},
    {"type":"condition","id":"c1","config":{"kind":"condition.lead_score","op":">","value":50,"nextYes":"hot"}},
    {"type":"action","id":"hot","config":{"kind":"action.send_email","subject":"For our best customers"}}
]"#;

#[tokio::test]
async fn condition_pass_branches_to_next_yes() {
    let db = test_db().await;
    let config = test_config();
    insert_automation(&db, SCORE_GATE).await;
    let contact = insert_contact(&db, "ada@example.com", 60).await;
    insert_event(&db, &contact.id, "purchase", serde_json::json!({})).await;

    scanner::run(&db, "default", 200).await.unwrap();
    // Condition step, then the branch action
    executor::run(&db, &config, "default", 25).await.unwrap();
    executor::run(&db, &config, "default", 25).await.unwrap();

    let sends = email_sends::Entity::find().all(&*db).await.unwrap();
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].subject, "For our best customers");

    let run = automation_runs::Entity::find().one(&*db).await.unwrap().unwrap();
    assert_eq!(run.status, "completed");
}

#[tokio::test]
async fn condition_fail_without_next_no_completes_run() {
    let db = test_db().await;
    let config = test_config();
    insert_automation(&db, SCORE_GATE).await;
    let contact = insert_contact(&db, "ada@example.com", 10).await;
    insert_event(&db, &contact.id, "purchase", serde_json::json!({})).await;

    scanner::run(&db, "default", 200).await.unwrap();
    executor::run(&db, &config, "default", 25).await.unwrap();

    assert!(email_sends::Entity::find().all(&*db).await.unwrap().is_empty());
    let run = automation_runs::Entity::find().one(&*db).await.unwrap().unwrap();
    assert_eq!(run.status, "completed");
    assert!(queued_items(&db).await.is_empty());
}

#[tokio::test]
async fn update_field_action_patches_contact_tags() {
    let db = test_db().await;
    let config = test_config();
    insert_automation(
        &db,
        r#"[
            {"type":"trigger","id":"t1","config":{"kind":"trigger.purchase"}},
            {"type":"action","id":"a1","config":{"kind":"action.update_field","field":"tag","op":"add","value":"customer"}}
        ]"#,
    )
    .await;
    let contact = insert_contact(&db, "ada@example.com", 0).await;
    insert_event(&db, &contact.id, "purchase", serde_json::json!({})).await;

    scanner::run(&db, "default", 200).await.unwrap();
    executor::run(&db, &config, "default", 25).await.unwrap();

    let reloaded = contacts::Entity::find_by_id(contact.id.clone())
        .one(&*db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.tag_list(), vec!["customer".to_string()]);

    let update_events = contact_events::Entity::find()
        .filter(contact_events::Column::EventType.eq("automation_update_field"))
        .all(&*db)
        .await
        .unwrap();
    assert_eq!(update_events.len(), 1);

    let run = automation_runs::Entity::find().one(&*db).await.unwrap().unwrap();
    assert_eq!(run.status, "completed");
}

#[tokio::test]
async fn notify_action_targets_team_address() {
    let db = test_db().await;
    let config = test_config();
    let automation = insert_automation(
        &db,
        r#"[
            {"type":"trigger","id":"t1","config":{"kind":"trigger.purchase"}},
            {"type":"action","id":"a1","config":{"kind":"action.notify","subject":"Big purchase"}}
        ]"#,
    )
    .await;
    let contact = insert_contact(&db, "ada@example.com", 0).await;
    insert_event(&db, &contact.id, "purchase", serde_json::json!({})).await;

    scanner::run(&db, "default", 200).await.unwrap();
    executor::run(&db, &config, "default", 25).await.unwrap();

    let sends = email_sends::Entity::find().all(&*db).await.unwrap();
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].to_email, "team@test.local");
    assert_eq!(sends[0].campaign_id, automation.id);
    assert_eq!(sends[0].meta_value()["source"], "automation_notify");
}

#[tokio::test]
async fn ineligible_contact_gets_no_automation_email() {
    let db = test_db().await;
    let config = test_config();
    insert_automation(
        &db,
        r#"[
            {"type":"trigger","id":"t1","config":{"kind":"trigger.purchase"}},
            {"type":"action","id":"a1","config":{"kind":"action.send_email","subject":"Hi"}}
        ]"#,
    )
    .await;
    let contact = {
        let mut c = contacts::ActiveModel::new();
        c.workspace_id = Set("default".to_string());
        c.email = Set("gone@example.com".to_string());
        c.unsubscribed = Set(true);
        c.insert(&*db).await.unwrap()
    };
    insert_event(&db, &contact.id, "purchase", serde_json::json!({})).await;

    scanner::run(&db, "default", 200).await.unwrap();
    executor::run(&db, &config, "default", 25).await.unwrap();

    assert!(email_sends::Entity::find().all(&*db).await.unwrap().is_empty());
    // The run still completes; only the send is suppressed.
    let run = automation_runs::Entity::find().one(&*db).await.unwrap().unwrap();
    assert_eq!(run.status, "completed");
}
