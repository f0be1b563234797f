use sea_orm::{ActiveModelBehavior, ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;
use wiremock::matchers::{bearer_token, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use flowmail::config::{Config, TickConfig};
use flowmail::database::{campaigns, contacts, email_sends, establish_connection};
use flowmail::email::DeliveryWorker;

fn test_config(gateway_url: &str) -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        port: 0,
        mail_gateway_url: gateway_url.to_string(),
        mail_gateway_token: Some("gateway-token".to_string()),
        public_base_url: Some("https://fns.test".to_string()),
        unsubscribe_signing_key: Some("signing-key".to_string()),
        default_from_email: "hello@test.local".to_string(),
        default_from_name: "FlowMail Test".to_string(),
        team_notify_email: None,
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

async fn insert_contact(db: &DatabaseConnection) -> contacts::Model {
    let mut contact = contacts::ActiveModel::new();
    contact.workspace_id = Set("default".to_string());
    contact.email = Set("ada@example.com".to_string());
    contact.first_name = Set(Some("Ada".to_string()));
    contact.insert(db).await.unwrap()
}

async fn insert_campaign(db: &DatabaseConnection, body: &str) -> campaigns::Model {
    let mut campaign = campaigns::ActiveModel::new();
    campaign.workspace_id = Set("default".to_string());
    campaign.name = Set("Launch".to_string());
    campaign.subject = Set(Some("Big news".to_string()));
    campaign.body = Set(Some(body.to_string()));
    campaign.insert(db).await.unwrap()
}

async fn insert_queued_send(
    db: &DatabaseConnection,
    campaign_id: &str,
    contact: &contacts::Model,
) -> email_sends::Model {
    let mut send = email_sends::ActiveModel::new();
    send.workspace_id = Set("default".to_string());
    send.campaign_id = Set(campaign_id.to_string());
    send.contact_id = Set(Some(contact.id.clone()));
    send.to_email = Set(contact.email.clone());
    send.subject = Set("Hello {{firstName}}".to_string());
    send.insert(db).await.unwrap()
}

#[tokio::test]
async fn delivers_queued_send_and_records_message_id() {
    let gateway = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .and(bearer_token("gateway-token"))
        .and(body_partial_json(serde_json::json!({
            "to": "ada@example.com",
            "subject": "Hello Ada",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "messageId": "msg-123"
        })))
        .expect(1)
        .mount(&gateway)
        .await;

    let db = test_db().await;
    let config = Arc::new(test_config(&gateway.uri()));
    let worker = DeliveryWorker::new(db.clone(), config).unwrap();

    let contact = insert_contact(&db).await;
    let campaign = insert_campaign(&db, "Hi {{firstName}},\nwelcome aboard").await;
    let send = insert_queued_send(&db, &campaign.id, &contact).await;

    let processed = worker.process_due_sends("default", 25).await.unwrap();
    assert_eq!(processed, 1);

    let reloaded = email_sends::Entity::find_by_id(send.id.clone())
        .one(&*db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.status, "sent");
    assert_eq!(reloaded.provider_message_id.as_deref(), Some("msg-123"));
    assert!(reloaded.sent_at.is_some());

    let campaign = campaigns::Entity::find_by_id(campaign.id.clone())
        .one(&*db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(campaign.sent_count, 1);
}

#[tokio::test]
async fn rendered_html_carries_tracking_and_unsubscribe() {
    let gateway = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "messageId": "msg-1"
        })))
        .mount(&gateway)
        .await;

    let db = test_db().await;
    let config = Arc::new(test_config(&gateway.uri()));
    let worker = DeliveryWorker::new(db.clone(), config).unwrap();

    let contact = insert_contact(&db).await;
    let campaign = insert_campaign(
        &db,
        r#"Check <a href="https://example.com/pricing">our pricing</a>"#,
    )
    .await;
    let send = insert_queued_send(&db, &campaign.id, &contact).await;

    worker.process_due_sends("default", 25).await.unwrap();

    let requests = gateway.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let html = body["html"].as_str().unwrap();
    assert!(html.contains(&format!("/track/click?sid={}", send.id)));
    assert!(html.contains(&format!("/track/open?sid={}", send.id)));
    assert!(html.contains("/unsubscribe?token="));
    assert!(body["from"].as_str().unwrap().contains("hello@test.local"));
}

#[tokio::test]
async fn gateway_failure_marks_row_failed_without_stopping_batch() {
    let gateway = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(502).set_body_string("relay down"))
        .mount(&gateway)
        .await;

    let db = test_db().await;
    let config = Arc::new(test_config(&gateway.uri()));
    let worker = DeliveryWorker::new(db.clone(), config).unwrap();

    let contact = insert_contact(&db).await;
    let campaign = insert_campaign(&db, "plain body").await;
    let first = insert_queued_send(&db, &campaign.id, &contact).await;
    let second = insert_queued_send(&db, &campaign.id, &contact).await;

    let processed = worker.process_due_sends("default", 25).await.unwrap();
    assert_eq!(processed, 2);

    for id in [first.id, second.id] {
        let send = email_sends::Entity::find_by_id(id)
            .one(&*db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(send.status, "failed");
        let error = send.meta_value()["error"].as_str().unwrap().to_string();
        assert!(error.contains("502"));
    }
}

#[tokio::test]
async fn future_sends_stay_queued() {
    let gateway = MockServer::start().await;
    let db = test_db().await;
    let config = Arc::new(test_config(&gateway.uri()));
    let worker = DeliveryWorker::new(db.clone(), config).unwrap();

    let contact = insert_contact(&db).await;
    let campaign = insert_campaign(&db, "plain body").await;
    let mut send = email_sends::ActiveModel::new();
    send.workspace_id = Set("default".to_string());
    send.campaign_id = Set(campaign.id.clone());
    send.contact_id = Set(Some(contact.id.clone()));
    send.to_email = Set(contact.email.clone());
    send.subject = Set("Later".to_string());
    send.execute_at = Set(chrono::Utc::now().timestamp_micros() + 3_600_000_000);
    let send = send.insert(&*db).await.unwrap();

    let processed = worker.process_due_sends("default", 25).await.unwrap();
    assert_eq!(processed, 0);

    let reloaded = email_sends::Entity::find_by_id(send.id)
        .one(&*db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.status, "queued");
}
