use axum_test::TestServer;
use sea_orm::{ActiveModelBehavior, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use std::sync::Arc;

use flowmail::config::{Config, TickConfig};
use flowmail::database::{campaigns, contacts, email_sends, establish_connection};
use flowmail::email::DeliveryWorker;
use flowmail::{api, AppState};

fn test_config(runner_token: Option<&str>) -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        port: 0,
        mail_gateway_url: "http://gateway.invalid".to_string(),
        mail_gateway_token: None,
        public_base_url: None,
        unsubscribe_signing_key: None,
        default_from_email: "hello@test.local".to_string(),
        default_from_name: "Test".to_string(),
        team_notify_email: None,
        runner_token: runner_token.map(|t| t.to_string()),
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

async fn test_server(runner_token: Option<&str>) -> (TestServer, AppState) {
    let db = Arc::new(
        establish_connection("sqlite::memory:")
            .await
            .expect("Failed to connect to database"),
    );
    let config = Arc::new(test_config(runner_token));
    let delivery = Arc::new(DeliveryWorker::new(db.clone(), config.clone()).unwrap());
    let state = AppState {
        db,
        config,
        delivery,
    };
    let app = api::create_router().with_state(state.clone());
    (TestServer::new(app).unwrap(), state)
}

async fn insert_campaign(state: &AppState) -> campaigns::Model {
    let mut campaign = campaigns::ActiveModel::new();
    campaign.workspace_id = Set("default".to_string());
    campaign.name = Set("Launch".to_string());
    campaign.subject = Set(Some("Big news".to_string()));
    campaign.body = Set(Some("Hello {{firstName}}".to_string()));
    campaign.insert(&*state.db).await.unwrap()
}

async fn insert_contact(state: &AppState, email: &str, unsubscribed: bool) -> contacts::Model {
    let mut contact = contacts::ActiveModel::new();
    contact.workspace_id = Set("default".to_string());
    contact.email = Set(email.to_string());
    contact.unsubscribed = Set(unsubscribed);
    contact.insert(&*state.db).await.unwrap()
}

#[tokio::test]
async fn send_campaign_skips_ineligible_contacts() {
    let (server, state) = test_server(None).await;
    let campaign = insert_campaign(&state).await;
    insert_contact(&state, "gone@example.com", true).await;

    let response = server
        .post("/send/campaign")
        .json(&serde_json::json!({ "campaignId": campaign.id }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["queued"], 0);

    assert!(email_sends::Entity::find()
        .all(&*state.db)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn send_campaign_queues_eligible_and_marks_sent() {
    let (server, state) = test_server(None).await;
    let campaign = insert_campaign(&state).await;
    insert_contact(&state, "ada@example.com", false).await;
    insert_contact(&state, "grace@example.com", false).await;

    let response = server
        .post("/send/campaign")
        .json(&serde_json::json!({ "campaignId": campaign.id }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["queued"], 2);

    let sends = email_sends::Entity::find()
        .filter(email_sends::Column::CampaignId.eq(campaign.id.clone()))
        .all(&*state.db)
        .await
        .unwrap();
    assert_eq!(sends.len(), 2);
    assert!(sends.iter().all(|s| s.subject == "Big news"));
    assert!(sends.iter().all(|s| s.schedule_id.is_none()));

    let reloaded = campaigns::Entity::find_by_id(campaign.id.clone())
        .one(&*state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.status, "Sent");
}

#[tokio::test]
async fn send_campaign_dry_run_inserts_nothing() {
    let (server, state) = test_server(None).await;
    let campaign = insert_campaign(&state).await;
    insert_contact(&state, "ada@example.com", false).await;

    let response = server
        .post("/send/campaign")
        .json(&serde_json::json!({ "campaignId": campaign.id, "dryRun": true }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["dryRun"], true);
    assert_eq!(body["eligible"], 1);

    assert!(email_sends::Entity::find()
        .all(&*state.db)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn send_campaign_requires_campaign_id() {
    let (server, _state) = test_server(None).await;
    let response = server.post("/send/campaign").json(&serde_json::json!({})).await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn send_campaign_unknown_id_is_404() {
    let (server, _state) = test_server(None).await;
    let response = server
        .post("/send/campaign")
        .json(&serde_json::json!({ "campaignId": "missing" }))
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn bulk_send_queues_against_well_known_campaign() {
    let (server, state) = test_server(None).await;
    insert_contact(&state, "ada@example.com", false).await;
    insert_contact(&state, "gone@example.com", true).await;

    let response = server
        .post("/send/bulk")
        .json(&serde_json::json!({
            "subject": "Heads up",
            "body": "Short notice"
        }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["queued"], 1);

    let sends = email_sends::Entity::find().all(&*state.db).await.unwrap();
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].to_email, "ada@example.com");

    let bulk_campaign = campaigns::Entity::find()
        .filter(campaigns::Column::Name.eq("bulk_email"))
        .one(&*state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sends[0].campaign_id, bulk_campaign.id);
    assert_eq!(sends[0].meta_value()["source"], "bulk");
}

#[tokio::test]
async fn bulk_send_validates_subject_and_body() {
    let (server, _state) = test_server(None).await;
    let response = server
        .post("/send/bulk")
        .json(&serde_json::json!({ "subject": "", "body": "x" }))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn automation_worker_requires_runner_token_when_configured() {
    let (server, _state) = test_server(Some("sekrit")).await;

    let response = server
        .post("/workers/automation-run")
        .json(&serde_json::json!({}))
        .await;
    assert_eq!(response.status_code(), 401);

    let response = server
        .post("/workers/automation-run")
        .add_header(
            axum::http::HeaderName::from_static("x-flowmail-runner-token"),
            axum::http::HeaderValue::from_static("sekrit"),
        )
        .json(&serde_json::json!({}))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn worker_endpoints_report_zero_on_empty_window() {
    let (server, _state) = test_server(None).await;

    for path in ["/workers/lead-score", "/workers/best-time", "/workers/automation-scan"] {
        let response = server.post(path).json(&serde_json::json!({})).await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["processedEvents"], 0, "{path}");
    }

    let response = server
        .post("/workers/campaign-schedule")
        .json(&serde_json::json!({}))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["processed"], 0);
}
