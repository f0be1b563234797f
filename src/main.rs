use std::sync::Arc;

use axum::http::Method;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use flowmail::automation::{executor, scanner};
use flowmail::campaign::scheduler;
use flowmail::config::Config;
use flowmail::database::{establish_connection, list_workspaces};
use flowmail::email::DeliveryWorker;
use flowmail::pipeline::{best_time, lead_score};
use flowmail::{api, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!("Starting FlowMail on port {}", config.port);

    let db = Arc::new(establish_connection(&config.database_url).await?);
    let config = Arc::new(config);
    let delivery = Arc::new(DeliveryWorker::new(db.clone(), config.clone())?);

    // Background worker loops. External cron can still drive the same
    // work through the /workers endpoints; both paths serialize through
    // the store, so overlap is safe.
    spawn_delivery_loop(db.clone(), config.clone(), delivery.clone());
    spawn_pipeline_loop(db.clone(), config.clone());
    spawn_automation_loop(db.clone(), config.clone());
    spawn_scheduler_loop(db.clone(), config.clone());

    let state = AppState {
        db,
        config: config.clone(),
        delivery,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let app = api::create_router().layer(cors).with_state(state);

    let listener = TcpListener::bind(&format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!("FlowMail listening on http://0.0.0.0:{}", config.port);

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        tracing::info!("Received shutdown signal");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    tracing::info!("FlowMail shutdown complete");
    Ok(())
}

fn spawn_delivery_loop(
    db: Arc<sea_orm::DatabaseConnection>,
    config: Arc<Config>,
    delivery: Arc<DeliveryWorker>,
) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(config.ticks.delivery_secs));
        tracing::info!("Email delivery loop started");

        loop {
            interval.tick().await;
            let workspaces = match list_workspaces(&db).await {
                Ok(workspaces) => workspaces,
                Err(e) => {
                    tracing::error!("Could not list workspaces for delivery: {}", e);
                    continue;
                }
            };
            for workspace_id in workspaces {
                match delivery
                    .process_due_sends(&workspace_id, flowmail::email::delivery::MAX_DELIVERY_BATCH)
                    .await
                {
                    Ok(0) => {}
                    Ok(processed) => {
                        tracing::debug!("Delivered {} sends for {}", processed, workspace_id)
                    }
                    Err(e) => tracing::error!("Delivery loop error for {}: {}", workspace_id, e),
                }
            }
        }
    });
}

fn spawn_pipeline_loop(db: Arc<sea_orm::DatabaseConnection>, config: Arc<Config>) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(config.ticks.pipeline_secs));
        tracing::info!("Event pipeline loop started (lead score + best time)");

        loop {
            interval.tick().await;
            let workspaces = match list_workspaces(&db).await {
                Ok(workspaces) => workspaces,
                Err(e) => {
                    tracing::error!("Could not list workspaces for pipeline: {}", e);
                    continue;
                }
            };
            for workspace_id in workspaces {
                if let Err(e) =
                    lead_score::run(&db, &workspace_id, lead_score::MAX_LEAD_SCORE_LIMIT).await
                {
                    tracing::error!("Lead score loop error for {}: {}", workspace_id, e);
                }
                if let Err(e) =
                    best_time::run(&db, &workspace_id, best_time::MAX_BEST_TIME_LIMIT).await
                {
                    tracing::error!("Best time loop error for {}: {}", workspace_id, e);
                }
            }
        }
    });
}

fn spawn_automation_loop(db: Arc<sea_orm::DatabaseConnection>, config: Arc<Config>) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(config.ticks.automation_secs));
        tracing::info!("Automation loop started (scanner + executor)");

        loop {
            interval.tick().await;
            let workspaces = match list_workspaces(&db).await {
                Ok(workspaces) => workspaces,
                Err(e) => {
                    tracing::error!("Could not list workspaces for automations: {}", e);
                    continue;
                }
            };
            for workspace_id in workspaces {
                if let Err(e) = scanner::run(&db, &workspace_id, scanner::MAX_SCAN_LIMIT).await {
                    tracing::error!("Trigger scan error for {}: {}", workspace_id, e);
                }
                if let Err(e) =
                    executor::run(&db, &config, &workspace_id, executor::MAX_EXECUTION_BATCH).await
                {
                    tracing::error!("Automation executor error for {}: {}", workspace_id, e);
                }
            }
        }
    });
}

fn spawn_scheduler_loop(db: Arc<sea_orm::DatabaseConnection>, config: Arc<Config>) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(config.ticks.scheduler_secs));
        tracing::info!("Campaign scheduler loop started");

        loop {
            interval.tick().await;
            let workspaces = match list_workspaces(&db).await {
                Ok(workspaces) => workspaces,
                Err(e) => {
                    tracing::error!("Could not list workspaces for scheduler: {}", e);
                    continue;
                }
            };
            for workspace_id in workspaces {
                match scheduler::run(
                    &db,
                    &workspace_id,
                    scheduler::MAX_SCHEDULES,
                    scheduler::MAX_RECIPIENTS,
                )
                .await
                {
                    Ok(0) => {}
                    Ok(processed) => {
                        tracing::info!("Processed {} schedules for {}", processed, workspace_id)
                    }
                    Err(e) => tracing::error!("Scheduler loop error for {}: {}", workspace_id, e),
                }
            }
        }
    });
}
