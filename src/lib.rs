use std::sync::Arc;

pub mod api;
pub mod automation;
pub mod campaign;
pub mod config;
pub mod database;
pub mod email;
pub mod error;
pub mod pipeline;
pub mod segment;

pub use database::establish_connection;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<sea_orm::DatabaseConnection>,
    pub config: Arc<config::Config>,
    pub delivery: Arc<email::DeliveryWorker>,
}
