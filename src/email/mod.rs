pub mod delivery;
pub mod error;
pub mod gateway;
pub mod render;
pub mod unsubscribe;

pub use delivery::DeliveryWorker;
pub use error::EmailError;
pub use render::Renderer;
