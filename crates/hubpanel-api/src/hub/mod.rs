mod client;
pub mod models;

pub use client::HubClient;
pub use models::HubState;
