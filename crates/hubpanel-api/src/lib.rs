// hubpanel-api: async HTTP clients for the automation hub and the settings server

pub mod error;
pub mod hub;
mod response;
pub mod settings;
pub mod transport;

pub use error::Error;
pub use hub::{HubClient, HubState};
pub use settings::SettingsClient;
pub use transport::{TlsMode, TransportConfig};
