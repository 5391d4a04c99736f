// hubpanel-core: configuration sync and entity polling between hubpanel-api and widgets.
//
// `ConfigStore` keeps the panel configuration in step with the settings
// server (mirror and default fallbacks, read-time migration, serialized
// section writes). `EntityPoller` refreshes entity state for every
// subscribed widget from one scheduler. `ChangeBus` tells widgets which
// configuration section changed.

pub mod bus;
pub mod config;
pub mod convert;
pub mod error;
pub mod migrate;
pub mod model;
pub mod poller;
pub mod source;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bus::{BusSubscription, ChangeBus};
pub use config::{PollerConfig, StoreConfig};
pub use error::CoreError;
pub use poller::{EntityHealth, EntityPoller, SnapshotBroadcastStream, SnapshotStream};
pub use source::{EntityStateSource, FileMirror, LocalMirror, MemoryMirror, RemoteConfigClient};
pub use store::{ConfigSource, ConfigStore, Loaded, SyncState};

pub use model::{
    AmbientLighting, Binding, ConfigDocument, DeviceSection, DisplayStyle, EntityId,
    EntitySnapshot, Section, SectionUpdate, SensorBinding, SensorKind, SubscriptionId,
};
