// ── Domain model ──
//
// Configuration document, bindings, and entity snapshots shared by the
// store, the poller, and every consumer.

pub mod document;
pub mod entity_id;
pub mod snapshot;

pub use document::{
    AmbientLighting, Binding, ConfigDocument, DEFAULT_NAV_ICONS, DEFAULT_WIDGETS, DeviceSection,
    DisplayStyle, Section, SectionUpdate, SensorBinding, SensorKind,
};
pub use entity_id::{EntityId, SubscriptionId};
pub use snapshot::EntitySnapshot;
