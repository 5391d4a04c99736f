// ── API-to-domain type conversions ──
//
// Bridges `hubpanel_api` wire types into `hubpanel_core::model`. Missing
// timestamps are filled with the receive time so staleness math always
// has something to work with.

use chrono::Utc;

use hubpanel_api::HubState;

use crate::model::EntitySnapshot;

impl From<HubState> for EntitySnapshot {
    fn from(state: HubState) -> Self {
        let fetched_at = Utc::now();
        let last_updated = state.last_updated.unwrap_or(fetched_at);
        Self {
            entity_id: state.entity_id.into(),
            state: state.state,
            attributes: state.attributes,
            last_changed: state.last_changed.unwrap_or(last_updated),
            last_updated,
            fetched_at,
        }
    }
}
