// ── Panel configuration document ──
//
// One JSON document per identity, made of independently shaped
// sections. Sections are only ever replaced whole.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

use super::EntityId;
use crate::error::CoreError;

// ── Bindings ────────────────────────────────────────────────────────

/// A widget slot bound (or not yet bound) to a hub entity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    /// Display label.
    #[serde(default)]
    pub name: String,
    /// `None` until the user picks an entity. Blank strings read as `None`.
    #[serde(default, alias = "entity_id", deserialize_with = "blank_as_none")]
    pub entity_id: Option<EntityId>,
}

impl Binding {
    pub fn new(name: impl Into<String>, entity_id: impl Into<EntityId>) -> Self {
        Self {
            name: name.into(),
            entity_id: Some(entity_id.into()),
        }
    }

    pub fn unset(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_id: None,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.entity_id.is_some()
    }
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<EntityId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .filter(|s| !s.trim().is_empty())
        .map(EntityId::from))
}

/// What a sensor binding measures; drives unit and icon choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SensorKind {
    Temperature,
    Humidity,
    Power,
    Energy,
    Battery,
    #[default]
    #[serde(other)]
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SensorBinding {
    #[serde(flatten)]
    pub binding: Binding,
    #[serde(default)]
    pub kind: SensorKind,
}

// ── Sections ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DisplayStyle {
    Detailed,
    Icons,
    #[default]
    #[serde(other)]
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AmbientLighting {
    pub switches: Vec<Binding>,
    pub display_style: DisplayStyle,
}

/// Media player / vacuum style section: device bindings plus whatever
/// preview fields the widget keeps alongside them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSection {
    pub bindings: Vec<Binding>,
    #[serde(flatten)]
    pub preview: Map<String, Value>,
}

/// Names of the document's sections. The camelCase form is both the JSON
/// key and the change-bus topic.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    IntoStaticStr,
)]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
pub enum Section {
    AmbientLighting,
    Climate,
    WaterHeater,
    Sensors,
    Motors,
    MediaPlayer,
    Vacuum,
    Widgets,
    NavIcons,
}

impl Section {
    /// JSON key of this section.
    pub fn key(self) -> &'static str {
        self.into()
    }

    /// Change-bus topic published when this section is replaced.
    pub fn topic(self) -> &'static str {
        self.key()
    }
}

// ── ConfigDocument ──────────────────────────────────────────────────

/// Widgets shown on a fresh panel, in display order.
pub const DEFAULT_WIDGETS: &[&str] = &[
    "ambientLighting",
    "climate",
    "waterHeater",
    "sensors",
    "motors",
    "mediaPlayer",
    "vacuum",
];

/// Navigation icons of a fresh panel, in display order.
pub const DEFAULT_NAV_ICONS: &[&str] = &["home", "climate", "lighting", "media", "sensors", "settings"];

/// The whole panel configuration of one identity.
///
/// Top-level keys this version does not know are kept in `extra` and
/// written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigDocument {
    pub ambient_lighting: AmbientLighting,
    pub climate: Vec<Binding>,
    pub water_heater: Binding,
    pub sensors: Vec<SensorBinding>,
    pub motors: Vec<Binding>,
    pub media_player: DeviceSection,
    pub vacuum: DeviceSection,
    pub widgets: BTreeMap<String, bool>,
    pub nav_icons: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self {
            ambient_lighting: AmbientLighting::default(),
            climate: Vec::new(),
            water_heater: Binding::unset("Water heater"),
            sensors: Vec::new(),
            motors: Vec::new(),
            media_player: DeviceSection::default(),
            vacuum: DeviceSection::default(),
            widgets: DEFAULT_WIDGETS
                .iter()
                .map(|w| ((*w).to_owned(), true))
                .collect(),
            nav_icons: DEFAULT_NAV_ICONS.iter().map(|s| (*s).to_owned()).collect(),
            extra: Map::new(),
        }
    }
}

impl ConfigDocument {
    /// A copy of this document with one section replaced.
    #[must_use]
    pub fn with_section(&self, update: SectionUpdate) -> Self {
        let mut next = self.clone();
        update.apply(&mut next);
        next
    }

    /// JSON value of one section.
    pub fn section_value(&self, section: Section) -> Value {
        let value = match section {
            Section::AmbientLighting => serde_json::to_value(&self.ambient_lighting),
            Section::Climate => serde_json::to_value(&self.climate),
            Section::WaterHeater => serde_json::to_value(&self.water_heater),
            Section::Sensors => serde_json::to_value(&self.sensors),
            Section::Motors => serde_json::to_value(&self.motors),
            Section::MediaPlayer => serde_json::to_value(&self.media_player),
            Section::Vacuum => serde_json::to_value(&self.vacuum),
            Section::Widgets => serde_json::to_value(&self.widgets),
            Section::NavIcons => serde_json::to_value(&self.nav_icons),
        };
        value.unwrap_or_default()
    }

    /// The whole document as JSON, ready for the remote store or mirror.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Every configured entity id across all binding sections.
    pub fn bound_entities(&self) -> Vec<EntityId> {
        let bindings = self
            .ambient_lighting
            .switches
            .iter()
            .chain(&self.climate)
            .chain(std::iter::once(&self.water_heater))
            .chain(self.sensors.iter().map(|s| &s.binding))
            .chain(&self.motors)
            .chain(&self.media_player.bindings)
            .chain(&self.vacuum.bindings);

        let mut ids: Vec<EntityId> = bindings.filter_map(|b| b.entity_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn is_widget_enabled(&self, widget: &str) -> bool {
        self.widgets.get(widget).copied().unwrap_or(false)
    }
}

// ── Section updates ─────────────────────────────────────────────────

/// A full replacement value for one section.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionUpdate {
    AmbientLighting(AmbientLighting),
    Climate(Vec<Binding>),
    WaterHeater(Binding),
    Sensors(Vec<SensorBinding>),
    Motors(Vec<Binding>),
    MediaPlayer(DeviceSection),
    Vacuum(DeviceSection),
    Widgets(BTreeMap<String, bool>),
    NavIcons(Vec<String>),
}

impl SectionUpdate {
    pub fn section(&self) -> Section {
        match self {
            Self::AmbientLighting(_) => Section::AmbientLighting,
            Self::Climate(_) => Section::Climate,
            Self::WaterHeater(_) => Section::WaterHeater,
            Self::Sensors(_) => Section::Sensors,
            Self::Motors(_) => Section::Motors,
            Self::MediaPlayer(_) => Section::MediaPlayer,
            Self::Vacuum(_) => Section::Vacuum,
            Self::Widgets(_) => Section::Widgets,
            Self::NavIcons(_) => Section::NavIcons,
        }
    }

    /// Parse an untyped section value. Legacy shapes are upgraded first,
    /// so anything `load()` would accept is accepted here too.
    pub fn from_json(section: Section, value: Value) -> Result<Self, CoreError> {
        let value = crate::migrate::migrate_section(section, value)
            .unwrap_or_else(|| ConfigDocument::default().section_value(section));
        Self::decode(section, value).map_err(|e| CoreError::Validation {
            message: format!("invalid value for section '{section}': {e}"),
        })
    }

    /// Strict decode of an already-migrated section value.
    pub(crate) fn decode(section: Section, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match section {
            Section::AmbientLighting => Self::AmbientLighting(serde_json::from_value(value)?),
            Section::Climate => Self::Climate(serde_json::from_value(value)?),
            Section::WaterHeater => Self::WaterHeater(serde_json::from_value(value)?),
            Section::Sensors => Self::Sensors(serde_json::from_value(value)?),
            Section::Motors => Self::Motors(serde_json::from_value(value)?),
            Section::MediaPlayer => Self::MediaPlayer(serde_json::from_value(value)?),
            Section::Vacuum => Self::Vacuum(serde_json::from_value(value)?),
            Section::Widgets => Self::Widgets(serde_json::from_value(value)?),
            Section::NavIcons => Self::NavIcons(serde_json::from_value(value)?),
        })
    }

    fn apply(self, doc: &mut ConfigDocument) {
        match self {
            Self::AmbientLighting(v) => doc.ambient_lighting = v,
            Self::Climate(v) => doc.climate = v,
            Self::WaterHeater(v) => doc.water_heater = v,
            Self::Sensors(v) => doc.sensors = v,
            Self::Motors(v) => doc.motors = v,
            Self::MediaPlayer(v) => doc.media_player = v,
            Self::Vacuum(v) => doc.vacuum = v,
            Self::Widgets(v) => doc.widgets = v,
            Self::NavIcons(v) => doc.nav_icons = v,
        }
    }
}
