// ── Read-time schema migration ──
//
// Upgrades raw documents from older panel versions to the current
// section shapes. Pure and idempotent: `migrate(migrate(x)) == migrate(x)`.
// Nothing is written back until the next section update.

use serde_json::{Map, Value};
use strum::IntoEnumIterator;
use tracing::{debug, warn};

use crate::model::{Binding, ConfigDocument, Section, SectionUpdate, SensorBinding};

/// Keys that mark an object as a single binding rather than a section.
/// The current key comes first and wins when both are present.
const BINDING_KEYS: &[&str] = &["entityId", "entity_id"];

/// Bring a raw document up to the current shape.
///
/// Every known section ends up present, either migrated or synthesized
/// from the compiled-in defaults. Unknown top-level keys pass through.
pub fn migrate(raw: Value) -> Value {
    let mut doc = match raw {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            warn!(kind = json_kind(&other), "configuration document is not an object; using defaults");
            Map::new()
        }
    };

    let defaults = ConfigDocument::default();
    for section in Section::iter() {
        let key = section.key();
        let migrated = doc
            .remove(key)
            .and_then(|value| migrate_section(section, value))
            .unwrap_or_else(|| defaults.section_value(section));
        doc.insert(key.to_owned(), migrated);
    }

    Value::Object(doc)
}

/// Migrate a raw document and decode it.
///
/// In binding lists, entries that still fail to decode after migration
/// are dropped one by one. Any other section that fails is replaced by
/// its default rather than failing the whole document.
pub fn decode(raw: Value) -> ConfigDocument {
    let migrated = migrate(raw);
    match serde_json::from_value(migrated.clone()) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(error = %e, "configuration document did not decode; repairing per section");
            let Value::Object(mut map) = migrated else {
                return ConfigDocument::default();
            };
            let defaults = ConfigDocument::default();
            for section in Section::iter() {
                let Some(value) = map.get_mut(section.key()) else {
                    continue;
                };
                if SectionUpdate::decode(section, value.clone()).is_ok() {
                    continue;
                }
                prune_entries(section, value);
                if let Err(e) = SectionUpdate::decode(section, value.clone()) {
                    warn!(%section, error = %e, "dropping undecodable section");
                    *value = defaults.section_value(section);
                }
            }
            serde_json::from_value(Value::Object(map)).unwrap_or_default()
        }
    }
}

/// Upgrade one section value. `None` means "use the default".
pub fn migrate_section(section: Section, value: Value) -> Option<Value> {
    if value.is_null() {
        return None;
    }

    match section {
        Section::Climate | Section::Sensors | Section::Motors => binding_list(value),
        Section::WaterHeater => single_binding(value),
        Section::AmbientLighting => container(value, "switches"),
        Section::MediaPlayer | Section::Vacuum => container(value, "bindings"),
        Section::Widgets => widget_flags(value),
        Section::NavIcons => icon_list(value),
    }
}

// ── Rules ───────────────────────────────────────────────────────────

/// List of bindings. A single object becomes a one-element list.
fn binding_list(value: Value) -> Option<Value> {
    match value {
        Value::Array(items) => Some(Value::Array(
            items.into_iter().filter_map(binding_entry).collect(),
        )),
        Value::Object(_) => {
            debug!("wrapping legacy single binding into a list");
            Some(Value::Array(vec![value]))
        }
        Value::String(_) => Some(Value::Array(binding_entry(value).into_iter().collect())),
        _ => None,
    }
}

/// List entries: objects with the id key normalized, bare entity id
/// strings become bindings.
fn binding_entry(value: Value) -> Option<Value> {
    match value {
        Value::Object(map) => Some(Value::Object(normalize_binding(map))),
        Value::String(id) if !id.trim().is_empty() => Some(legacy_binding(id)),
        _ => None,
    }
}

fn single_binding(value: Value) -> Option<Value> {
    match value {
        Value::Object(map) => Some(Value::Object(normalize_binding(map))),
        Value::Array(items) => items
            .into_iter()
            .find_map(|item| match item {
                Value::Object(map) => Some(Value::Object(normalize_binding(map))),
                _ => None,
            }),
        Value::String(id) if !id.trim().is_empty() => Some(legacy_binding(id)),
        _ => None,
    }
}

/// A section object holding a binding list under `list_key`.
///
/// Accepts a bare list, a bare binding, or the object itself with a
/// non-list under `list_key`. The fields of a bare binding move into the
/// list; everything else (display style, preview fields) stays beside it.
fn container(value: Value, list_key: &str) -> Option<Value> {
    match value {
        Value::Array(_) | Value::String(_) => {
            let list = binding_list(value)?;
            let mut map = Map::new();
            map.insert(list_key.to_owned(), list);
            Some(Value::Object(map))
        }
        Value::Object(mut map) => {
            if let Some(list) = map.remove(list_key) {
                let list = binding_list(list).unwrap_or_else(|| Value::Array(Vec::new()));
                map.insert(list_key.to_owned(), list);
            } else if is_binding(&map) {
                debug!(list_key, "lifting legacy single binding into section list");
                let binding = take_binding(&mut map);
                map.insert(list_key.to_owned(), Value::Array(vec![Value::Object(binding)]));
            }
            Some(Value::Object(map))
        }
        _ => None,
    }
}

fn widget_flags(value: Value) -> Option<Value> {
    let Value::Object(map) = value else {
        return None;
    };
    let flags = map
        .into_iter()
        .filter_map(|(widget, flag)| {
            let enabled = match flag {
                Value::Bool(b) => b,
                Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
                Value::String(s) => match s.as_str() {
                    "true" | "on" | "1" => true,
                    "false" | "off" | "0" => false,
                    _ => return None,
                },
                _ => return None,
            };
            Some((widget, Value::Bool(enabled)))
        })
        .collect();
    Some(Value::Object(flags))
}

fn icon_list(value: Value) -> Option<Value> {
    let Value::Array(items) = value else {
        return None;
    };
    Some(Value::Array(
        items.into_iter().filter(Value::is_string).collect(),
    ))
}

// ── Helpers ─────────────────────────────────────────────────────────

fn is_binding(map: &Map<String, Value>) -> bool {
    BINDING_KEYS.iter().any(|k| map.contains_key(*k))
}

/// Move `name` and the entity id out of `map` into a fresh binding object.
fn take_binding(map: &mut Map<String, Value>) -> Map<String, Value> {
    let mut binding = Map::new();
    if let Some(name) = map.remove("name") {
        binding.insert("name".into(), name);
    }
    if let Some(id) = take_entity_id(map) {
        binding.insert("entityId".into(), id);
    }
    binding
}

/// Store the entity id under `entityId` only.
fn normalize_binding(mut map: Map<String, Value>) -> Map<String, Value> {
    if let Some(id) = take_entity_id(&mut map) {
        map.insert("entityId".into(), id);
    }
    map
}

/// Remove every id key, returning the first present in [`BINDING_KEYS`] order.
fn take_entity_id(map: &mut Map<String, Value>) -> Option<Value> {
    BINDING_KEYS
        .iter()
        .filter_map(|key| map.remove(*key))
        .reduce(|first, _| first)
}

/// Drop the entries of a binding list that do not decode.
fn prune_entries(section: Section, value: &mut Value) {
    let list = match section {
        Section::Climate | Section::Sensors | Section::Motors => Some(value),
        Section::AmbientLighting => value.get_mut("switches"),
        Section::MediaPlayer | Section::Vacuum => value.get_mut("bindings"),
        Section::WaterHeater | Section::Widgets | Section::NavIcons => None,
    };
    let Some(Value::Array(items)) = list else {
        return;
    };

    let before = items.len();
    items.retain(|item| {
        if section == Section::Sensors {
            serde_json::from_value::<SensorBinding>(item.clone()).is_ok()
        } else {
            serde_json::from_value::<Binding>(item.clone()).is_ok()
        }
    });
    let dropped = before - items.len();
    if dropped > 0 {
        warn!(%section, dropped, "dropping undecodable bindings");
    }
}

/// A binding for a bare entity id string. The id doubles as the label.
fn legacy_binding(id: String) -> Value {
    let mut binding = Map::new();
    binding.insert("name".into(), Value::String(id.clone()));
    binding.insert("entityId".into(), Value::String(id));
    Value::Object(binding)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
