use num_derive::FromPrimitive;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Field names published by the update flows.
pub mod field {
    pub const PROVIDER: &str = "Provider";
    pub const BASE_PRICE: &str = "Base Price";
    pub const PRICE_PER_KWH: &str = "Price per kWh";
    pub const CURRENT_PRICE: &str = "Current Price";
    pub const METER_READING: &str = "Meter Reading";
    pub const POWER: &str = "Power";
    pub const POWER_L1: &str = "Power L1";
    pub const POWER_L2: &str = "Power L2";
    pub const POWER_L3: &str = "Power L3";
}

/// Position offset of tariff fields in the sink.
pub const TARIFF_POSITION_OFFSET: usize = 0;
/// Position offset of reading fields in the sink.
pub const READINGS_POSITION_OFFSET: usize = 10;

/// Logical resource names advertised by the discovery document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    CurrentReadings,
    Consumption,
    Profile,
    ConsumptionCurrentMonth,
}

impl Resource {
    pub const ALL: [Resource; 4] = [
        Resource::CurrentReadings,
        Resource::Consumption,
        Resource::Profile,
        Resource::ConsumptionCurrentMonth,
    ];

    /// Key of the resource inside `_links`.
    pub fn name(self) -> &'static str {
        match self {
            Resource::CurrentReadings => "currentReadings",
            Resource::Consumption => "consumption",
            Resource::Profile => "profile",
            Resource::ConsumptionCurrentMonth => "consumptionCurrentMonth",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved links of a single discovery request.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResourceLinks(HashMap<Resource, String>);

impl ResourceLinks {
    pub fn insert(&mut self, resource: Resource, href: String) {
        self.0.insert(resource, href);
    }

    pub fn get(&self, resource: Resource) -> Option<&str> {
        self.0.get(&resource).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_owned())
    }
}

/// Insertion-ordered set of extracted fields of one update cycle.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FieldSet {
    fields: Vec<(String, FieldValue)>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value` under `name`. An existing field keeps its position.
    pub fn insert<V: Into<FieldValue>>(&mut self, name: &str, value: V) {
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value,
            None => self.fields.push((name.to_owned(), value)),
        }
    }

    /// Inserts only present values; absent ones leave no trace in the set.
    pub fn insert_opt<V: Into<FieldValue>>(&mut self, name: &str, value: Option<V>) {
        if let Some(value) = value {
            self.insert(name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for FieldSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProfileKind {
    Watt,
    #[serde(rename = "kWh")]
    KWh,
    Price,
    FreeText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    /// Latest value overwrites.
    Default,
    /// Monotonically accumulating counter.
    Counter,
}

/// Formatting applied to a sink entry when it is first created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayProfile {
    pub digits: u8,
    pub suffix: &'static str,
    pub icon: &'static str,
}

impl ProfileKind {
    pub fn display_profile(self) -> Option<DisplayProfile> {
        match self {
            ProfileKind::Watt => Some(DisplayProfile {
                digits: 0,
                suffix: " W",
                icon: "Electricity",
            }),
            ProfileKind::KWh => Some(DisplayProfile {
                digits: 2,
                suffix: " kWh",
                icon: "Electricity",
            }),
            ProfileKind::Price => Some(DisplayProfile {
                digits: 4,
                suffix: " €",
                icon: "Euro",
            }),
            ProfileKind::FreeText => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMetadata {
    pub profile: ProfileKind,
    pub archive: ArchiveKind,
}

const FIELD_METADATA: &[(&str, ProfileKind, ArchiveKind)] = &[
    (field::BASE_PRICE, ProfileKind::Price, ArchiveKind::Default),
    (field::PRICE_PER_KWH, ProfileKind::Price, ArchiveKind::Default),
    (field::CURRENT_PRICE, ProfileKind::Price, ArchiveKind::Default),
    (field::METER_READING, ProfileKind::KWh, ArchiveKind::Counter),
    (field::POWER, ProfileKind::Watt, ArchiveKind::Default),
    (field::POWER_L1, ProfileKind::Watt, ArchiveKind::Default),
    (field::POWER_L2, ProfileKind::Watt, ArchiveKind::Default),
    (field::POWER_L3, ProfileKind::Watt, ArchiveKind::Default),
    (field::PROVIDER, ProfileKind::FreeText, ArchiveKind::Default),
];

/// Look up display and archive kinds of `name`. Unknown names are free text.
pub fn field_metadata(name: &str) -> FieldMetadata {
    FIELD_METADATA
        .iter()
        .find(|(n, _, _)| *n == name)
        .map(|(_, profile, archive)| FieldMetadata {
            profile: *profile,
            archive: *archive,
        })
        .unwrap_or(FieldMetadata {
            profile: ProfileKind::FreeText,
            archive: ArchiveKind::Default,
        })
}

/// Instance status codes of the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum InstanceStatus {
    Active = 102,
    Inactive = 104,
    AuthError = 201,
}

impl InstanceStatus {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            InstanceStatus::Active => "active",
            InstanceStatus::Inactive => "inactive",
            InstanceStatus::AuthError => "authentication error",
        }
    }
}
