use crate::model::{field_metadata, ArchiveKind, DisplayProfile, FieldSet, FieldValue, ProfileKind};
use serde::Serialize;
use std::sync::Mutex;

/// External key-value store receiving published fields.
pub trait Sink: Send + Sync {
    /// Create `name` under `owner` or update it in place.
    fn upsert(&self, owner: &str, name: &str, value: &FieldValue, position: usize);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub owner: String,
    pub name: String,
    pub value: FieldValue,
    pub position: usize,
    pub profile: ProfileKind,
    pub display: Option<DisplayProfile>,
    pub archive: ArchiveKind,
}

/// In-process sink; one entry per owner and field name.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<Entry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries ordered by owner and position.
    pub fn entries(&self) -> Vec<Entry> {
        let mut entries = self
            .entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default();
        entries.sort_by(|a, b| a.owner.cmp(&b.owner).then(a.position.cmp(&b.position)));
        entries
    }

    pub fn get(&self, owner: &str, name: &str) -> Option<Entry> {
        self.entries
            .lock()
            .ok()?
            .iter()
            .find(|e| e.owner == owner && e.name == name)
            .cloned()
    }
}

impl Sink for MemorySink {
    fn upsert(&self, owner: &str, name: &str, value: &FieldValue, position: usize) {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(_) => {
                log::error!("Sink lock poisoned, dropping {}", name);
                return;
            }
        };

        match entries
            .iter_mut()
            .find(|e| e.owner == owner && e.name == name)
        {
            Some(entry) => {
                entry.value = value.clone();
                entry.position = position;
            }
            None => {
                let metadata = field_metadata(name);
                entries.push(Entry {
                    owner: owner.to_owned(),
                    name: name.to_owned(),
                    value: value.clone(),
                    position,
                    profile: metadata.profile,
                    display: metadata.profile.display_profile(),
                    archive: metadata.archive,
                });
            }
        }
    }
}

/// Write `fields` in insertion order at positions starting from `offset`.
pub fn publish(sink: &dyn Sink, owner: &str, fields: FieldSet, offset: usize) {
    for (position, (name, value)) in (offset..).zip(fields.iter()) {
        sink.upsert(owner, name, value, position);
    }
}
