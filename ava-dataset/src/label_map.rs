//! Action label maps (`label_map.txt`) and zero-based label conversion

use crate::error::{DatasetError, Result};
use avatrack::Detection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Names of the custom dataset's action ids (cumulative attribute-option ids)
pub const KNOWN_ACTIONS: &[(u32, &str)] = &[
    (1, "normal_walk"),
    (7, "multiple_items"),
    (12, "slow_walk"),
    (18, "talking_phone"),
    (25, "listening_music"),
    (32, "group_walking"),
    (39, "empty_hands"),
    (45, "food_drink"),
];

fn known_name(id: u32) -> String {
    KNOWN_ACTIONS
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("action_{}", id))
}

/// Ordered mapping of action id to action name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabelMap {
    entries: BTreeMap<u32, String>,
}

impl LabelMap {
    /// Build a map over the distinct labels, naming known ids
    pub fn from_labels<I: IntoIterator<Item = u32>>(labels: I) -> Result<Self> {
        let entries: BTreeMap<u32, String> = labels
            .into_iter()
            .map(|id| (id, known_name(id)))
            .collect();
        if entries.is_empty() {
            return Err(DatasetError::NoActionLabels);
        }
        log::info!(
            "Found {} unique action labels: {:?}",
            entries.len(),
            entries.keys().collect::<Vec<_>>()
        );
        Ok(Self { entries })
    }

    /// Build a map over the action labels used in `records`
    pub fn from_records(records: &[Detection]) -> Result<Self> {
        Self::from_labels(records.iter().map(|r| r.action_label))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        self.entries.get(&id).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.entries.iter().map(|(id, name)| (*id, name.as_str()))
    }

    /// Render as `"{id}: {name}"` lines
    pub fn to_text(&self) -> String {
        self.iter()
            .map(|(id, name)| format!("{}: {}\n", id, name))
            .collect()
    }

    /// Parse `"{id}: {name}"` lines; blank lines are ignored
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let (id, name) = line
                .split_once(':')
                .ok_or_else(|| DatasetError::invalid_label(format!("missing ':' in {:?}", line)))?;
            let id: u32 = id
                .trim()
                .parse()
                .map_err(|_| DatasetError::invalid_label(format!("bad id in {:?}", line)))?;
            entries.insert(id, name.trim().to_string());
        }
        if entries.is_empty() {
            return Err(DatasetError::NoActionLabels);
        }
        Ok(Self { entries })
    }

    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DatasetError::MissingInput(path.to_path_buf()));
        }
        Self::parse(&fs::read_to_string(path)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_text())?;
        log::info!("Wrote label map with {} entries to {}", self.len(), path.display());
        Ok(())
    }

    /// Shift every id down by one for loaders that index actions from 0
    pub fn to_zero_based(&self) -> Result<Self> {
        if self.entries.contains_key(&0) {
            return Err(DatasetError::invalid_label(
                "label map already contains id 0",
            ));
        }
        Ok(Self {
            entries: self
                .entries
                .iter()
                .map(|(id, name)| (id - 1, name.clone()))
                .collect(),
        })
    }
}

/// Shift every record's action label down by one
///
/// All-or-nothing: a label of 0 rejects the whole batch unchanged.
pub fn shift_action_labels_to_zero_based(records: &mut [Detection]) -> Result<()> {
    if let Some(record) = records.iter().find(|r| r.action_label == 0) {
        return Err(DatasetError::invalid_label(format!(
            "action label 0 at {} cannot be shifted",
            record.position()
        )));
    }
    for record in records.iter_mut() {
        record.action_label -= 1;
    }
    Ok(())
}
