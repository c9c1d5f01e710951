//! The binding map between ion species and channels.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Binding map: primary species name → ordered list of
/// (channel name, optional secondary species name).
///
/// The map is pure configuration. It is consulted exactly once, at
/// simulation construction, where every entry is resolved into arena
/// indices; afterwards the inner loop performs no name lookups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IonChannelsLink {
    links: BTreeMap<String, Vec<(String, Option<String>)>>,
}

impl IonChannelsLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding; an existing entry for the same channel under the same
    /// species is replaced.
    pub fn add_link(
        &mut self,
        species_name: &str,
        channel_name: &str,
        secondary_species_name: Option<&str>,
    ) {
        if species_name.is_empty() || channel_name.is_empty() {
            return;
        }
        let entries = self.links.entry(species_name.to_string()).or_default();
        entries.retain(|(channel, _)| channel != channel_name);
        entries.push((
            channel_name.to_string(),
            secondary_species_name.map(str::to_string),
        ));
    }

    /// Remove a binding; empty species entries are dropped.
    pub fn remove_link(&mut self, species_name: &str, channel_name: &str) {
        if let Some(entries) = self.links.get_mut(species_name) {
            entries.retain(|(channel, _)| channel != channel_name);
            if entries.is_empty() {
                self.links.remove(species_name);
            }
        }
    }

    pub fn clear(&mut self) {
        self.links.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&String, &Vec<(String, Option<String>)>)> {
        self.links.iter()
    }

    pub fn links_for(&self, species_name: &str) -> &[(String, Option<String>)] {
        self.links.get(species_name).map_or(&[], Vec::as_slice)
    }
}
