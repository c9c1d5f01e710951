//! Time-series recording for every tracked entity in a simulation.

use std::collections::BTreeMap;

use crate::{Result, SimulationError};

/// Kind of entity registered with the history store.
///
/// Used to tell apart a genuine duplicate (two species named "cl") from a
/// cross-kind collision (a species and a channel both named "cl").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Simulation,
    Vesicle,
    Exterior,
    IonSpecies,
    IonChannel,
}

impl EntityKind {
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Simulation => "simulation",
            EntityKind::Vesicle => "vesicle",
            EntityKind::Exterior => "exterior",
            EntityKind::IonSpecies => "ion species",
            EntityKind::IonChannel => "ion channel",
        }
    }
}

/// An entity whose state is sampled once per integrator step.
///
/// `tracked_fields` is fixed for the lifetime of the entity and
/// `snapshot_values` must return one value per field, in the same order.
pub trait Trackable {
    fn display_name(&self) -> &str;
    fn kind(&self) -> EntityKind;
    fn tracked_fields(&self) -> &'static [&'static str];
    fn snapshot_values(&self) -> Vec<f64>;
}

/// Registry of tracked entities plus their append-only time series.
///
/// Series are keyed `<display_name>_<field>`. Registration preallocates an
/// empty series per field; every snapshot appends exactly one sample to each
/// registered series, so all series always share the same length.
#[derive(Debug, Default, Clone)]
pub struct HistoryStore {
    registered: BTreeMap<String, EntityKind>,
    series: BTreeMap<String, Vec<f64>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity under its display name.
    ///
    /// Fails when the name is taken, whether by another entity of the same
    /// kind or by one of a different kind.
    pub fn register(&mut self, entity: &dyn Trackable) -> Result<()> {
        self.register_fields(entity.display_name(), entity.kind(), entity.tracked_fields())
    }

    /// Register by parts; used by the simulation for its own fields.
    pub fn register_fields(
        &mut self,
        name: &str,
        kind: EntityKind,
        fields: &[&'static str],
    ) -> Result<()> {
        if let Some(&existing) = self.registered.get(name) {
            return Err(SimulationError::NameConflict {
                name: name.to_string(),
                existing: existing.label(),
                requested: kind.label(),
            });
        }
        self.registered.insert(name.to_string(), kind);
        for field in fields {
            self.series.insert(format!("{name}_{field}"), Vec::new());
        }
        Ok(())
    }

    /// Append one sample per field for a single entity.
    pub fn append_entity(&mut self, entity: &dyn Trackable) {
        let name = entity.display_name();
        let values = entity.snapshot_values();
        self.append(name, entity.tracked_fields(), &values);
    }

    /// Append raw values for a registered name; one value per field.
    pub fn append(&mut self, name: &str, fields: &[&'static str], values: &[f64]) {
        debug_assert_eq!(fields.len(), values.len());
        for (field, value) in fields.iter().zip(values) {
            if let Some(series) = self.series.get_mut(&format!("{name}_{field}")) {
                series.push(*value);
            }
        }
    }

    /// Number of snapshots recorded so far.
    pub fn snapshot_count(&self) -> usize {
        self.series.values().next().map_or(0, Vec::len)
    }

    /// All series, keyed `<display_name>_<field>`.
    pub fn series(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.series
    }

    pub fn get(&self, key: &str) -> Option<&[f64]> {
        self.series.get(key).map(Vec::as_slice)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registered.contains_key(name)
    }

    /// Clear every series but keep registrations. Used before a re-run.
    pub fn flush(&mut self) {
        for series in self.series.values_mut() {
            series.clear();
        }
    }

    /// Drop all registrations and series.
    pub fn reset(&mut self) {
        self.registered.clear();
        self.series.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe {
        name: &'static str,
        kind: EntityKind,
        value: f64,
    }

    impl Trackable for Probe {
        fn display_name(&self) -> &str {
            self.name
        }

        fn kind(&self) -> EntityKind {
            self.kind
        }

        fn tracked_fields(&self) -> &'static [&'static str] {
            &["value"]
        }

        fn snapshot_values(&self) -> Vec<f64> {
            vec![self.value]
        }
    }

    #[test]
    fn duplicate_name_same_kind_is_rejected() {
        let mut store = HistoryStore::new();
        let a = Probe { name: "cl", kind: EntityKind::IonSpecies, value: 1.0 };
        let b = Probe { name: "cl", kind: EntityKind::IonSpecies, value: 2.0 };
        store.register(&a).unwrap();
        let err = store.register(&b).unwrap_err();
        assert!(matches!(err, SimulationError::NameConflict { .. }));
    }

    #[test]
    fn cross_kind_collision_reports_both_kinds() {
        let mut store = HistoryStore::new();
        let species = Probe { name: "cl", kind: EntityKind::IonSpecies, value: 1.0 };
        let channel = Probe { name: "cl", kind: EntityKind::IonChannel, value: 2.0 };
        store.register(&species).unwrap();
        match store.register(&channel).unwrap_err() {
            SimulationError::NameConflict { existing, requested, .. } => {
                assert_eq!(existing, "ion species");
                assert_eq!(requested, "ion channel");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn snapshots_keep_series_aligned() {
        let mut store = HistoryStore::new();
        let mut probe = Probe { name: "x", kind: EntityKind::IonSpecies, value: 0.0 };
        store.register(&probe).unwrap();
        for i in 0..5 {
            probe.value = i as f64;
            store.append_entity(&probe);
        }
        assert_eq!(store.snapshot_count(), 5);
        assert_eq!(store.get("x_value").unwrap(), &[0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn flush_keeps_registrations() {
        let mut store = HistoryStore::new();
        let probe = Probe { name: "x", kind: EntityKind::IonSpecies, value: 1.0 };
        store.register(&probe).unwrap();
        store.append_entity(&probe);
        store.flush();
        assert_eq!(store.snapshot_count(), 0);
        assert!(store.is_registered("x"));
        assert!(store.get("x_value").is_some());
    }

    #[test]
    fn reset_drops_everything() {
        let mut store = HistoryStore::new();
        let probe = Probe { name: "x", kind: EntityKind::IonSpecies, value: 1.0 };
        store.register(&probe).unwrap();
        store.reset();
        assert!(!store.is_registered("x"));
        assert!(store.get("x_value").is_none());
    }
}
