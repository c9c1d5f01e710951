//! On-disk history output: a metadata record plus per-series binary arrays.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use vesicle_core::HistoryStore;

/// Describes one saved run; written as `metadata.json` next to `series/`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryMetadata {
    pub count: usize,
    pub time_step: f64,
    pub total_time: f64,
    pub series: Vec<String>,
}

/// Write every recorded series to `<dir>/series/<name>.bin` and the
/// metadata record to `<dir>/metadata.json`.
pub fn write_histories(
    dir: &Path,
    histories: &HistoryStore,
    time_step: f64,
    total_time: f64,
) -> Result<()> {
    let series_dir = dir.join("series");
    fs::create_dir_all(&series_dir)
        .with_context(|| format!("failed to create {}", series_dir.display()))?;

    let mut names = Vec::with_capacity(histories.series().len());
    for (name, values) in histories.series() {
        let path = series_dir.join(format!("{name}.bin"));
        let file = BufWriter::new(
            File::create(&path).with_context(|| format!("failed to create {}", path.display()))?,
        );
        bincode::serialize_into(file, values)
            .with_context(|| format!("failed to write series {name}"))?;
        names.push(name.clone());
    }

    let metadata = HistoryMetadata {
        count: histories.snapshot_count(),
        time_step,
        total_time,
        series: names,
    };
    let path = dir.join("metadata.json");
    let file =
        File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, &metadata).context("failed to write history metadata")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;
    use vesicle_core::{Simulation, SimulationConfig};

    #[test]
    fn round_trips_a_small_run() {
        let mut config = SimulationConfig::default();
        config.simulation.total_time = 0.01;
        config.simulation.time_step = 1e-3;
        let mut simulation = Simulation::new(config).unwrap();
        simulation.run().unwrap();

        let dir = tempfile::tempdir().unwrap();
        write_histories(
            dir.path(),
            simulation.histories(),
            simulation.time_step(),
            simulation.total_time(),
        )
        .unwrap();

        let metadata: HistoryMetadata =
            serde_json::from_reader(File::open(dir.path().join("metadata.json")).unwrap())
                .unwrap();
        assert_eq!(metadata.count, 10);
        assert_eq!(metadata.time_step, 1e-3);
        assert!(metadata.series.contains(&"Vesicle_voltage".to_string()));
        assert_eq!(metadata.series.len(), simulation.histories().series().len());

        let voltage: Vec<f64> = bincode::deserialize_from(BufReader::new(
            File::open(dir.path().join("series").join("Vesicle_voltage.bin")).unwrap(),
        ))
        .unwrap();
        assert_eq!(
            voltage.as_slice(),
            simulation.histories().get("Vesicle_voltage").unwrap()
        );
    }
}
