use super::replica::ReplicaEnsemble;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("I/O error on checkpoint '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed checkpoint '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Checkpoint '{path}' has format version {found}, expected {expected}")]
    Version {
        path: String,
        found: u32,
        expected: u32,
    },
}

#[derive(Serialize)]
struct CheckpointRef<'a> {
    format_version: u32,
    ensemble: &'a ReplicaEnsemble,
}

#[derive(Deserialize)]
struct CheckpointDocument {
    format_version: u32,
    ensemble: ReplicaEnsemble,
}

fn display(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes the whole ensemble to `path`.
///
/// The document is written to a sibling temporary file and renamed over `path`, so
/// an interrupted write never replaces the previous checkpoint.
pub fn save(ensemble: &ReplicaEnsemble, path: &Path) -> Result<(), CheckpointError> {
    let tmp = temporary_path(path);
    let io_err = |source| CheckpointError::Io {
        path: display(&tmp),
        source,
    };

    let file = File::create(&tmp).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(
        &mut writer,
        &CheckpointRef {
            format_version: FORMAT_VERSION,
            ensemble,
        },
    )
    .map_err(|source| CheckpointError::Json {
        path: display(&tmp),
        source,
    })?;
    writer.flush().map_err(io_err)?;
    writer
        .into_inner()
        .map_err(|e| io_err(e.into_error()))?
        .sync_all()
        .map_err(io_err)?;

    fs::rename(&tmp, path).map_err(|source| CheckpointError::Io {
        path: display(path),
        source,
    })?;
    debug!(
        path = %path.display(),
        blocks = ensemble.blocks_completed(),
        "Checkpoint written."
    );
    Ok(())
}

pub fn load(path: &Path) -> Result<ReplicaEnsemble, CheckpointError> {
    let file = File::open(path).map_err(|source| CheckpointError::Io {
        path: display(path),
        source,
    })?;
    let document: CheckpointDocument = serde_json::from_reader(BufReader::new(file))
        .map_err(|source| CheckpointError::Json {
            path: display(path),
            source,
        })?;
    if document.format_version != FORMAT_VERSION {
        return Err(CheckpointError::Version {
            path: display(path),
            found: document.format_version,
            expected: FORMAT_VERSION,
        });
    }
    Ok(document.ensemble)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::space::Space;
    use crate::engine::builder::PerturbedSystemBuilder;
    use crate::engine::sampler::RigidBodyMonteCarlo;
    use crate::engine::testing::{ligand_in_water, ligand_table, run_config};
    use rand::Rng;
    use tempfile::tempdir;

    fn sampled_ensemble() -> ReplicaEnsemble {
        let system = ligand_in_water(Space::Cartesian, 2);
        let table = ligand_table();
        let mut config = run_config(&[0.0, 0.5, 1.0]);
        config.identity = Some(crate::engine::config::IdentityConfig { num_sites: 1 });
        config.histogram_bin_width = Some(0.5);
        let builder = PerturbedSystemBuilder::new(&system, &table, &config);
        let mut ensemble = ReplicaEnsemble::from_builder(&builder, &config).unwrap();
        let sampler = RigidBodyMonteCarlo::new(ensemble.sampling());
        ensemble.run_block(&sampler).unwrap();
        ensemble
    }

    #[test]
    fn round_trip_reproduces_lambdas_accumulators_and_next_draws() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ensemble.json");
        let original = sampled_ensemble();
        save(&original, &path).unwrap();
        let restored = load(&path).unwrap();

        assert_eq!(restored.blocks_completed(), original.blocks_completed());
        assert_eq!(restored.schedule(), original.schedule());
        assert_eq!(restored.exchange_stats(), original.exchange_stats());
        for (a, b) in original.windows().iter().zip(restored.windows()) {
            assert_eq!(a.lambda(), b.lambda());
            assert_eq!(a.system.lambda(), b.system.lambda());
            assert_eq!(a.accumulators, b.accumulators);
            assert!(a.configuration.same_coordinates(&b.configuration));
            assert_eq!(a.configuration.generation(), b.configuration.generation());
            assert_eq!(a.rng.clone().r#gen::<u64>(), b.rng.clone().r#gen::<u64>());
        }
        assert_eq!(
            original.exchange_rng().clone().r#gen::<f64>(),
            restored.exchange_rng().clone().r#gen::<f64>()
        );
    }

    #[test]
    fn restored_ensemble_continues_exactly_like_the_original() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ensemble.json");
        let mut original = sampled_ensemble();
        save(&original, &path).unwrap();
        let mut restored = load(&path).unwrap();

        let sampler = RigidBodyMonteCarlo::new(original.sampling());
        let a = original.run_block(&sampler).unwrap();
        let b = restored.run_block(&sampler).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn save_replaces_the_file_and_leaves_no_temporary() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ckpt.json");
        std::fs::write(&path, "old contents").unwrap();
        save(&sampled_ensemble(), &path).unwrap();
        assert!(load(&path).is_ok());
        assert!(!temporary_path(&path).exists());
    }

    #[test]
    fn load_rejects_other_format_versions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ckpt.json");
        save(&sampled_ensemble(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&text).unwrap();
        value["format_version"] = serde_json::json!(99);
        std::fs::write(&path, value.to_string()).unwrap();
        assert!(matches!(
            load(&path),
            Err(CheckpointError::Version { found: 99, .. })
        ));
    }

    #[test]
    fn load_reports_missing_files_as_io_errors() {
        let dir = tempdir().unwrap();
        let err = load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, CheckpointError::Io { .. }));
    }
}
