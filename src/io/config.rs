//! Read/write engine configuration JSON files.
//!
//! The schema is `domain::FitConfig`; every field has a default, so a file only
//! needs the likelihood terms it wants.

use std::fs::File;
use std::path::Path;

use crate::domain::FitConfig;
use crate::error::AppError;

pub fn read_config_json(path: &Path) -> Result<FitConfig, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::config(format!("Failed to open config JSON '{}': {e}", path.display())))?;
    let config: FitConfig = serde_json::from_reader(file)
        .map_err(|e| AppError::config(format!("Invalid config JSON '{}': {e}", path.display())))?;
    Ok(config)
}

pub fn write_config_json(path: &Path, config: &FitConfig) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::config(format!("Failed to create config JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, config)
        .map_err(|e| AppError::config(format!("Failed to write config JSON: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InvalidCandidatePolicy, Leg, ParameterOverride, TermConfig};

    #[test]
    fn config_survives_a_file_round_trip() {
        let mut config = FitConfig {
            num_samplings: 101,
            seed: 9,
            invalid_candidate: InvalidCandidatePolicy::Neutral,
            ..FitConfig::default()
        };
        config.parameter_overrides.insert(
            "leg1_flight_path".to_string(),
            ParameterOverride {
                upper: Some(2.0),
                ..ParameterOverride::default()
            },
        );
        config.likelihoods.push(TermConfig {
            name: "pol1".to_string(),
            plugin_type: "TauToPiNuPolarization".to_string(),
            inputs: Default::default(),
            params: Default::default(),
            leg: Some(Leg::First),
        });

        let path = std::env::temp_dir().join(format!("ditau-fit-config-{}.json", std::process::id()));
        write_config_json(&path, &config).unwrap();
        let back = read_config_json(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(back, config);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = read_config_json(Path::new("/definitely/not/here.json")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
