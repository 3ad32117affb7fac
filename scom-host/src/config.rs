use std::{fs::create_dir_all, path::Path};

use scom::prelude::ScomConfig;

use crate::util::serde::{deserialize_from_json_file, serialize_to_json_file_pretty};

const CONFIG_FILE: &str = "scom.json";
const CONFIG_BACKUP_FILE: &str = "scom.json.bak";

/// Missing keys take their default value. An unreadable file is moved aside and
/// the defaults are used.
pub fn load_config_from_disk(data_dir: &Path) -> ScomConfig {
    let config_file = &data_dir.join(CONFIG_FILE);
    if !config_file.exists() {
        return ScomConfig::default();
    }
    match deserialize_from_json_file(config_file) {
        Ok(config) => config,
        Err(e) => {
            let config_backup_file = &data_dir.join(CONFIG_BACKUP_FILE);
            log::error!("Could not read config from {config_file:?}, using defaults: {e}");
            log::error!("Backupping {config_file:?} file to {config_backup_file:?}...");
            if let Err(e) = std::fs::rename(config_file, config_backup_file) {
                log::error!("Could not create backup {config_backup_file:?}: {e:?}");
            }
            ScomConfig::default()
        }
    }
}

pub fn save_config_to_disk(config: &ScomConfig, data_dir: &Path) {
    if let Err(e) = create_dir_all(data_dir) {
        log::error!("Could not create data directory {data_dir:?}: {e:?}");
        return;
    }
    let config_file = &data_dir.join(CONFIG_FILE);
    if let Err(e) = serialize_to_json_file_pretty(config, config_file) {
        log::error!("Could not serialize and save config to {config_file:?}: {e:?}");
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn data_dir() -> std::path::PathBuf {
        tempdir::TempDir::new("scom_test").unwrap().into_path()
    }

    #[test]
    fn test_missing_file() {
        let dir = data_dir();
        assert_eq!(load_config_from_disk(&dir), ScomConfig::default());
        assert!(!dir.join(CONFIG_BACKUP_FILE).exists());
    }

    #[test]
    fn test_save_and_load() {
        let dir = data_dir().join("nested");
        let config = ScomConfig {
            timeout_ms: 50,
            max_abf_attempts: 3,
            ..ScomConfig::default()
        };
        save_config_to_disk(&config, &dir);
        assert_eq!(load_config_from_disk(&dir), config);
    }

    #[test]
    fn test_partial_file() {
        let dir = data_dir();
        fs::write(dir.join(CONFIG_FILE), r#"{"ack_timeout_ms": 100}"#).unwrap();
        let config = load_config_from_disk(&dir);
        assert_eq!(config.ack_timeout_ms, 100);
        assert_eq!(config.timeout_ms, ScomConfig::default().timeout_ms);
    }

    #[test]
    fn test_corrupted_file() {
        let dir = data_dir();
        fs::write(dir.join(CONFIG_FILE), "{ not json").unwrap();
        assert_eq!(load_config_from_disk(&dir), ScomConfig::default());
        assert!(!dir.join(CONFIG_FILE).exists());
        assert_eq!(
            fs::read_to_string(dir.join(CONFIG_BACKUP_FILE)).unwrap(),
            "{ not json"
        );
    }
}
