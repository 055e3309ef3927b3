use std::path::{Path, PathBuf};

use {directories::ProjectDirs, tracing::info};

use crate::{
    error::{ConfigError, Result},
    schema::PulseConfig,
};

pub const CONFIG_FILENAME: &str = "pulse.toml";

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "PULSE_CONFIG";

/// Platform config directory (`~/.config/pulse` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "pulse").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Read, parse and validate one config file.
pub fn load_config(path: &Path) -> Result<PulseConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: PulseConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// First existing config file: `explicit`, then `$PULSE_CONFIG`, then
/// `./pulse.toml`, then `pulse.toml` in [`config_dir`].
///
/// An explicit path is returned even when it does not exist, so the caller
/// reports it instead of silently falling back.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(path));
    }
    let local = PathBuf::from(CONFIG_FILENAME);
    if local.is_file() {
        return Some(local);
    }
    config_dir()
        .map(|dir| dir.join(CONFIG_FILENAME))
        .filter(|path| path.is_file())
}

/// Load the discovered config, or defaults when there is none.
pub fn discover_and_load(explicit: Option<&Path>) -> Result<PulseConfig> {
    match find_config(explicit) {
        Some(path) => {
            let config = load_config(&path)?;
            info!(path = %path.display(), "loaded config");
            Ok(config)
        },
        None => {
            info!("no config file found, using defaults");
            Ok(PulseConfig::default())
        },
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::io::Write};

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_a_full_config() {
        let file = write_config(
            r#"
[server]
bind = "0.0.0.0"
port = 9100

[metrics]
enabled = false
path = "/prom"
emit_created = true

[query]
matcher_limit = 3
overview_matcher_limit = 2
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.listen_addr(), "0.0.0.0:9100");
        assert!(!config.metrics.enabled);
        assert_eq!(config.metrics.path, "/prom");
        assert!(config.metrics.emit_created);
        assert_eq!(config.query.matcher_limit, 3);
    }

    #[test]
    fn explicit_missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let err = discover_and_load(Some(&missing)).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn parse_errors_name_the_file() {
        let file = write_config("[server\nport = 1");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let file = write_config("[metrics]\npath = \"/health\"\n");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn explicit_path_wins_discovery() {
        let file = write_config("");
        assert_eq!(
            find_config(Some(file.path())).as_deref(),
            Some(file.path())
        );
        assert_eq!(discover_and_load(Some(file.path())).unwrap(), PulseConfig::default());
    }
}
