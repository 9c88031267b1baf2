use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::{types::Config, ConfigError};

/// File name used when `write_default_config` is pointed at a directory.
pub const DEFAULT_CONFIG_FILE: &str = "qbunpack.toml";

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("QBUNPACK_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Serialize `config` to `path`.
///
/// When `path` is an existing directory the file is written as
/// `DEFAULT_CONFIG_FILE` inside it. An existing file is only replaced when
/// `force` is set. Returns the path actually written.
pub fn write_default_config(
    path: &Path,
    config: &Config,
    force: bool,
) -> Result<PathBuf, ConfigError> {
    let target = if path.is_dir() {
        path.join(DEFAULT_CONFIG_FILE)
    } else {
        path.to_path_buf()
    };

    let contents =
        toml::to_string_pretty(config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let mut file = options.open(&target).map_err(|e| {
        if e.kind() == ErrorKind::AlreadyExists {
            ConfigError::AlreadyExists(target.display().to_string())
        } else {
            ConfigError::Io(e)
        }
    })?;
    file.write_all(contents.as_bytes())?;

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
dest_path = "/data"

[workers]
unpack = 4
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.workers.unpack, 4);
        assert_eq!(config.workers.check, 1);
    }

    #[test]
    fn test_load_config_from_str_invalid_type() {
        let toml = r#"
[polling]
delay_secs = "soon"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/qbunpack.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
dest_path = "/data/unpacked"

[qbittorrent]
url = "http://10.0.0.2:8080"
username = "admin"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.dest_path, PathBuf::from("/data/unpacked"));
        assert_eq!(config.qbittorrent.url, "http://10.0.0.2:8080");
        assert_eq!(config.qbittorrent.username, "admin");
    }

    #[test]
    fn test_write_default_config_into_directory() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            dest_path: PathBuf::from("/data/unpacked"),
            ..Default::default()
        };

        let written = write_default_config(dir.path(), &config, false).unwrap();
        assert_eq!(written, dir.path().join(DEFAULT_CONFIG_FILE));

        let loaded = load_config(&written).unwrap();
        assert_eq!(loaded.dest_path, PathBuf::from("/data/unpacked"));
        assert_eq!(loaded.categories, config.categories);
    }

    #[test]
    fn test_write_default_config_refuses_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("existing.toml");
        std::fs::write(&path, "# keep me").unwrap();

        let result = write_default_config(&path, &Config::default(), false);
        assert!(matches!(result, Err(ConfigError::AlreadyExists(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# keep me");

        write_default_config(&path, &Config::default(), true).unwrap();
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .contains("[categories]"));
    }
}
