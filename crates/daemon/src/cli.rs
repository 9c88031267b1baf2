use std::path::PathBuf;

use clap::Parser;
use qbunpack_core::config::DEFAULT_CONFIG_FILE;

/// qBittorrent post-processing daemon.
///
/// Watches completed torrents, looks for archives and extracts them when a
/// torrent is moved to the unpack category.
#[derive(Parser, Debug)]
#[command(name = "qbunpack")]
#[command(version)]
pub struct Cli {
    /// Configuration file.
    #[arg(short, long, env = "QBUNPACK_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Destination directory for extracted files (overrides dest_path).
    #[arg(long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Temporary directory (overrides temp_path).
    #[arg(long, value_name = "DIR")]
    pub temp: Option<PathBuf>,

    /// Write a default configuration file to PATH and exit.
    #[arg(long, value_name = "PATH")]
    pub write_config: Option<PathBuf>,

    /// Overwrite an existing file with --write-config.
    #[arg(long, requires = "write_config")]
    pub force: bool,

    /// Print the archives found under PATH and exit.
    #[arg(long, value_name = "PATH", conflicts_with = "write_config")]
    pub scan: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["qbunpack"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert!(cli.dest.is_none());
        assert!(cli.write_config.is_none());
        assert!(!cli.force);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "qbunpack",
            "--config",
            "/etc/qbunpack.toml",
            "--dest",
            "/data/unpacked",
            "--temp",
            "/data/tmp",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/qbunpack.toml"));
        assert_eq!(cli.dest, Some(PathBuf::from("/data/unpacked")));
        assert_eq!(cli.temp, Some(PathBuf::from("/data/tmp")));
    }

    #[test]
    fn test_force_requires_write_config() {
        assert!(Cli::try_parse_from(["qbunpack", "--force"]).is_err());
        let cli = Cli::try_parse_from(["qbunpack", "--write-config", "/tmp", "--force"]).unwrap();
        assert!(cli.force);
    }

    #[test]
    fn test_scan_conflicts_with_write_config() {
        assert!(Cli::try_parse_from(["qbunpack", "--scan", "/a", "--write-config", "/b"]).is_err());
    }
}
