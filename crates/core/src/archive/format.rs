//! Archive format signatures and multi-volume grouping.

use std::fmt;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

static RAR_PART: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(.+)\.part(\d+)\.rar$").unwrap());
static RAR_MAIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(.+)\.rar$").unwrap());
static RAR_OLD_VOLUME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(.+)\.r(\d{2})$").unwrap());
static RAR_NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+)\.(\d{3})$").unwrap());
static ZIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^.+\.zip$").unwrap());
static SEVEN_ZIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^.+\.7z$").unwrap());

/// Archive formats the daemon knows how to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveFormat {
    Rar,
    Zip,
    SevenZip,
}

impl ArchiveFormat {
    pub const ALL: [ArchiveFormat; 3] = [
        ArchiveFormat::Rar,
        ArchiveFormat::Zip,
        ArchiveFormat::SevenZip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveFormat::Rar => "rar",
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::SevenZip => "7z",
        }
    }

    /// Name of the external extraction tool.
    pub fn command(&self) -> &'static str {
        match self {
            ArchiveFormat::Rar => "unrar",
            ArchiveFormat::Zip => "unzip",
            ArchiveFormat::SevenZip => "7z",
        }
    }

    /// Command line arguments extracting `archive` into `dest`.
    pub fn extract_args(&self, archive: &Path, dest: &Path) -> Vec<String> {
        let archive = archive.to_string_lossy().to_string();
        let dest = dest.to_string_lossy().to_string();
        match self {
            ArchiveFormat::Rar => {
                // unrar treats the destination as a directory only with a trailing separator
                let mut dest = dest;
                if !dest.ends_with(MAIN_SEPARATOR) {
                    dest.push(MAIN_SEPARATOR);
                }
                vec![
                    "x".to_string(),
                    "-ai".to_string(),
                    "-c-".to_string(),
                    "-kb".to_string(),
                    "-o+".to_string(),
                    "-p-".to_string(),
                    "-y".to_string(),
                    archive,
                    dest,
                ]
            }
            ArchiveFormat::Zip => vec!["-o".to_string(), archive, "-d".to_string(), dest],
            ArchiveFormat::SevenZip => {
                vec!["x".to_string(), "-y".to_string(), format!("-o{}", dest), archive]
            }
        }
    }

    /// Whether a non-zero exit code still means success.
    pub fn is_benign_exit(&self, code: Option<i32>) -> bool {
        // unrar exits with 10 when there was nothing left to extract
        matches!((self, code), (ArchiveFormat::Rar, Some(10)))
    }

    /// Match a file against the known signatures.
    pub fn identify(path: &Path) -> Option<Volume> {
        let file_name = path.file_name()?.to_str()?;
        let dir = path.parent().unwrap_or_else(|| Path::new(""));

        let (format, stem, rank) = if let Some(caps) = RAR_PART.captures(file_name) {
            let part: u32 = caps[2].parse().ok()?;
            (ArchiveFormat::Rar, caps[1].to_string(), part)
        } else if let Some(caps) = RAR_MAIN.captures(file_name) {
            (ArchiveFormat::Rar, caps[1].to_string(), 0)
        } else if let Some(caps) = RAR_OLD_VOLUME.captures(file_name) {
            let volume: u32 = caps[2].parse().ok()?;
            (ArchiveFormat::Rar, caps[1].to_string(), 1_000 + volume)
        } else if let Some(caps) = RAR_NUMBERED.captures(file_name) {
            let volume: u32 = caps[2].parse().ok()?;
            (ArchiveFormat::Rar, caps[1].to_string(), 2_000 + volume)
        } else if ZIP.is_match(file_name) {
            (ArchiveFormat::Zip, file_name.to_string(), 0)
        } else if SEVEN_ZIP.is_match(file_name) {
            (ArchiveFormat::SevenZip, file_name.to_string(), 0)
        } else {
            return None;
        };

        Some(Volume {
            key: VolumeKey {
                format,
                container: dir.join(stem.to_lowercase()),
            },
            path: path.to_path_buf(),
            rank,
        })
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an extraction unit: all volumes of one set share it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VolumeKey {
    pub format: ArchiveFormat,
    pub container: PathBuf,
}

/// One file recognised as (part of) an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub key: VolumeKey,
    pub path: PathBuf,
    /// Lower ranks are better candidates for the first volume of a set.
    pub rank: u32,
}
