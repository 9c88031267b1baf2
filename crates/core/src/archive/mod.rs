//! Archive detection and extraction.
//!
//! This module provides the `Unpacker` trait used by the unpack workers and
//! `CommandUnpacker`, which drives the `unrar`, `unzip` and `7z` tools.
//!
//! Multi-volume RAR sets (`.rar` + `.r00`..., `.partNN.rar`, `.001`...) are
//! reported once, pointing at the first volume.
//!
//! # Example
//!
//! ```ignore
//! use qbunpack_core::archive::{CommandUnpacker, Unpacker};
//!
//! let unpacker = CommandUnpacker::detect()?;
//! let targets = unpacker.scan(Path::new("/downloads/show"), &cancel).await?;
//! for target in &targets {
//!     unpacker.extract(target, Path::new("/unpacked/show"), &log, &cancel).await?;
//! }
//! ```

mod command;
mod error;
mod format;
mod traits;
mod types;

pub use command::CommandUnpacker;
pub use error::{ExtractError, ScanError};
pub use format::{ArchiveFormat, Volume, VolumeKey};
pub use traits::Unpacker;
pub use types::ArchiveTarget;
