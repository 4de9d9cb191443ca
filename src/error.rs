//! Error types for configuration, commands and export.

use std::io;

/// Errors that can occur when loading or saving the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the config file from disk.
    #[error("failed to read config: {0}")]
    ReadError(#[source] io::Error),

    /// Failed to write the config file to disk.
    #[error("failed to write config: {0}")]
    WriteError(#[source] io::Error),

    /// Failed to parse RON content.
    #[error("failed to parse config: {0}")]
    ParseError(#[source] ron::error::SpannedError),

    /// Failed to serialize config to RON.
    #[error("failed to serialize config: {0}")]
    SerializeError(#[source] ron::Error),

    /// A field holds a value outside its usable range.
    #[error("invalid config value `{field}` = {value}: {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Errors raised while writing images or trajectory dumps.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("i/o error while exporting: {0}")]
    Io(#[from] io::Error),

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),
}

/// A textual command that does not name any parameter adjustment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command `{0}`")]
pub struct CommandParseError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Command(#[from] CommandParseError),

    #[error("failed to set up logging: {0}")]
    Logger(#[from] fern::InitError),

    #[error("pixel ({x}, {y}) lies outside the {width}x{height} image")]
    PixelOutOfRange { x: u32, y: u32, width: u32, height: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;
