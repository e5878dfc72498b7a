use std::path::PathBuf;
use thiserror::Error;

use super::constants::*;

#[derive(Debug, Error)]
pub enum BankGroupError {
    #[error("Bank group {0} does not match any known scaler crate")]
    UndefinedCrate(String),
    #[error("Could not resolve {0} into a calendar date")]
    BadDate(String),
}

#[derive(Debug, Error)]
pub enum CodaFileError {
    #[error("Could not open data file because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Reached end of data file")]
    EndOfFile,
    #[error("Event of {0} words exceeds the transport buffer of {max} words", max=MAX_BUFFER_WORDS)]
    EventTooLong(usize),
    #[error("Data file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum HistoryFileError {
    #[error("Could not open history file because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Run {0} was not found in the history file")]
    RunNotFound(u32),
    #[error("History file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("History file contained a malformed channel value: {0}")]
    ParsingError(#[from] std::num::ParseIntError),
}

#[derive(Debug, Error)]
pub enum OnlineError {
    #[error("Could not connect to scaler server: {0}")]
    Connect(std::io::Error),
    #[error("Could not write request to scaler server: {0}")]
    Write(std::io::Error),
    #[error("Error reading reply from scaler server: {0}")]
    Read(std::io::Error),
    #[error("Scaler server reply truncated after {0} bytes")]
    Truncated(usize),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event declares {declared} words but the buffer holds {available}")]
    Truncated { declared: usize, available: usize },
    #[error("Crate segment for crate {0} overruns the event buffer")]
    SegmentOverrun(u8),
    #[error("Module in slot {0} has a block with no trailer")]
    UnterminatedBlock(u8),
    #[error("Requested a sub-event but the decoder is not in multiblock mode")]
    NotMultiblock,
    #[error("All sub-events of the loaded block have been consumed")]
    BlockExhausted,
}

#[derive(Debug, Error)]
pub enum ScalerError {
    #[error("Scaler was used before Init; call init with a map date first")]
    NotInitialized,
    #[error("Scaler failed due to bank group error: {0}")]
    BankError(#[from] BankGroupError),
    #[error("Scaler failed due to data file error: {0}")]
    FileError(#[from] CodaFileError),
    #[error("Scaler failed due to history file error: {0}")]
    HistoryError(#[from] HistoryFileError),
    #[error("Scaler failed due to online server error: {0}")]
    OnlineError(#[from] OnlineError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Scaler error: {0}")]
    ScalerError(#[from] ScalerError),
    #[error("Processor failed due to bank group error: {0}")]
    BankError(#[from] BankGroupError),
    #[error("Processor failed due to data file error: {0}")]
    FileError(#[from] CodaFileError),
    #[error("Processor failed due to Event error: {0}")]
    EventError(#[from] EventError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
