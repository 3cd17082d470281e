use flagsvc::{FlagError, ValidationError};

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("invalid flags config: {0}")]
    InvalidFlagsConfig(#[from] ValidationError),

    #[error("could not set up metrics: {0}")]
    Metrics(String),

    #[error(transparent)]
    Flag(#[from] FlagError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
