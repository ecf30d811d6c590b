use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("the network needs at least one level, got an empty channel list")]
    EmptyDepth,
    #[error("level {level} has zero channels")]
    ZeroChannels { level: usize },
    #[error("invalid shape: {0}")]
    InvalidShape(String),
    #[error(
        "input {height}x{width} is not divisible by {divisor}, required by {levels} levels of 2x downsampling"
    )]
    IndivisibleInput {
        height: usize,
        width: usize,
        divisor: usize,
        levels: usize,
    },
    #[error("expected {expected} input channels, got {got}")]
    InputChannels { expected: usize, got: usize },
    #[error(
        "skip connection mismatch at level {level}: upsampled {upsampled:?} vs skip {skip:?} (height, width)"
    )]
    SkipMismatch {
        level: usize,
        upsampled: [usize; 2],
        skip: [usize; 2],
    },
    #[error("skip stack exhausted at level {level}")]
    SkipStackExhausted { level: usize },
    #[error("unbalanced skip stack: {pushed} pushes, {popped} pops")]
    UnbalancedSkips { pushed: usize, popped: usize },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("dataset: {0}")]
    Dataset(String),
    #[error(transparent)]
    Config(#[from] burn::config::ConfigError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
