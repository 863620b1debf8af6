use thiserror::Error;

#[derive(Error, Debug)]
pub enum PbtError {
    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Hyperparameter mismatch: {0}")]
    HyperparameterMismatch(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Member {id} failed: {source}")]
    Member {
        id: usize,
        #[source]
        source: Box<PbtError>,
    },

    #[error("Lock of member {0} is poisoned")]
    Poisoned(usize),

    #[error("Population is empty")]
    EmptyPopulation,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Config source error: {0}")]
    Config(#[from] config::ConfigError),
}

impl PbtError {
    /// Attach the identity of the member an error came from.
    pub fn for_member(self, id: usize) -> Self {
        match self {
            // Already attributed
            PbtError::Member { .. } => self,
            other => PbtError::Member {
                id,
                source: Box::new(other),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, PbtError>;
