pub mod traits;
pub mod population;
pub mod training;
pub mod manager;

pub use manager::{ConfigManager, AppConfig};
pub use population::{PopulationConfig, ExploitPolicy};
pub use training::TrainingConfig;
pub use traits::ConfigSection;
