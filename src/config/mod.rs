pub mod file;
pub mod paths;
pub mod types;

pub use file::{load_config, ConfigFile};
pub use types::{BackendConfig, EventsConfig, PollConfig, Verbosity, VolkeeperConfig};
