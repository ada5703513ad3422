pub mod env;
pub mod run;
pub mod runtime;

pub use env::CliArgs;
pub use run::{cmd_run, StdinPause};
pub use runtime::{init_logging, load_config, load_local_env_overrides, LoadedConfig};
