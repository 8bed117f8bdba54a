pub mod layers;

mod manager;
mod merge;


pub use manager::{ConfigManager, ConfigPaths};
pub use merge::merge_toml_values;
