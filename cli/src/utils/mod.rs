pub mod env_paths;
pub mod output;
