pub mod hf_hub;
pub mod paths;
pub mod progress;
