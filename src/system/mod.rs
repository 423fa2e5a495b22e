pub mod cache;
pub mod collector;
pub mod fake;
pub mod history;
pub mod host;
pub mod kill;
pub mod monitor;
pub mod platform;
pub mod process;
pub mod sampler;
pub mod snapshot;
