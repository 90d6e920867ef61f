pub mod cache;
pub mod config;
pub mod decode;
pub mod line;
pub mod pattern;
pub mod set;
pub mod sim;
pub mod snapshot;
pub mod stat;
pub mod trace;

pub use cache::{Cache, RequestError, Response, DUMP_SENTINEL};
pub use config::{CacheConfig, ConfigError, Geometry};
