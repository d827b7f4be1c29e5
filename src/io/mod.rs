pub mod config_io;
pub mod paths;
pub mod records;

pub use config_io::ConfigError;
pub use paths::AppDirs;
pub use records::{RecordStore, StoredRecord};
