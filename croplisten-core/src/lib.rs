pub mod config;
pub mod error;
pub mod topic;
pub mod types;

pub use config::*;
pub use error::*;
pub use topic::*;
pub use types::*;
