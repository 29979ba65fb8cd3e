mod config;
mod error;
mod gateway;
mod poller;

pub use config::*;
pub use error::*;
pub use gateway::*;
pub use poller::*;
