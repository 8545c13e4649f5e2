pub mod backend;
pub mod catalog;
pub mod config;
pub mod locator;
pub mod orchestrator;
pub mod page;
pub mod poller;
pub mod suppression;

pub use quell_common::error;
pub use quell_common::protocol;
pub use quell_common::target;
