//! Command orchestrators for the `workflow` binary, split into a library
//! so integration tests can drive pipelines directly instead of shelling
//! out to the compiled binary.

pub mod audit;
pub mod exit;
pub mod external;
pub mod orchestrators;
pub mod reflector;
pub mod services;

pub use services::Services;
