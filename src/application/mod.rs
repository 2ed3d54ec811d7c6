// Application layer - use cases and orchestration on top of the domain
// ledger and the repository.

pub mod error;
pub mod reporting;
pub mod service;

pub use error::*;
pub use reporting::*;
pub use service::*;
