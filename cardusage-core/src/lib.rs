pub mod catalog;
pub mod errors;
pub mod identity;
pub mod ledger;
pub mod models;
pub mod report;
pub mod repo;

pub use catalog::*;
pub use errors::*;
pub use identity::*;
pub use ledger::*;
pub use models::*;
pub use report::*;
pub use repo::*;
