pub mod constants;
pub mod error;
pub mod schema;
pub mod types;

pub use constants::*;
pub use error::MerlinError;
pub use types::*;
