pub mod error;

pub use error::{HostexError, Result};
