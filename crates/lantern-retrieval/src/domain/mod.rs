//! Request descriptors and retrieval errors.

pub mod errors;
pub mod request;

pub use errors::{DistributionError, RetrievalError, ValidationError};
pub use request::Request;
