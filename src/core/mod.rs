pub mod error;
pub mod status;
pub mod value;

pub use error::{DbError, Result};
pub use status::{Code, Status};
pub use value::Value;
