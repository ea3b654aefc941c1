mod error;
mod value;

pub use error::{err, Error, ErrorType, Result};
pub use value::{DataType, Map, Value};
