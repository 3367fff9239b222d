pub mod error;
pub mod json;
pub mod path;
pub mod value;

pub use error::{ParseError, ParseResult};
pub use json::{parse_document, to_json_pretty};
pub use path::{NodePath, Step};
pub use value::{Scalar, Value};
