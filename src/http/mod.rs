//! HTTP protocol layer module
//!
//! Provides HTTP protocol-related base functionality, decoupled from the
//! video library handlers.

pub mod body;
pub mod mime;
pub mod query;
pub mod range;
pub mod response;

// Re-export commonly used types
pub use body::ResponseBody;
pub use range::{parse_range_header, RangeParseResult, RangeRequest};
pub use response::{
    build_405_response, build_416_response, build_error_response, build_json_response,
    build_options_response, build_text_response,
};
