//! Exchange data model: inbound parameters, validated requests, upstream payloads, and the
//! caller-facing result.

pub mod request;
pub mod response;

pub use request::*;
pub use response::*;
