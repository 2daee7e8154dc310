//! Embedgate Common Types
//!
//! Shared types used by both the inference server and the public gateway.

pub mod correlation;
pub mod protocol;

pub use correlation::{CorrelationId, CORRELATION_ID_HEADER, REQUEST_ID_HEADER};
pub use protocol::{
    EmbedRequest, EmbedResponse, ErrorBody, RateLimitErrorBody, ValidationError,
    MAX_INPUT_CODEPOINTS,
};
