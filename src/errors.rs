//! Typed errors for the collaborator-facing layer. Pure transformation
//! stages (normalization, classification, tokenization, the DOM walk,
//! nesting enforcement, marker allocation) never produce these: they
//! degrade instead, per spec.md §7's propagation policy. Only I/O-backed
//! stages (`Orchestrate`, the `ImageUploader`/`BlockStore` collaborators,
//! and startup configuration) do.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ConvertError {
    #[error("the HTML document could not be tokenized at all")]
    #[diagnostic(code(html2notion::input_parse_error))]
    InputParseError,

    #[error("image upload failed for {url}: {cause}")]
    #[diagnostic(
        code(html2notion::image_upload_failed),
        help("falling back to an external image reference")
    )]
    ImageUploadFailed { url: String, cause: String },

    #[error("Notion limit {limit} exceeded (observed {observed_value}); this is an invariant violation in the splitting logic")]
    #[diagnostic(code(html2notion::notion_limit_exceeded))]
    NotionLimitExceeded { limit: String, observed_value: usize },

    #[error("append of marker {marker} under host block {host_id} failed: {cause}")]
    #[diagnostic(
        code(html2notion::orchestration_append_failed),
        help("the marker token was left in the host block's rich text")
    )]
    OrchestrationAppendFailed {
        host_id: String,
        marker: String,
        cause: String,
    },

    #[error("conversion cancelled or timed out during stage: {stage}")]
    #[diagnostic(code(html2notion::cancelled_or_timeout))]
    CancelledOrTimeout { stage: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(html2notion::config_error))]
    ConfigError(String),
}
