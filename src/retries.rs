//! Generalized retry wrappers around the Notion client. Grounded in
//! nuc2not's `retries.rs` (`do_create`/`do_append`, which retried only on a
//! bare 409 with a flat delay). spec.md §4.8/§7 call for exponential backoff
//! with jitter across the wider 429/5xx set, bounded by a retry budget; on
//! exhaustion the caller (`orchestrate.rs`) leaves the marker token in place
//! rather than failing the whole conversion.

use std::time::Duration;

use notion_client::endpoints::blocks::append::request::AppendBlockChildrenRequest;
use notion_client::endpoints::blocks::update::request::UpdateABlockRequest;
use notion_client::endpoints::pages::create::request::CreateAPageRequest;
use notion_client::endpoints::Client;
use notion_client::objects::block::{Block as WireBlock, BlockType};
use notion_client::objects::page::Page as NotionPage;
use notion_client::objects::rich_text::RichText;
use rand::Rng;
use tracing::warn;

use crate::errors::ConvertError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u8,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u8) -> Self {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(200),
        }
    }

    /// Exponential backoff with full jitter: `random(0, base * 2^attempt)`.
    fn delay_for(&self, attempt: u8) -> Duration {
        let cap_ms = self.base_delay.as_millis() as u64 * (1u64 << attempt.min(6));
        let jittered = rand::thread_rng().gen_range(0..=cap_ms.max(1));
        Duration::from_millis(jittered)
    }
}

fn is_retriable_status(status: u16) -> bool {
    status == 409 || status == 429 || (500..600).contains(&status)
}

fn is_retriable_notion_error(e: &notion_client::NotionClientError) -> bool {
    match e {
        notion_client::NotionClientError::InvalidStatusCode { ref error } => {
            is_retriable_status(error.status)
        }
        notion_client::NotionClientError::FailedToDeserialize(_) => false,
        _ => true,
    }
}

pub async fn retry_create(
    notion: &Client,
    request: &CreateAPageRequest,
    policy: &RetryPolicy,
) -> Result<NotionPage, ConvertError> {
    let mut attempt = 0u8;
    loop {
        match notion.pages.create_a_page(request.clone()).await {
            Ok(resp) => return Ok(resp),
            Err(e) => {
                if attempt >= policy.max_retries || !is_retriable_notion_error(&e) {
                    return Err(ConvertError::OrchestrationAppendFailed {
                        host_id: "<page-create>".to_string(),
                        marker: "<none>".to_string(),
                        cause: e.to_string(),
                    });
                }
                warn!(attempt, error = %e, "retrying page creation");
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
        }
    }
}

pub async fn retry_append(
    notion: &Client,
    parent_id: &str,
    request: AppendBlockChildrenRequest,
    policy: &RetryPolicy,
) -> Result<Vec<WireBlock>, ConvertError> {
    if request.children.is_empty() {
        return Ok(Vec::new());
    }
    let mut attempt = 0u8;
    loop {
        match notion
            .blocks
            .append_block_children(parent_id, request.clone())
            .await
        {
            Ok(response) => return Ok(response.results),
            Err(e) => {
                if attempt >= policy.max_retries || !is_retriable_notion_error(&e) {
                    return Err(ConvertError::OrchestrationAppendFailed {
                        host_id: parent_id.to_string(),
                        marker: "<unresolved>".to_string(),
                        cause: e.to_string(),
                    });
                }
                warn!(attempt, parent_id, error = %e, "retrying block append");
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
        }
    }
}

/// Rewrites a block's rich text in place; used by `orchestrate.rs` to strip
/// a resolved marker token out of its host block once the deferred children
/// have actually been appended. A host can be a paragraph, callout, heading,
/// or list item (anything `nesting.rs` may embed a marker run into), so the
/// caller supplies a `BlockType` constructor rather than this function
/// assuming one shape.
pub async fn retry_update_rich_text(
    notion: &Client,
    block_id: &str,
    rich_text: Vec<RichText>,
    make_block_type: impl Fn(Vec<RichText>) -> BlockType,
    policy: &RetryPolicy,
) -> Result<(), ConvertError> {
    let mut attempt = 0u8;
    loop {
        let request = UpdateABlockRequest {
            block_type: make_block_type(rich_text.clone()),
            archived: None,
        };
        match notion.blocks.update_a_block(block_id, request).await {
            Ok(_) => return Ok(()),
            Err(e) => {
                if attempt >= policy.max_retries || !is_retriable_notion_error(&e) {
                    return Err(ConvertError::OrchestrationAppendFailed {
                        host_id: block_id.to_string(),
                        marker: "<rich-text-strip>".to_string(),
                        cause: e.to_string(),
                    });
                }
                warn!(attempt, block_id, error = %e, "retrying rich text rewrite");
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
        }
    }
}
