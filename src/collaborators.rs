//! External collaborator interfaces (spec.md §6). These are the boundary
//! this crate treats as stable and out of core scope: an HTTP crawler feeds
//! us HTML (not modeled here at all — callers hand `Convert` a string), and
//! these three traits cover image upload, block persistence, and content
//! auditing. `NotionBlockStore` is the one concrete implementation, wrapping
//! nuc2not's own collaborator, `notion_client::endpoints::Client`.

use async_trait::async_trait;
use notion_client::endpoints::blocks::append::request::AppendBlockChildrenRequest;
use notion_client::endpoints::pages::create::request::CreateAPageRequest;
use notion_client::endpoints::Client as NotionClient;
use notion_client::objects::block::{Block as WireBlock, BlockType};
use notion_client::objects::page::Page as NotionPage;
use notion_client::objects::rich_text::RichText;

use crate::errors::ConvertError;
use crate::retries::{retry_create, retry_update_rich_text, RetryPolicy};

/// Given a source URL and alt text, returns an opaque upload id, or an
/// error the core falls back to `External(url)` on.
#[async_trait]
pub trait ImageUploader: Send + Sync {
    async fn upload(&self, url: &str, alt_text: &str) -> Result<String, ConvertError>;
}

/// Always falls back to an external URL reference; the default so this
/// crate is usable with no upload infrastructure configured, per SPEC_FULL's
/// Collaborator traits module.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullImageUploader;

#[async_trait]
impl ImageUploader for NullImageUploader {
    async fn upload(&self, url: &str, _alt_text: &str) -> Result<String, ConvertError> {
        Err(ConvertError::ImageUploadFailed {
            url: url.to_string(),
            cause: "no image uploader configured".to_string(),
        })
    }
}

#[async_trait]
pub trait BlockStore: Send + Sync {
    async fn create_page(&self, request: CreateAPageRequest) -> Result<NotionPage, ConvertError>;
    async fn append_children(
        &self,
        parent_id: &str,
        children: Vec<WireBlock>,
        after: Option<String>,
    ) -> Result<Vec<WireBlock>, ConvertError>;
    async fn update_rich_text(
        &self,
        block_id: &str,
        rich_text: Vec<RichText>,
        make_block_type: Box<dyn Fn(Vec<RichText>) -> BlockType + Send + Sync>,
    ) -> Result<(), ConvertError>;
}

/// Wraps `notion_client::endpoints::Client`, reusing nuc2not's 409-retry
/// wrapper (generalized in `retries.rs`) for every call.
pub struct NotionBlockStore {
    pub client: NotionClient,
    pub policy: RetryPolicy,
}

impl NotionBlockStore {
    pub fn new(client: NotionClient, policy: RetryPolicy) -> Self {
        NotionBlockStore { client, policy }
    }
}

#[async_trait]
impl BlockStore for NotionBlockStore {
    async fn create_page(&self, request: CreateAPageRequest) -> Result<NotionPage, ConvertError> {
        retry_create(&self.client, &request, &self.policy).await
    }

    async fn append_children(
        &self,
        parent_id: &str,
        children: Vec<WireBlock>,
        after: Option<String>,
    ) -> Result<Vec<WireBlock>, ConvertError> {
        if children.is_empty() {
            return Ok(Vec::new());
        }
        let request = AppendBlockChildrenRequest { children, after };
        crate::retries::retry_append(&self.client, parent_id, request, &self.policy).await
    }

    async fn update_rich_text(
        &self,
        block_id: &str,
        rich_text: Vec<RichText>,
        make_block_type: Box<dyn Fn(Vec<RichText>) -> BlockType + Send + Sync>,
    ) -> Result<(), ConvertError> {
        retry_update_rich_text(&self.client, block_id, rich_text, make_block_type, &self.policy).await
    }
}

/// Independent of the core pipeline; not required for `Convert` to succeed.
#[async_trait]
pub trait ContentValidator: Send + Sync {
    async fn compare(&self, source_html: &str, persisted_tree_ref: &str) -> Result<String, ConvertError>;
}
