//! Convert DITA-flavored ServiceNow HTML into Notion page content and,
//! optionally, persist it through a [`BlockStore`] collaborator.
//!
//! The pure half of this crate (`convert`) never touches the network: it
//! normalizes, walks, and flattens a document into a `payload` plus a
//! `marker_map` of blocks deferred past Notion's two-level nesting cap. The
//! networked half (`create_page`) submits that payload, then calls
//! [`orchestrate::orchestrate`] to reunite every deferred block with its host.
//! This mirrors nuc2not's own split between `convert()` (pure Markdown → block
//! tree) and `PageMaker::make_page` (the network-calling wrapper around it) in
//! the original `src/lib.rs`, just generalized from a Markdown AST to an HTML
//! DOM and widened with the marker indirection nuc2not never needed.

mod classify;
mod collaborators;
mod config;
mod context;
mod diagnostics;
mod dom;
mod errors;
mod model;
mod nesting;
mod orchestrate;
mod retries;
mod richtext;
mod walk;
mod wire;

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, HashMap};

use futures::stream::{self, StreamExt};
use notion_client::endpoints::pages::create::request::CreateAPageRequest;
use notion_client::objects::block::Block as WireBlock;
use notion_client::objects::page::{Page as NotionPage, PageProperty};
use notion_client::objects::parent::Parent;
use tracing::{debug, info, info_span};

pub use collaborators::{BlockStore, ContentValidator, ImageUploader, NotionBlockStore, NullImageUploader};
pub use config::ConvertOptions;
pub use context::Conversion;
pub use diagnostics::AuditReport;
pub use errors::ConvertError;
pub use model::{Annotations, Block, BlockKind, Language, MarkerMap, MediaSource, RichSpan, TableRow, TextColor};
pub use retries::RetryPolicy;

/// Notion's append-children-per-request cap (distinct from the 100-rich-text-
/// run cap `ConvertOptions::max_rich_text_runs` governs).
const APPEND_CHUNK_SIZE: usize = 100;

/// The pure output of [`convert`]: the flattened block stream ready for
/// submission, the marker map `Orchestrate` will later resolve, and the
/// running diagnostics (spec.md §6, `ConvertResult`).
#[derive(Debug)]
pub struct ConvertResult {
    pub payload: Vec<Block>,
    pub marker_map: MarkerMap,
    pub diagnostics: AuditReport,
}

/// Convert a raw HTML string into a Notion block tree. Infallible: malformed
/// or empty input degrades to an empty or best-effort payload rather than
/// returning an error, per spec.md §4's "pure stages never fail" policy.
pub fn convert(html: &str, options: ConvertOptions) -> ConvertResult {
    let span = info_span!("convert_document");
    let _enter = span.enter();

    let mut ctx = Conversion::new(options);
    let normalized = dom::normalize(
        html,
        ctx.options.preserve_ui_controls_as_paragraphs,
        &mut ctx.diagnostics,
    );
    let document = dom::parse(&normalized);
    ctx.diagnostics.source_text_chars = document.root_element().text().map(|s| s.chars().count()).sum();

    let mut payload = walk::walk_document(&document, &mut ctx);
    let marker_map = nesting::enforce_and_defer(&mut payload, &mut ctx);
    record_block_counts(&payload, &marker_map, &mut ctx.diagnostics);

    info!(
        blocks = ctx.diagnostics.block_counts.values().sum::<usize>(),
        markers = ctx.diagnostics.markers_allocated,
        "document converted"
    );
    ConvertResult {
        payload,
        marker_map,
        diagnostics: ctx.diagnostics,
    }
}

fn record_block_counts(payload: &[Block], marker_map: &MarkerMap, diagnostics: &mut AuditReport) {
    count_blocks(payload, diagnostics);
    for deferred in marker_map.values() {
        count_blocks(deferred, diagnostics);
    }
    diagnostics.deferred_children = marker_map.values().map(Vec::len).sum();
}

fn count_blocks(blocks: &[Block], diagnostics: &mut AuditReport) {
    for block in blocks {
        diagnostics.record_block(block.kind_name());
        if let Some(runs) = block.kind.runs() {
            diagnostics.emitted_text_chars += runs.iter().map(RichSpan::content_len).sum::<usize>();
        }
        if let Some(children) = block.kind.children() {
            count_blocks(children, diagnostics);
        }
    }
}

/// Convert `html` and persist it as a new Notion page under `parent`,
/// resolving every deferred marker afterward. Generalizes nuc2not's
/// `create_page`/`PageMaker::make_page` (`src/lib.rs`): where nuc2not submits
/// its whole tree through one recursive `append_children`/`block_has_deep_children`
/// walk, the nesting cap here has already been enforced by `convert`, so the
/// payload only needs flat, chunked submission; markers carry the rest.
pub async fn create_page(
    store: &dyn BlockStore,
    uploader: &dyn ImageUploader,
    html: &str,
    options: ConvertOptions,
    parent: &str,
    properties: BTreeMap<String, PageProperty>,
) -> Result<(NotionPage, AuditReport), ConvertError> {
    let ConvertResult {
        mut payload,
        mut marker_map,
        mut diagnostics,
    } = convert(html, options.clone());

    resolve_images(
        &mut payload,
        &mut marker_map,
        uploader,
        options.image_upload_concurrency,
        &mut diagnostics,
    )
    .await;

    let request = CreateAPageRequest {
        parent: Parent::PageId {
            page_id: parent.to_string(),
        },
        icon: None,
        cover: None,
        properties,
        children: None,
    };
    let notion_page = store.create_page(request).await?;
    info!(page_id = %notion_page.id, "page created");

    let wire_blocks = wire::blocks_to_wire(&payload);
    let created = append_in_chunks(store, notion_page.id.as_str(), wire_blocks).await?;

    let resolutions = orchestrate::orchestrate(store, &created, marker_map, options.orchestration_concurrency).await;
    for resolution in resolutions {
        match resolution.outcome {
            Ok(()) => diagnostics.markers_resolved += 1,
            Err(err) => {
                diagnostics.record_error(&err);
            }
        }
    }
    info!(
        resolved = diagnostics.markers_resolved,
        failed = diagnostics.errors.len(),
        "orchestration complete"
    );

    Ok((notion_page, diagnostics))
}

/// Submit `blocks` to `parent_id` in batches of [`APPEND_CHUNK_SIZE`],
/// chaining each batch's `after` cursor from the previous one's last created
/// id, the same tranche-accumulation shape as nuc2not's `append_children`
/// loop (`src/lib.rs`) with the depth-aware splitting removed: `convert`
/// already guarantees no block here exceeds the nesting cap.
async fn append_in_chunks(
    store: &dyn BlockStore,
    parent_id: &str,
    blocks: Vec<WireBlock>,
) -> Result<Vec<WireBlock>, ConvertError> {
    let mut created = Vec::with_capacity(blocks.len());
    let mut after: Option<String> = None;
    for chunk in blocks.chunks(APPEND_CHUNK_SIZE) {
        let mut batch = store.append_children(parent_id, chunk.to_vec(), after.clone()).await?;
        after = batch.last().and_then(|b| b.id.clone());
        created.append(&mut batch);
    }
    Ok(created)
}

/// Bounded-concurrency image upload pass over every `Image` block in
/// `payload` and `marker_map`, grounded in nuc2not's `migrator.rs`
/// `buffer_unordered(3)` pattern. Collects source URLs first (each already
/// de-duplicated by `Conversion::claim_image_url` during `WalkDOM`), uploads
/// them concurrently, then applies the successful results back onto every
/// matching `MediaSource::External` in a second pass; failures stay
/// `External` and are recorded as `image_fallbacks`, per spec.md §4.3's
/// "image-upload failures fall back to external URL references."
async fn resolve_images(
    payload: &mut [Block],
    marker_map: &mut MarkerMap,
    uploader: &dyn ImageUploader,
    concurrency: usize,
    diagnostics: &mut AuditReport,
) {
    let mut urls = Vec::new();
    collect_image_urls(payload, &mut urls);
    for deferred in marker_map.values() {
        collect_image_urls(deferred, &mut urls);
    }
    if urls.is_empty() {
        return;
    }

    let outcomes: Vec<(String, Result<String, ConvertError>)> = stream::iter(urls.into_iter().map(|(url, alt)| async move {
        let result = uploader.upload(&url, &alt).await;
        (url, result)
    }))
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await;

    let mut resolved: HashMap<String, String> = HashMap::new();
    for (url, result) in outcomes {
        match result {
            Ok(upload_id) => {
                resolved.insert(url, upload_id);
            }
            Err(err) => {
                debug!(url, error = %err, "image upload fell back to external url");
                diagnostics.image_fallbacks += 1;
            }
        }
    }
    if resolved.is_empty() {
        return;
    }
    apply_resolved_images(payload, &resolved);
    for deferred in marker_map.values_mut() {
        apply_resolved_images(deferred, &resolved);
    }
}

fn collect_image_urls(blocks: &[Block], out: &mut Vec<(String, String)>) {
    for block in blocks {
        if let BlockKind::Image {
            source: MediaSource::External(url),
            caption,
            ..
        } = &block.kind
        {
            out.push((url.clone(), plain_caption_text(caption)));
        }
        if let Some(children) = block.kind.children() {
            collect_image_urls(children, out);
        }
    }
}

fn apply_resolved_images(blocks: &mut [Block], resolved: &HashMap<String, String>) {
    for block in blocks.iter_mut() {
        if let BlockKind::Image { source, .. } = &mut block.kind {
            if let MediaSource::External(url) = source {
                if let Some(upload_id) = resolved.get(url) {
                    *source = MediaSource::Upload(upload_id.clone());
                }
            }
        }
        if let Some(children) = block.kind.children_mut() {
            apply_resolved_images(children, resolved);
        }
    }
}

fn plain_caption_text(caption: &[RichSpan]) -> String {
    caption
        .iter()
        .map(|r| match r {
            RichSpan::Text { content, .. } => content.clone(),
            RichSpan::Marker(token) => richtext::render_marker_text(token),
        })
        .collect()
}
