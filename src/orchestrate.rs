//! `Orchestrate` (spec.md §4.8): the one stage in this crate that talks to
//! the network. Once the initial page content has been submitted and the
//! Notion API has handed back the created block tree, every marker token
//! allocated by `nesting.rs` still needs its deferred children appended
//! under the right host and the token itself stripped back out of that
//! host's rich text.
//!
//! Grounded in nuc2not's own `append_children`/`do_append` concurrency
//! pattern (`src/lib.rs`, `src/migrator.rs`): `migrator.rs` bounds page
//! migration at `buffer_unordered(3)`; here the same shape bounds marker
//! resolution at `ConvertOptions::orchestration_concurrency`. Unlike
//! nuc2not, which re-derives a parent id level-by-level from each append
//! response, a marker's host is found by searching the already-created tree
//! for the literal marker text it was given at submission time — the
//! token's rendered form (`richtext::render_marker_text`) is unique and
//! still sitting in that host's own rich text, so no positional bookkeeping
//! between our model tree and the API's response is needed.
//!
//! A deferred subtree can itself contain a marker nested inside it (a
//! callout deferred under one marker whose own child list was, in turn,
//! deferred under a second marker): spec.md §4.8 item 2 requires that such
//! a marker resolve too, once its host has actually been appended. So
//! resolution runs in rounds: each round resolves every marker whose host
//! is findable in the known tree so far, folds the blocks the API just
//! created back into that known tree, and repeats against whatever markers
//! are still unresolved. A round that makes no progress means the
//! remaining markers have no reachable host at all, and they're failed out.

use futures::stream::{self, StreamExt};
use notion_client::objects::block::{Block as WireBlock, BlockType};
use notion_client::objects::rich_text::RichText;

use crate::collaborators::BlockStore;
use crate::errors::ConvertError;
use crate::model::{Block, MarkerMap};
use crate::richtext::render_marker_text;
use crate::wire;

#[derive(Debug)]
pub struct MarkerResolution {
    pub token: String,
    pub outcome: Result<(), ConvertError>,
}

/// Resolve every marker in `marker_map` against the tree the API returned
/// from the initial submission, recursively folding in each round's newly
/// appended blocks so a marker nested within another marker's deferred
/// subtree can still find its host. Failures are collected rather than
/// short-circuiting: a failed marker simply leaves its token in place in
/// the host's rich text, as spec.md §7 requires, and gets recorded in the
/// caller's `AuditReport`.
pub async fn orchestrate(
    store: &dyn BlockStore,
    created: &[WireBlock],
    marker_map: MarkerMap,
    concurrency: usize,
) -> Vec<MarkerResolution> {
    let mut known: Vec<WireBlock> = created.to_vec();
    let mut pending: Vec<(String, Vec<Block>)> = marker_map.into_iter().collect();
    let mut results = Vec::new();

    while !pending.is_empty() {
        let mut resolvable = Vec::new();
        let mut blocked = Vec::new();
        for entry in pending {
            if find_host(&known, &render_marker_text(&entry.0)).is_some() {
                resolvable.push(entry);
            } else {
                blocked.push(entry);
            }
        }

        if resolvable.is_empty() {
            for (token, _) in blocked {
                results.push(MarkerResolution {
                    token: token.clone(),
                    outcome: Err(ConvertError::OrchestrationAppendFailed {
                        host_id: "<unresolved>".to_string(),
                        marker: token,
                        cause: "no created block's rich text contains this marker".to_string(),
                    }),
                });
            }
            break;
        }

        let known_ref: &[WireBlock] = &known;
        let tasks = resolvable.into_iter().map(|(token, deferred)| async move {
            let outcome = resolve_one(store, known_ref, &token, deferred).await;
            (token, outcome)
        });
        let round: Vec<(String, Result<Vec<WireBlock>, ConvertError>)> =
            stream::iter(tasks).buffer_unordered(concurrency.max(1)).collect().await;

        for (token, outcome) in round {
            match outcome {
                Ok(mut appended) => {
                    known.append(&mut appended);
                    results.push(MarkerResolution { token, outcome: Ok(()) });
                }
                Err(err) => results.push(MarkerResolution { token, outcome: Err(err) }),
            }
        }

        pending = blocked;
    }

    results
}

/// Resolves one marker against `known` and returns the blocks the API
/// created in response, so the caller can fold them back into `known` for
/// the next round.
async fn resolve_one(
    store: &dyn BlockStore,
    known: &[WireBlock],
    token: &str,
    deferred: Vec<Block>,
) -> Result<Vec<WireBlock>, ConvertError> {
    let marker_text = render_marker_text(token);
    let Some((host_id, host_block_type)) = find_host(known, &marker_text) else {
        return Err(ConvertError::OrchestrationAppendFailed {
            host_id: "<unresolved>".to_string(),
            marker: token.to_string(),
            cause: "no created block's rich text contains this marker".to_string(),
        });
    };

    let children = wire::blocks_to_wire(&deferred);
    let appended = store.append_children(&host_id, children, None).await?;

    let stripped_rich_text: Vec<RichText> = wire::wire_rich_text_of(host_block_type)
        .unwrap_or(&[])
        .iter()
        .filter(|rt| wire::wire_plain_text(rt) != marker_text)
        .cloned()
        .collect();
    let owned_block_type = host_block_type.clone();
    let make_block_type = Box::new(move |rt: Vec<RichText>| wire::with_rich_text(&owned_block_type, rt));
    store.update_rich_text(&host_id, stripped_rich_text, make_block_type).await?;
    Ok(appended)
}

/// Depth-first search for the first block whose own rich text contains a
/// run that is exactly `marker_text`. Returns its id and its `BlockType`
/// (needed to rebuild the update request with every other field intact).
fn find_host<'a>(blocks: &'a [WireBlock], marker_text: &str) -> Option<(String, &'a BlockType)> {
    for b in blocks {
        if let Some(runs) = wire::wire_rich_text_of(&b.block_type) {
            if runs.iter().any(|rt| wire::wire_plain_text(rt) == marker_text) {
                if let Some(id) = &b.id {
                    return Some((id.clone(), &b.block_type));
                }
            }
        }
        if let Some(children) = wire::wire_children_of(&b.block_type) {
            if let Some(found) = find_host(children, marker_text) {
                return Some(found);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use notion_client::endpoints::blocks::append::request::AppendBlockChildrenRequest;
    use notion_client::endpoints::pages::create::request::CreateAPageRequest;
    use notion_client::objects::block::{BulletedListItemValue, ParagraphValue, TextColor};
    use notion_client::objects::page::Page as NotionPage;
    use std::sync::Mutex;

    struct RecordingStore {
        appended: Mutex<Vec<(String, usize)>>,
        updated: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BlockStore for RecordingStore {
        async fn create_page(&self, _request: CreateAPageRequest) -> Result<NotionPage, ConvertError> {
            unimplemented!("not exercised by these tests")
        }

        async fn append_children(
            &self,
            parent_id: &str,
            children: Vec<WireBlock>,
            _after: Option<String>,
        ) -> Result<Vec<WireBlock>, ConvertError> {
            self.appended.lock().unwrap().push((parent_id.to_string(), children.len()));
            Ok(Vec::new())
        }

        async fn update_rich_text(
            &self,
            block_id: &str,
            _rich_text: Vec<RichText>,
            _make_block_type: Box<dyn Fn(Vec<RichText>) -> BlockType + Send + Sync>,
        ) -> Result<(), ConvertError> {
            self.updated.lock().unwrap().push(block_id.to_string());
            Ok(())
        }
    }

    fn paragraph_with_text(id: &str, plain: &str) -> WireBlock {
        WireBlock {
            id: Some(id.to_string()),
            block_type: BlockType::Paragraph {
                paragraph: ParagraphValue {
                    rich_text: vec![plain_rich_text(plain)],
                    color: Some(TextColor::Default),
                    children: None,
                },
            },
            ..Default::default()
        }
    }

    fn plain_rich_text(content: &str) -> RichText {
        use notion_client::objects::rich_text::Text;
        RichText::Text {
            text: Text {
                content: content.to_string(),
                link: None,
            },
            annotations: None,
            plain_text: Some(content.to_string()),
            href: None,
        }
    }

    #[tokio::test]
    async fn resolves_marker_against_matching_host_and_strips_it() {
        use crate::model::{BlockKind, RichSpan};

        let token = "ABC123";
        let marker_text = render_marker_text(token);
        let host = paragraph_with_text("host-1", &format!("intro{marker_text}"));
        let created = vec![host];

        let mut map = MarkerMap::new();
        map.insert(
            token.to_string(),
            vec![Block::new(BlockKind::BulletedListItem {
                runs: vec![RichSpan::plain("deferred item")],
                children: Vec::new(),
            })],
        );

        let store = RecordingStore {
            appended: Mutex::new(Vec::new()),
            updated: Mutex::new(Vec::new()),
        };
        let results = orchestrate(&store, &created, map, 2).await;

        assert_eq!(results.len(), 1);
        assert!(results[0].outcome.is_ok());
        assert_eq!(store.appended.lock().unwrap().as_slice(), &[("host-1".to_string(), 1)]);
        assert_eq!(store.updated.lock().unwrap().as_slice(), &["host-1".to_string()]);
    }

    #[tokio::test]
    async fn unresolved_marker_reports_failure_without_panicking() {
        let created = vec![paragraph_with_text("host-1", "no marker here")];
        let mut map = MarkerMap::new();
        map.insert("ZZZZZZ".to_string(), Vec::new());

        let store = RecordingStore {
            appended: Mutex::new(Vec::new()),
            updated: Mutex::new(Vec::new()),
        };
        let results = orchestrate(&store, &created, map, 2).await;
        assert!(results[0].outcome.is_err());
    }

    #[tokio::test]
    async fn marker_nested_in_another_markers_deferred_subtree_still_resolves() {
        use crate::model::{BlockKind, RichSpan};

        let outer_token = "OUT001";
        let inner_token = "IN0001";
        let outer_marker_text = render_marker_text(outer_token);
        let inner_marker_text = render_marker_text(inner_token);

        let host = paragraph_with_text("host-1", &format!("intro{outer_marker_text}"));
        let created = vec![host];

        let mut map = MarkerMap::new();
        map.insert(
            outer_token.to_string(),
            vec![Block::new(BlockKind::Paragraph {
                runs: vec![RichSpan::plain(format!("nested{inner_marker_text}"))],
            })],
        );
        map.insert(
            inner_token.to_string(),
            vec![Block::new(BlockKind::BulletedListItem {
                runs: vec![RichSpan::plain("deep item")],
                children: Vec::new(),
            })],
        );

        struct NestingStore {
            appended: Mutex<Vec<(String, usize)>>,
            updated: Mutex<Vec<String>>,
        }

        #[async_trait]
        impl BlockStore for NestingStore {
            async fn create_page(&self, _request: CreateAPageRequest) -> Result<NotionPage, ConvertError> {
                unimplemented!("not exercised by this test")
            }

            async fn append_children(
                &self,
                parent_id: &str,
                children: Vec<WireBlock>,
                _after: Option<String>,
            ) -> Result<Vec<WireBlock>, ConvertError> {
                self.appended.lock().unwrap().push((parent_id.to_string(), children.len()));
                if parent_id == "host-1" {
                    Ok(vec![paragraph_with_text(
                        "nested-1",
                        &format!("nested{}", render_marker_text("IN0001")),
                    )])
                } else {
                    Ok(Vec::new())
                }
            }

            async fn update_rich_text(
                &self,
                block_id: &str,
                _rich_text: Vec<RichText>,
                _make_block_type: Box<dyn Fn(Vec<RichText>) -> BlockType + Send + Sync>,
            ) -> Result<(), ConvertError> {
                self.updated.lock().unwrap().push(block_id.to_string());
                Ok(())
            }
        }

        let store = NestingStore {
            appended: Mutex::new(Vec::new()),
            updated: Mutex::new(Vec::new()),
        };
        let results = orchestrate(&store, &created, map, 2).await;

        assert_eq!(results.len(), 2);
        assert!(
            results.iter().all(|r| r.outcome.is_ok()),
            "outer and nested markers both resolve: {results:?}"
        );
        let appended = store.appended.lock().unwrap();
        assert!(appended.contains(&("host-1".to_string(), 1)));
        assert!(appended.contains(&("nested-1".to_string(), 1)));
        let updated = store.updated.lock().unwrap();
        assert!(updated.contains(&"host-1".to_string()));
        assert!(updated.contains(&"nested-1".to_string()));
    }

    #[test]
    fn find_host_descends_into_list_item_children() {
        let token = "DEEP01";
        let marker_text = render_marker_text(token);
        let inner = paragraph_with_text("inner-1", &marker_text);
        let outer = WireBlock {
            id: Some("outer-1".to_string()),
            block_type: BlockType::BulletedListItem {
                bulleted_list_item: BulletedListItemValue {
                    rich_text: vec![plain_rich_text("top item")],
                    color: TextColor::Default,
                    children: Some(vec![inner]),
                },
            },
            ..Default::default()
        };
        let found = find_host(std::slice::from_ref(&outer), &marker_text);
        assert_eq!(found.map(|(id, _)| id), Some("inner-1".to_string()));
    }
}
