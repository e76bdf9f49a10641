//! `EnforceNesting` + `Markers` + the tree-mutating half of `Collect & Emit`
//! (spec.md §4.5–4.7), fused into one recursive pass: generalizes nuc2not's
//! `block_has_deep_children`/`split_block_from_children` (`src/lib.rs`),
//! which already detect and lift over-deep children out of a block's
//! `children` array for a fixed `MAX_NESTING = 1`, and inline the marker
//! bookkeeping nuc2not did separately in its `PLACEHOLDER_PATTERN`
//! string-rewriting pass.
//!
//! These three stages are pure and I/O-free, and the data each one produces
//! is only useful at the site where the previous one left off: once a
//! block's children are found to violate a constraint, the host block that
//! just lost them is already in hand, so minting its marker token and
//! filing the orphaned children under that token happens in the same
//! stack frame rather than re-finding the host afterward. `Orchestrate`
//! (`orchestrate.rs`) is the one stage that stays separate, since it is the
//! actual network I/O against the Notion API.
//!
//! Rules applied, in order of precedence:
//! - A `Callout`'s children are *always* deferred, regardless of depth. This
//!   mirrors the worked boundary behavior for nested callouts (spec.md §8):
//!   a callout's own nested content is either flattened into its text by
//!   `walk.rs`'s `flatten_nested_callouts`, or, for anything left in
//!   `children`, handed to the marker map exactly like a list item's
//!   disallowed children.
//! - Any block at depth ≥2 has its entire `children` array deferred.
//! - A list item (`BulletedListItem`/`NumberedListItem`/`ToDo`/`Toggle`) at
//!   a legal depth still sheds children whose kind isn't allowed in a list
//!   item's initial payload (`BlockKind::allowed_as_list_item_child`),
//!   keeping the rest.

use crate::context::Conversion;
use crate::model::{Block, BlockKind, MarkerMap, RichSpan};

/// Walk `blocks` top-down, stripping illegal children and filing them under
/// freshly minted marker tokens. Mutates the tree in place (host blocks gain
/// a `RichSpan::Marker` run; stripped blocks are removed from `children` and
/// tagged with the same token via `Block::marker`) and returns the
/// accumulated map from token to the deferred blocks it owns.
pub fn enforce_and_defer(blocks: &mut [Block], ctx: &mut Conversion) -> MarkerMap {
    let mut map = MarkerMap::new();
    for block in blocks.iter_mut() {
        visit(block, 0, ctx, &mut map);
    }
    map
}

fn visit(block: &mut Block, depth: u32, ctx: &mut Conversion, map: &mut MarkerMap) {
    let is_callout = matches!(block.kind, BlockKind::Callout { .. });
    let is_list_item = matches!(
        block.kind,
        BlockKind::BulletedListItem { .. }
            | BlockKind::NumberedListItem { .. }
            | BlockKind::ToDo { .. }
            | BlockKind::Toggle { .. }
    );

    let Some(children) = block.kind.children_mut() else {
        return;
    };
    if children.is_empty() {
        return;
    }

    let mut stripped = if is_callout || depth >= 2 {
        std::mem::take(children)
    } else if is_list_item {
        let mut kept = Vec::with_capacity(children.len());
        let mut removed = Vec::new();
        for child in children.drain(..) {
            if child.kind.allowed_as_list_item_child() {
                kept.push(child);
            } else {
                removed.push(child);
            }
        }
        *children = kept;
        removed
    } else {
        Vec::new()
    };

    for child in block.kind.children_mut().unwrap().iter_mut() {
        visit(child, depth + 1, ctx, map);
    }
    for child in stripped.iter_mut() {
        visit(child, depth + 1, ctx, map);
    }

    if !stripped.is_empty() {
        let token = ctx.allocate_marker();
        for child in stripped.iter_mut() {
            child.marker = Some(token.clone());
        }
        if let Some(runs) = block.kind.runs_mut() {
            runs.push(RichSpan::Marker(token.clone()));
        }
        map.entry(token).or_default().extend(stripped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConvertOptions;

    fn leaf_table() -> Block {
        Block::new(BlockKind::Table {
            width: 1,
            header_row: false,
            rows: Vec::new(),
        })
    }

    #[test]
    fn list_item_sheds_disallowed_table_child_into_marker_map() {
        let mut ctx = Conversion::new(ConvertOptions::default());
        let mut blocks = vec![Block::new(BlockKind::BulletedListItem {
            runs: vec![RichSpan::plain("step")],
            children: vec![leaf_table()],
        })];
        let map = enforce_and_defer(&mut blocks, &mut ctx);
        let BlockKind::BulletedListItem { runs, children } = &blocks[0].kind else {
            panic!("expected list item");
        };
        assert!(children.is_empty());
        assert!(matches!(runs.last(), Some(RichSpan::Marker(_))));
        assert_eq!(map.len(), 1);
        let deferred = map.values().next().unwrap();
        assert_eq!(deferred.len(), 1);
        assert!(matches!(deferred[0].kind, BlockKind::Table { .. }));
    }

    #[test]
    fn callout_children_are_always_deferred() {
        let mut ctx = Conversion::new(ConvertOptions::default());
        let mut blocks = vec![Block::new(BlockKind::Callout {
            runs: vec![RichSpan::plain("Important: do the thing")],
            icon: "\u{26A0}\u{FE0F}".to_string(),
            color: crate::model::TextColor::Yellow,
            children: vec![
                Block::new(BlockKind::BulletedListItem {
                    runs: vec![RichSpan::plain("First")],
                    children: Vec::new(),
                }),
                Block::new(BlockKind::BulletedListItem {
                    runs: vec![RichSpan::plain("Second")],
                    children: Vec::new(),
                }),
            ],
        })];
        let map = enforce_and_defer(&mut blocks, &mut ctx);
        let BlockKind::Callout { children, runs, .. } = &blocks[0].kind else {
            panic!("expected callout");
        };
        assert!(children.is_empty(), "callout children must always defer");
        assert!(matches!(runs.last(), Some(RichSpan::Marker(_))));
        assert_eq!(map.len(), 1);
        assert_eq!(map.values().next().unwrap().len(), 2);
    }

    #[test]
    fn depth_two_children_are_always_deferred() {
        let mut ctx = Conversion::new(ConvertOptions::default());
        let mut blocks = vec![Block::new(BlockKind::BulletedListItem {
            runs: vec![RichSpan::plain("top")],
            children: vec![Block::new(BlockKind::BulletedListItem {
                runs: vec![RichSpan::plain("mid")],
                children: vec![Block::new(BlockKind::BulletedListItem {
                    runs: vec![RichSpan::plain("deep")],
                    children: Vec::new(),
                })],
            })],
        })];
        let map = enforce_and_defer(&mut blocks, &mut ctx);
        let BlockKind::BulletedListItem { children, .. } = &blocks[0].kind else {
            panic!("expected list item");
        };
        let BlockKind::BulletedListItem { children: mid_children, .. } = &children[0].kind else {
            panic!("expected nested list item");
        };
        assert!(mid_children.is_empty(), "depth-2 children must be deferred");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn shallow_legal_children_are_left_alone() {
        let mut ctx = Conversion::new(ConvertOptions::default());
        let mut blocks = vec![Block::new(BlockKind::BulletedListItem {
            runs: vec![RichSpan::plain("top")],
            children: vec![Block::new(BlockKind::Image {
                source: crate::model::MediaSource::External("https://x/y.png".into()),
                caption: Vec::new(),
                source_url: Some("https://x/y.png".into()),
            })],
        })];
        let map = enforce_and_defer(&mut blocks, &mut ctx);
        let BlockKind::BulletedListItem { children, .. } = &blocks[0].kind else {
            panic!("expected list item");
        };
        assert_eq!(children.len(), 1, "image is an allowed list-item child");
        assert!(map.is_empty());
    }
}
