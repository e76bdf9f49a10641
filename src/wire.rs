//! Flattens the internal block tree (`model::Block`) into the concrete
//! `notion_client` request types the Notion API understands. Grounded
//! directly in nuc2not's `lib.rs` `render_*`/`begin_*` functions, which
//! build these exact wire structs from a markdown AST; here the source is
//! our own `model::Block` tree instead of `mdast::Node`.
//!
//! This is the one module that knows both shapes. In particular:
//! - `RichSpan::Marker` never reaches the API as structured data; it is
//!   rendered to a plain, unannotated text run here, at the last possible
//!   moment, via `richtext::render_marker_text` (spec.md §4.6).
//! - Placeholder sentinels protected by `dom::protect_placeholders` before
//!   parsing are restored to their original `<name>` form here, on every
//!   text run's content (spec.md §4.1 repair 7 / §4.3 step 9) — this is the
//!   last stage that ever sees run content as a plain string.
//! - `CalloutValue` has no `children` field in this crate's model of the
//!   API (confirmed against nuc2not's `render_footnote`, which never sets
//!   one); `EnforceNesting` already guarantees a `Callout`'s `children` is
//!   always empty by the time it gets here, so that's never a loss.
//! - `ImageValue` likewise carries only a `file_type`, no caption slot, so
//!   a non-empty `Image.caption` is emitted as a trailing italic paragraph
//!   immediately after the image block rather than silently dropped.

use notion_client::objects::block::{
    self as wire, Block as WireBlock, BlockType, BulletedListItemValue, CalloutValue, CodeValue,
    EmbedValue, HeadingsValue, Icon, ImageValue, NumberedListItemValue, ParagraphValue,
    TableRowsValue, TableValue, TextColor as WireBlockColor, ToDoValue, ToggleValue, VideoValue,
};
use notion_client::objects::emoji::Emoji;
use notion_client::objects::file::{ExternalFile, File};
use notion_client::objects::rich_text::{
    Annotations as WireAnnotations, Link, RichText, Text as WireText, TextColor as WireRichColor,
};

use crate::dom::restore_placeholders;
use crate::model::{Annotations, Block, BlockKind, Language, MediaSource, RichSpan, TextColor};
use crate::richtext::render_marker_text;

/// Convert a top-level or nested block list into the shape
/// `AppendBlockChildrenRequest`/`CreateAPageRequest` expect.
pub fn blocks_to_wire(blocks: &[Block]) -> Vec<WireBlock> {
    blocks.iter().flat_map(block_to_wire_entries).collect()
}

fn children_to_wire(children: &[Block]) -> Option<Vec<WireBlock>> {
    if children.is_empty() {
        None
    } else {
        Some(blocks_to_wire(children))
    }
}

/// Most block kinds produce exactly one wire block; `Image` may produce two
/// (the image, plus a caption paragraph) since `ImageValue` has no caption
/// field of its own.
fn block_to_wire_entries(block: &Block) -> Vec<WireBlock> {
    if let BlockKind::Image { source, caption, .. } = &block.kind {
        let mut out = vec![wire_block(BlockType::Image {
            image: ImageValue {
                file_type: media_source_to_file(source),
            },
        })];
        if !caption.is_empty() {
            let italic_caption: Vec<RichSpan> = caption
                .iter()
                .map(|span| match span.clone() {
                    RichSpan::Text { content, mut annotations, link } => {
                        annotations.italic = true;
                        RichSpan::Text { content, annotations, link }
                    }
                    marker => marker,
                })
                .collect();
            out.push(wire_block(BlockType::Paragraph {
                paragraph: ParagraphValue {
                    rich_text: rich_text_to_wire(&italic_caption),
                    color: Some(WireBlockColor::Default),
                    children: None,
                },
            }));
        }
        return out;
    }
    vec![wire_block(block_type_for(block))]
}

fn wire_block(block_type: BlockType) -> WireBlock {
    WireBlock {
        block_type,
        ..Default::default()
    }
}

fn block_type_for(block: &Block) -> BlockType {
    match &block.kind {
        BlockKind::Paragraph { runs } => BlockType::Paragraph {
            paragraph: ParagraphValue {
                rich_text: rich_text_to_wire(runs),
                color: Some(WireBlockColor::Default),
                children: None,
            },
        },
        BlockKind::Heading {
            level,
            runs,
            toggleable,
            children,
        } => {
            let value = HeadingsValue {
                rich_text: rich_text_to_wire(runs),
                color: WireBlockColor::Default,
                is_toggleable: *toggleable,
                children: children_to_wire(children),
            };
            match level {
                1 => BlockType::Heading1 { heading_1: value },
                2 => BlockType::Heading2 { heading_2: value },
                _ => BlockType::Heading3 { heading_3: value },
            }
        }
        BlockKind::BulletedListItem { runs, children } => BlockType::BulletedListItem {
            bulleted_list_item: BulletedListItemValue {
                rich_text: rich_text_to_wire(runs),
                color: WireBlockColor::Default,
                children: children_to_wire(children),
            },
        },
        BlockKind::NumberedListItem { runs, children } => BlockType::NumberedListItem {
            numbered_list_item: NumberedListItemValue {
                rich_text: rich_text_to_wire(runs),
                color: WireBlockColor::Default,
                children: children_to_wire(children),
            },
        },
        BlockKind::ToDo { runs, checked, children } => BlockType::ToDo {
            to_do: ToDoValue {
                rich_text: rich_text_to_wire(runs),
                checked: *checked,
                color: WireBlockColor::Default,
                children: children_to_wire(children),
            },
        },
        BlockKind::Toggle { runs, children } => BlockType::Toggle {
            toggle: ToggleValue {
                rich_text: rich_text_to_wire(runs),
                color: WireBlockColor::Default,
                children: children_to_wire(children),
            },
        },
        BlockKind::Callout { runs, icon, color, .. } => BlockType::Callout {
            callout: CalloutValue {
                rich_text: rich_text_to_wire(runs),
                icon: Icon::Emoji(Emoji { emoji: icon.clone() }),
                color: color_to_wire_block(*color),
            },
        },
        BlockKind::Code { runs, language } => BlockType::Code {
            code: CodeValue {
                caption: Vec::new(),
                rich_text: rich_text_to_wire(runs),
                language: language_to_wire(*language),
            },
        },
        BlockKind::Image { .. } => unreachable!("handled in block_to_wire_entries"),
        BlockKind::Table { width, header_row, rows } => {
            let row_blocks: Vec<WireBlock> = rows
                .iter()
                .map(|row| {
                    wire_block(BlockType::TableRow {
                        table_row: TableRowsValue {
                            cells: row.cells.iter().map(|c| rich_text_to_wire(c)).collect(),
                        },
                    })
                })
                .collect();
            BlockType::Table {
                table: TableValue {
                    table_width: *width,
                    has_column_header: *header_row,
                    has_row_header: false,
                    children: Some(row_blocks),
                },
            }
        }
        BlockKind::Video { external_url } => BlockType::Video {
            video: VideoValue {
                file_type: File::External {
                    external: ExternalFile {
                        url: external_url.clone(),
                    },
                },
            },
        },
        BlockKind::Embed { url } => BlockType::Embed {
            embed: EmbedValue { url: url.clone() },
        },
    }
}

fn media_source_to_file(source: &MediaSource) -> File {
    let url = match source {
        MediaSource::External(url) => url,
        // An uploaded file's id has already been turned into a hosted URL by
        // the post-walk upload pass (`lib.rs`) before the tree reaches wire.rs.
        MediaSource::Upload(url) => url,
    };
    File::External {
        external: ExternalFile { url: url.clone() },
    }
}

pub(crate) fn rich_text_to_wire(runs: &[RichSpan]) -> Vec<RichText> {
    runs.iter().map(span_to_wire).collect()
}

/// Extract the rich text a wire block's variant carries, if any. Used by
/// `orchestrate.rs` to find which already-created block's text contains a
/// given marker's rendered text.
pub(crate) fn wire_rich_text_of(block_type: &BlockType) -> Option<&[RichText]> {
    match block_type {
        BlockType::Paragraph { paragraph } => Some(&paragraph.rich_text),
        BlockType::Heading1 { heading_1 } => Some(&heading_1.rich_text),
        BlockType::Heading2 { heading_2 } => Some(&heading_2.rich_text),
        BlockType::Heading3 { heading_3 } => Some(&heading_3.rich_text),
        BlockType::BulletedListItem { bulleted_list_item } => Some(&bulleted_list_item.rich_text),
        BlockType::NumberedListItem { numbered_list_item } => Some(&numbered_list_item.rich_text),
        BlockType::ToDo { to_do } => Some(&to_do.rich_text),
        BlockType::Toggle { toggle } => Some(&toggle.rich_text),
        BlockType::Callout { callout } => Some(&callout.rich_text),
        _ => None,
    }
}

/// Extract a wire block's nested children, if its variant has any.
pub(crate) fn wire_children_of(block_type: &BlockType) -> Option<&[WireBlock]> {
    match block_type {
        BlockType::Paragraph { paragraph } => paragraph.children.as_deref(),
        BlockType::Heading1 { heading_1 } => heading_1.children.as_deref(),
        BlockType::Heading2 { heading_2 } => heading_2.children.as_deref(),
        BlockType::Heading3 { heading_3 } => heading_3.children.as_deref(),
        BlockType::BulletedListItem { bulleted_list_item } => bulleted_list_item.children.as_deref(),
        BlockType::NumberedListItem { numbered_list_item } => numbered_list_item.children.as_deref(),
        BlockType::ToDo { to_do } => to_do.children.as_deref(),
        BlockType::Toggle { toggle } => toggle.children.as_deref(),
        BlockType::Table { table } => table.children.as_deref(),
        _ => None,
    }
}

/// Return the plain string a wire rich-text run renders as, for marker
/// substring matching; non-text runs (mentions, equations) never carry a
/// marker so they contribute an empty string.
pub(crate) fn wire_plain_text(rt: &RichText) -> String {
    match rt {
        RichText::Text { plain_text, text, .. } => plain_text.clone().unwrap_or_else(|| text.content.clone()),
        _ => String::new(),
    }
}

/// Rebuild a host's `BlockType` for an `UpdateABlockRequest` that only
/// changes its rich text: the variant and every other field (icon, color,
/// checked, level) is copied verbatim from the already-created wire block,
/// `children` is forced to `None` so the partial update never re-sends
/// (and so duplicates) nested content.
pub(crate) fn with_rich_text(block_type: &BlockType, rich_text: Vec<RichText>) -> BlockType {
    match block_type {
        BlockType::Heading1 { heading_1 } => BlockType::Heading1 {
            heading_1: HeadingsValue {
                rich_text,
                color: heading_1.color.clone(),
                is_toggleable: heading_1.is_toggleable,
                children: None,
            },
        },
        BlockType::Heading2 { heading_2 } => BlockType::Heading2 {
            heading_2: HeadingsValue {
                rich_text,
                color: heading_2.color.clone(),
                is_toggleable: heading_2.is_toggleable,
                children: None,
            },
        },
        BlockType::Heading3 { heading_3 } => BlockType::Heading3 {
            heading_3: HeadingsValue {
                rich_text,
                color: heading_3.color.clone(),
                is_toggleable: heading_3.is_toggleable,
                children: None,
            },
        },
        BlockType::BulletedListItem { bulleted_list_item } => BlockType::BulletedListItem {
            bulleted_list_item: BulletedListItemValue {
                rich_text,
                color: bulleted_list_item.color.clone(),
                children: None,
            },
        },
        BlockType::NumberedListItem { numbered_list_item } => BlockType::NumberedListItem {
            numbered_list_item: NumberedListItemValue {
                rich_text,
                color: numbered_list_item.color.clone(),
                children: None,
            },
        },
        BlockType::ToDo { to_do } => BlockType::ToDo {
            to_do: ToDoValue {
                rich_text,
                checked: to_do.checked,
                color: to_do.color.clone(),
                children: None,
            },
        },
        BlockType::Toggle { toggle } => BlockType::Toggle {
            toggle: ToggleValue {
                rich_text,
                color: toggle.color.clone(),
                children: None,
            },
        },
        BlockType::Callout { callout } => BlockType::Callout {
            callout: CalloutValue {
                rich_text,
                icon: callout.icon.clone(),
                color: callout.color.clone(),
            },
        },
        // Paragraph is the fallback: every other host kind that can carry a
        // marker run (Heading/ListItem/ToDo/Toggle/Callout) is matched above.
        _ => BlockType::Paragraph {
            paragraph: ParagraphValue {
                rich_text,
                color: Some(WireBlockColor::Default),
                children: None,
            },
        },
    }
}

fn span_to_wire(span: &RichSpan) -> RichText {
    match span {
        RichSpan::Marker(token) => plain_wire_text(&render_marker_text(token)),
        RichSpan::Text { content, annotations, link } => {
            let restored = restore_placeholders(content);
            let wire_link = link.clone().map(|url| Link { url });
            let text = WireText {
                content: restored.clone(),
                link: wire_link,
            };
            RichText::Text {
                text,
                annotations: Some(annotations_to_wire(annotations)),
                plain_text: Some(restored),
                href: link.clone(),
            }
        }
    }
}

fn plain_wire_text(content: &str) -> RichText {
    let text = WireText {
        content: content.to_string(),
        link: None,
    };
    RichText::Text {
        text,
        annotations: Some(WireAnnotations::default()),
        plain_text: Some(content.to_string()),
        href: None,
    }
}

fn annotations_to_wire(ann: &Annotations) -> WireAnnotations {
    WireAnnotations {
        bold: ann.bold,
        italic: ann.italic,
        strikethrough: ann.strikethrough,
        underline: ann.underline,
        code: ann.code,
        color: color_to_wire_rich_text(ann.color),
    }
}

fn color_to_wire_block(color: TextColor) -> WireBlockColor {
    match color {
        TextColor::Default => WireBlockColor::Default,
        TextColor::Blue => WireBlockColor::Blue,
        TextColor::Red => WireBlockColor::Red,
        TextColor::Green => WireBlockColor::Green,
        TextColor::Orange => WireBlockColor::Orange,
        TextColor::Yellow => WireBlockColor::Yellow,
        TextColor::Gray => WireBlockColor::Gray,
        TextColor::BlueBackground => WireBlockColor::BlueBackground,
        TextColor::RedBackground => WireBlockColor::RedBackground,
        TextColor::GreenBackground => WireBlockColor::GreenBackground,
        TextColor::OrangeBackground => WireBlockColor::OrangeBackground,
        TextColor::YellowBackground => WireBlockColor::YellowBackground,
    }
}

fn color_to_wire_rich_text(color: TextColor) -> WireRichColor {
    match color {
        TextColor::Default => WireRichColor::Default,
        TextColor::Blue => WireRichColor::Blue,
        TextColor::Red => WireRichColor::Red,
        TextColor::Green => WireRichColor::Green,
        TextColor::Orange => WireRichColor::Orange,
        TextColor::Yellow => WireRichColor::Yellow,
        TextColor::Gray => WireRichColor::Gray,
        TextColor::BlueBackground => WireRichColor::BlueBackground,
        TextColor::RedBackground => WireRichColor::RedBackground,
        TextColor::GreenBackground => WireRichColor::GreenBackground,
        TextColor::OrangeBackground => WireRichColor::OrangeBackground,
        TextColor::YellowBackground => WireRichColor::YellowBackground,
    }
}

/// The Notion code-block `Language` enum deserializes from the same bare
/// lowercase names the API itself uses (see nuc2not's `render_code`, which
/// feeds a fence's language string straight through `serde_json`); reusing
/// that path sidesteps guessing this crate's exact Rust-side variant
/// spelling for the handful of names we ever produce.
fn language_to_wire(language: Language) -> wire::Language {
    let name = match language {
        Language::PlainText => "plain text",
        Language::Rust => "rust",
        Language::JavaScript => "javascript",
        Language::TypeScript => "typescript",
        Language::Python => "python",
        Language::Json => "json",
        Language::Shell => "shell",
        Language::Html => "html",
        Language::Css => "css",
        Language::Sql => "sql",
        Language::Xml => "xml",
        Language::Yaml => "yaml",
        Language::Markdown => "markdown",
        Language::Java => "java",
        Language::Go => "go",
        Language::Ruby => "ruby",
    };
    serde_json::from_str(&format!("{name:?}")).unwrap_or(wire::Language::PlainText)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediaSource;

    #[test]
    fn paragraph_round_trips_into_wire_paragraph() {
        let block = Block::new(BlockKind::Paragraph {
            runs: vec![RichSpan::plain("hello")],
        });
        let wire = blocks_to_wire(std::slice::from_ref(&block));
        assert_eq!(wire.len(), 1);
        assert!(matches!(wire[0].block_type, BlockType::Paragraph { .. }));
    }

    #[test]
    fn marker_span_renders_as_plain_text_run() {
        let block = Block::new(BlockKind::Paragraph {
            runs: vec![RichSpan::plain("see also"), RichSpan::Marker("ABC123".to_string())],
        });
        let wire = blocks_to_wire(std::slice::from_ref(&block));
        let BlockType::Paragraph { paragraph } = &wire[0].block_type else {
            panic!("expected paragraph");
        };
        assert_eq!(paragraph.rich_text.len(), 2);
    }

    #[test]
    fn image_with_caption_emits_image_then_caption_paragraph() {
        let block = Block::new(BlockKind::Image {
            source: MediaSource::External("https://example.com/a.png".to_string()),
            caption: vec![RichSpan::plain("Figure 1")],
            source_url: Some("https://example.com/a.png".to_string()),
        });
        let wire = blocks_to_wire(std::slice::from_ref(&block));
        assert_eq!(wire.len(), 2);
        assert!(matches!(wire[0].block_type, BlockType::Image { .. }));
        assert!(matches!(wire[1].block_type, BlockType::Paragraph { .. }));
    }

    #[test]
    fn placeholder_sentinel_is_restored_in_final_text() {
        let block = Block::new(BlockKind::Paragraph {
            runs: vec![RichSpan::plain("run \u{2}plugin name\u{3} now")],
        });
        let wire = blocks_to_wire(std::slice::from_ref(&block));
        let BlockType::Paragraph { paragraph } = &wire[0].block_type else {
            panic!("expected paragraph");
        };
        let RichText::Text { text, .. } = &paragraph.rich_text[0] else {
            panic!("expected text run");
        };
        assert!(text.content.contains("<plugin name>"));
    }
}
