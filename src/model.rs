//! The internal block tree. This is deliberately not the `notion-client` wire
//! shape: markers are first-class here (see `RichSpan::Marker`) so that
//! stripping one is a structural match, not a string edit. `wire.rs` is the
//! only place that knows how to flatten this into the real Notion request
//! types.

use std::collections::HashMap;

/// One annotated run of rich text, or a marker placeholder that will be
/// rendered to `" (marker:XXXX)"` when the block is serialized for
/// submission.
#[derive(Debug, Clone, PartialEq)]
pub enum RichSpan {
    Text {
        content: String,
        annotations: Annotations,
        link: Option<String>,
    },
    /// An opaque marker token embedded in a parent's rich text. Rendered to
    /// the wire as a plain, unannotated run reading `" (marker:TOKEN)"`.
    Marker(String),
}

impl RichSpan {
    pub fn plain(content: impl Into<String>) -> Self {
        RichSpan::Text {
            content: content.into(),
            annotations: Annotations::default(),
            link: None,
        }
    }

    pub fn content_len(&self) -> usize {
        match self {
            RichSpan::Text { content, .. } => content.chars().count(),
            RichSpan::Marker(_) => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Annotations {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub underline: bool,
    pub code: bool,
    pub color: TextColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextColor {
    #[default]
    Default,
    Blue,
    Red,
    Green,
    Orange,
    Yellow,
    Gray,
    BlueBackground,
    RedBackground,
    GreenBackground,
    OrangeBackground,
    YellowBackground,
}

/// Where an `Image`/`Video`/`Embed` points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Upload(String),
    External(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    PlainText,
    Rust,
    JavaScript,
    TypeScript,
    Python,
    Json,
    Shell,
    Html,
    Css,
    Sql,
    Xml,
    Yaml,
    Markdown,
    Java,
    Go,
    Ruby,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub cells: Vec<Vec<RichSpan>>,
}

/// A block's variant-specific payload. `children` live only on the kinds
/// that can host them in the target model.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Paragraph {
        runs: Vec<RichSpan>,
    },
    Heading {
        level: u8,
        runs: Vec<RichSpan>,
        toggleable: bool,
        children: Vec<Block>,
    },
    BulletedListItem {
        runs: Vec<RichSpan>,
        children: Vec<Block>,
    },
    NumberedListItem {
        runs: Vec<RichSpan>,
        children: Vec<Block>,
    },
    ToDo {
        runs: Vec<RichSpan>,
        checked: bool,
        children: Vec<Block>,
    },
    Toggle {
        runs: Vec<RichSpan>,
        children: Vec<Block>,
    },
    Callout {
        runs: Vec<RichSpan>,
        icon: String,
        color: TextColor,
        children: Vec<Block>,
    },
    Code {
        runs: Vec<RichSpan>,
        language: Language,
    },
    Image {
        source: MediaSource,
        caption: Vec<RichSpan>,
        /// Back-reference used only for de-duplication within one conversion.
        source_url: Option<String>,
    },
    Table {
        width: u32,
        header_row: bool,
        rows: Vec<TableRow>,
    },
    Video {
        external_url: String,
    },
    Embed {
        url: String,
    },
}

impl BlockKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            BlockKind::Paragraph { .. } => "paragraph",
            BlockKind::Heading { .. } => "heading",
            BlockKind::BulletedListItem { .. } => "bulleted_list_item",
            BlockKind::NumberedListItem { .. } => "numbered_list_item",
            BlockKind::ToDo { .. } => "to_do",
            BlockKind::Toggle { .. } => "toggle",
            BlockKind::Callout { .. } => "callout",
            BlockKind::Code { .. } => "code",
            BlockKind::Image { .. } => "image",
            BlockKind::Table { .. } => "table",
            BlockKind::Video { .. } => "video",
            BlockKind::Embed { .. } => "embed",
        }
    }

    /// Blocks that may legally be direct children of a list item in the
    /// initial payload (spec.md invariant 2 / §4.5 "Additional constraint").
    pub fn allowed_as_list_item_child(&self) -> bool {
        matches!(
            self,
            BlockKind::BulletedListItem { .. }
                | BlockKind::NumberedListItem { .. }
                | BlockKind::ToDo { .. }
                | BlockKind::Toggle { .. }
                | BlockKind::Image { .. }
                | BlockKind::Callout { .. }
        )
    }

    pub fn children(&self) -> Option<&[Block]> {
        match self {
            BlockKind::Heading { children, .. }
            | BlockKind::BulletedListItem { children, .. }
            | BlockKind::NumberedListItem { children, .. }
            | BlockKind::ToDo { children, .. }
            | BlockKind::Toggle { children, .. }
            | BlockKind::Callout { children, .. } => Some(children.as_slice()),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Block>> {
        match self {
            BlockKind::Heading { children, .. }
            | BlockKind::BulletedListItem { children, .. }
            | BlockKind::NumberedListItem { children, .. }
            | BlockKind::ToDo { children, .. }
            | BlockKind::Toggle { children, .. }
            | BlockKind::Callout { children, .. } => Some(children),
            _ => None,
        }
    }

    pub fn runs(&self) -> Option<&[RichSpan]> {
        match self {
            BlockKind::Paragraph { runs }
            | BlockKind::Heading { runs, .. }
            | BlockKind::BulletedListItem { runs, .. }
            | BlockKind::NumberedListItem { runs, .. }
            | BlockKind::ToDo { runs, .. }
            | BlockKind::Toggle { runs, .. }
            | BlockKind::Callout { runs, .. }
            | BlockKind::Code { runs, .. } => Some(runs.as_slice()),
            _ => None,
        }
    }

    pub fn runs_mut(&mut self) -> Option<&mut Vec<RichSpan>> {
        match self {
            BlockKind::Paragraph { runs }
            | BlockKind::Heading { runs, .. }
            | BlockKind::BulletedListItem { runs, .. }
            | BlockKind::NumberedListItem { runs, .. }
            | BlockKind::ToDo { runs, .. }
            | BlockKind::Toggle { runs, .. }
            | BlockKind::Callout { runs, .. }
            | BlockKind::Code { runs, .. } => Some(runs),
            _ => None,
        }
    }
}

/// A node in the block tree. `marker` is set only on blocks that have been
/// deferred by `EnforceNesting`/`Markers`; such blocks are removed from their
/// in-tree location by `Collect & Emit` and relocated into the marker map.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub marker: Option<String>,
}

impl Block {
    pub fn new(kind: BlockKind) -> Self {
        Block { kind, marker: None }
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.kind_name()
    }
}

/// Mapping from marker token to the ordered list of blocks deferred under it.
pub type MarkerMap = HashMap<String, Vec<Block>>;
