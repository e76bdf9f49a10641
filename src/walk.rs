//! `WalkDOM` (spec.md §4.4): the recursive extractor. Generalizes nuc2not's
//! `render_node`/`render_nodes` dispatch (a `match` over `mdast::Node`
//! variants, folded with `flat_map`, in `src/lib.rs`) from a Markdown AST to
//! a `match` over classified HTML element kinds. The per-list-item state
//! machine generalizes nuc2not's "promote first paragraph into the item's
//! own rich text" handling for Markdown list items (same file, the
//! `rendered_bullet_li`/`render_numbered_li` pair).
//!
//! Depth-cap and list-item-child-kind enforcement are *not* done here —
//! that's `nesting.rs`'s job, run as a separate pass over the tree this
//! module returns, per the Design Notes' "factor the list-item algorithm out
//! of deep mutual recursion" instruction.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

use crate::classify;
use crate::context::Conversion;
use crate::model::{Annotations, Block, BlockKind, MediaSource, RichSpan, TextColor};
use crate::richtext;

static TR_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("valid selector"));
static CELL_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("td, th").expect("valid selector"));
static CAPTION_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("caption").expect("valid selector"));
static IMG_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("valid selector"));
static FIGCAPTION_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("figcaption").expect("valid selector"));
static TABLE_CAPTION_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Table\s+\d+\.").expect("valid regex"));

/// Entry point: walk a whole parsed document, returning the flat top-level
/// block stream (markers not yet allocated — that happens in `nesting.rs`).
pub fn walk_document(document: &Html, ctx: &mut Conversion) -> Vec<Block> {
    let mut blocks = walk_container(document.root_element(), ctx, 0);
    if ctx.options.orphan_list_repair {
        apply_orphan_list_repair(&mut blocks);
    }
    blocks
}

fn is_inline_tag(tag: &str) -> bool {
    matches!(
        tag,
        "span" | "strong" | "b" | "em" | "i" | "dfn" | "code" | "samp" | "kbd" | "a" | "br" | "abbr" | "img" | "iframe"
    )
}

fn element_classes(el: ElementRef) -> Vec<String> {
    el.value().classes().map(|c| c.to_string()).collect()
}

/// Walk `parent`'s direct children, treating runs of text/inline elements as
/// one paragraph's worth of inline content and dispatching recognized
/// block-level elements individually; unrecognized containers recurse
/// transparently. `skip_tags` lets a caller (e.g. `<figure>`) exclude
/// children it handles itself from the generic walk.
fn walk_container(parent: ElementRef, ctx: &mut Conversion, depth: u32) -> Vec<Block> {
    walk_container_filtered(parent, ctx, depth, &[])
}

fn walk_container_filtered(
    parent: ElementRef,
    ctx: &mut Conversion,
    depth: u32,
    skip_tags: &[&str],
) -> Vec<Block> {
    let children: Vec<ego_tree::NodeRef<Node>> = parent
        .children()
        .filter(|c| match c.value() {
            Node::Element(el) => !skip_tags.contains(&el.name()),
            _ => true,
        })
        .collect();

    let mut blocks = Vec::new();
    let mut pending: Vec<ego_tree::NodeRef<Node>> = Vec::new();
    let mut i = 0usize;
    while i < children.len() {
        let child = children[i];
        match child.value() {
            Node::Text(_) => {
                pending.push(child);
                i += 1;
            }
            Node::Element(el) => {
                let tag = el.name();
                if is_inline_tag(tag) {
                    pending.push(child);
                    i += 1;
                    continue;
                }
                flush_pending(&mut pending, ctx, &mut blocks);
                let Some(el_ref) = ElementRef::wrap(child) else {
                    i += 1;
                    continue;
                };

                if !ctx.options.strict_source_order
                    && matches!(tag, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
                    && collect_text_preview(el_ref).trim() == "Related Content"
                {
                    if let Some((list_ref, next_index)) = next_sibling_list(&children, i + 1) {
                        if ctx.claim_related_content() {
                            let mut link_items = Vec::new();
                            build_list(list_ref, ctx, depth, list_ref.value().name() == "ol", &mut link_items);
                            blocks.push(Block::new(BlockKind::Heading {
                                level: 3,
                                runs: vec![RichSpan::plain("Related Content")],
                                toggleable: true,
                                children: link_items,
                            }));
                        }
                        i = next_index + 1;
                        continue;
                    }
                }

                let classes = element_classes(el_ref);
                dispatch_block_element(el_ref, tag, &classes, ctx, depth, &mut blocks);
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
    }
    flush_pending(&mut pending, ctx, &mut blocks);
    blocks
}

/// Looks past whitespace-only text nodes starting at `from` for the next
/// `<ul>`/`<ol>` sibling, used to merge a bare `<h3>Related Content</h3>`
/// immediately followed by its link list (spec.md §8 Scenario F; the
/// `<nav>`/`contentPlaceholder` variant is handled separately in
/// `build_related_content`).
fn next_sibling_list<'a>(
    children: &[ego_tree::NodeRef<'a, Node>],
    from: usize,
) -> Option<(ElementRef<'a>, usize)> {
    let mut j = from;
    while j < children.len() {
        match children[j].value() {
            Node::Text(t) if t.trim().is_empty() => j += 1,
            Node::Element(el) if matches!(el.name(), "ul" | "ol") => {
                return ElementRef::wrap(children[j]).map(|r| (r, j));
            }
            _ => return None,
        }
    }
    None
}

fn flush_pending(pending: &mut Vec<ego_tree::NodeRef<Node>>, ctx: &mut Conversion, out: &mut Vec<Block>) {
    if pending.is_empty() {
        return;
    }
    let mut extraction = richtext::InlineExtraction::default();
    richtext::extract_inline_nodes(pending.drain(..), &Annotations::default(), &mut extraction, ctx);
    emit_text_and_media(extraction, ctx, out);
}

/// Turns an `InlineExtraction` into a `Paragraph`-or-`Callout` (if nonblank)
/// followed by its extracted images/videos, in that order.
fn emit_text_and_media(extraction: richtext::InlineExtraction, ctx: &mut Conversion, out: &mut Vec<Block>) {
    let nonblank = extraction
        .runs
        .iter()
        .any(|r| !matches!(r, RichSpan::Text { content, .. } if content.trim().is_empty()));
    if nonblank {
        push_paragraph_or_callout(extraction.runs, ctx, out);
    }
    out.extend(extraction.images);
    out.extend(extraction.videos);
}

fn push_paragraph_or_callout(runs: Vec<RichSpan>, ctx: &mut Conversion, out: &mut Vec<Block>) {
    let chunks = richtext::tokenize_rich_text(
        runs,
        ctx.options.max_rich_text_runs,
        ctx.options.max_content_chars,
        "paragraph",
        &mut ctx.diagnostics,
    );
    let plain = plain_text(&chunks[0]);
    if TABLE_CAPTION_TEXT.is_match(&plain) {
        if !ctx.claim_table_caption(&plain) {
            ctx.diagnostics.record_repair("suppress_duplicate_table_caption");
            return;
        }
        for runs in chunks {
            out.push(Block::new(BlockKind::Heading {
                level: 3,
                runs,
                toggleable: false,
                children: Vec::new(),
            }));
        }
        return;
    }
    if let Some((color, icon)) = classify::detect_admonition_label(&plain) {
        for runs in chunks {
            out.push(Block::new(BlockKind::Callout {
                runs,
                icon: icon.to_string(),
                color,
                children: Vec::new(),
            }));
        }
    } else {
        for runs in chunks {
            out.push(Block::new(BlockKind::Paragraph { runs }));
        }
    }
}

fn plain_text(runs: &[RichSpan]) -> String {
    runs.iter()
        .map(|r| match r {
            RichSpan::Text { content, .. } => content.clone(),
            RichSpan::Marker(token) => richtext::render_marker_text(token),
        })
        .collect::<String>()
}

#[allow(clippy::too_many_arguments)]
fn dispatch_block_element(
    el: ElementRef,
    tag: &str,
    classes: &[String],
    ctx: &mut Conversion,
    depth: u32,
    out: &mut Vec<Block>,
) {
    match tag {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => out.extend(build_heading(el, tag, ctx)),
        "p" => {
            let extraction = richtext::extract_rich_text(el, ctx);
            emit_text_and_media(extraction, ctx, out);
        }
        "ul" => build_list(el, ctx, depth, false, out),
        "ol" => build_list(el, ctx, depth, true, out),
        "table" => build_table(el, ctx, out),
        "pre" => out.extend(build_code(el, ctx)),
        "figure" => build_figure(el, ctx, depth, out),
        "dl" => out.extend(build_definition_list(el, ctx, depth)),
        "div" => build_div(el, classes, ctx, depth, out),
        "section" if classes.iter().any(|c| c == "prereq") => out.extend(build_prereq(el, ctx, depth)),
        "nav" => build_nav(el, ctx, depth, out),
        _ => out.extend(walk_container(el, ctx, depth)),
    }
}

fn build_heading(el: ElementRef, tag: &str, ctx: &mut Conversion) -> Vec<Block> {
    let level = tag
        .chars()
        .nth(1)
        .and_then(|c| c.to_digit(10))
        .unwrap_or(1)
        .min(3) as u8;
    let extraction = richtext::extract_rich_text(el, ctx);
    let chunks = richtext::tokenize_rich_text(
        extraction.runs,
        ctx.options.max_rich_text_runs,
        ctx.options.max_content_chars,
        "heading",
        &mut ctx.diagnostics,
    );
    chunks
        .into_iter()
        .map(|runs| {
            Block::new(BlockKind::Heading {
                level,
                runs,
                toggleable: false,
                children: Vec::new(),
            })
        })
        .collect()
}

/// Promote the first `Paragraph` in `items` (if any) into the owning
/// container's own runs, per the list-item/callout/prereq "promoted
/// paragraph" rule (spec.md §4.4 state machine, GLOSSARY). Leaves `items`
/// holding whatever remains.
fn promote_leading_paragraph(items: &mut Vec<Block>) -> Vec<RichSpan> {
    if !items.is_empty() && matches!(items[0].kind, BlockKind::Paragraph { .. }) {
        let first = items.remove(0);
        if let BlockKind::Paragraph { runs } = first.kind {
            return runs;
        }
    }
    Vec::new()
}

fn build_list(el: ElementRef, ctx: &mut Conversion, depth: u32, ordered: bool, out: &mut Vec<Block>) {
    for li in el.children().filter_map(ElementRef::wrap) {
        if li.value().name() != "li" {
            continue;
        }
        out.extend(build_list_item(li, ctx, depth, ordered));
    }
}

/// Promote the item's leading paragraph(s) into the list item's own runs.
/// `push_paragraph_or_callout` may already have split an overlong paragraph
/// into several consecutive sibling `Paragraph` blocks (spec.md §4.3's
/// run-count cap); each one becomes its own sibling list item here rather
/// than only the first, per the boundary behavior "a list item with 120
/// formatting runs -> 2 sibling list items of 100 and 20 runs, identical
/// text on concatenation" — only the last item keeps the real children that
/// followed the text.
fn build_list_item(li: ElementRef, ctx: &mut Conversion, depth: u32, ordered: bool) -> Vec<Block> {
    let mut items = walk_container(li, ctx, depth + 1);
    let mut leading_runs = Vec::new();
    while !items.is_empty() && matches!(items[0].kind, BlockKind::Paragraph { .. }) {
        let first = items.remove(0);
        if let BlockKind::Paragraph { runs } = first.kind {
            leading_runs.push(runs);
        }
    }
    if leading_runs.is_empty() {
        leading_runs.push(Vec::new());
    }
    let last = leading_runs.len() - 1;
    let mut out = Vec::with_capacity(leading_runs.len());
    for (i, runs) in leading_runs.into_iter().enumerate() {
        let children = if i == last { std::mem::take(&mut items) } else { Vec::new() };
        let kind = if ordered {
            BlockKind::NumberedListItem { runs, children }
        } else {
            BlockKind::BulletedListItem { runs, children }
        };
        out.push(Block::new(kind));
    }
    out
}

/// Experimental (opt-in): attaches a numbered list that immediately follows
/// a colon-terminated, childless bulleted item as that item's children,
/// rather than leaving it as an unrelated top-level sibling list. spec.md's
/// Open Questions mark this heuristic lossy; it is applied once, here, over
/// the finished top-level stream (Open Question decision: opt-in, not
/// default).
fn apply_orphan_list_repair(blocks: &mut Vec<Block>) {
    let mut i = 0;
    while i + 1 < blocks.len() {
        let absorbs = matches!(
            &blocks[i].kind,
            BlockKind::BulletedListItem { runs, children }
                if children.is_empty() && plain_text(runs).trim_end().ends_with(':')
        ) && matches!(blocks[i + 1].kind, BlockKind::NumberedListItem { .. });
        if absorbs {
            let mut absorbed = Vec::new();
            while i + 1 < blocks.len() && matches!(blocks[i + 1].kind, BlockKind::NumberedListItem { .. }) {
                absorbed.push(blocks.remove(i + 1));
            }
            if let BlockKind::BulletedListItem { children, .. } = &mut blocks[i].kind {
                children.extend(absorbed);
            }
        }
        i += 1;
    }
}

fn is_in_thead(el: ElementRef) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name() == "thead")
}

fn build_cell(cell: ElementRef, ctx: &mut Conversion) -> (Vec<RichSpan>, Vec<Block>) {
    let has_disallowed_content = cell.children().filter_map(ElementRef::wrap).any(|c| {
        matches!(
            c.value().name(),
            "img" | "table" | "ul" | "ol" | "figure" | "div"
        )
    });
    if has_disallowed_content {
        let hoisted = walk_container(cell, ctx, 0);
        (vec![RichSpan::plain("[see content below]")], hoisted)
    } else {
        let extraction = richtext::extract_rich_text(cell, ctx);
        let runs = richtext::tokenize_rich_text_capped(
            extraction.runs,
            ctx.options.max_rich_text_runs,
            ctx.options.max_content_chars,
            "table_row",
            &mut ctx.diagnostics,
        );
        (runs, extraction.images.into_iter().chain(extraction.videos).collect())
    }
}

fn build_table(el: ElementRef, ctx: &mut Conversion, out: &mut Vec<Block>) {
    let fingerprint = format!(
        "{}:{}",
        el.value().attr("id").unwrap_or(""),
        el.html().chars().take(100).collect::<String>()
    );
    if !ctx.claim_table_fingerprint(&fingerprint) {
        ctx.diagnostics.record_repair("suppress_duplicate_table");
        return;
    }

    if let Some(caption_el) = el.select(&CAPTION_SEL).next() {
        let text = richtext::extract_rich_text(caption_el, ctx).runs;
        let chunks = richtext::tokenize_rich_text(
            text,
            ctx.options.max_rich_text_runs,
            ctx.options.max_content_chars,
            "heading",
            &mut ctx.diagnostics,
        );
        let plain = plain_text(&chunks[0]);
        if ctx.claim_table_caption(&plain) {
            for runs in chunks {
                out.push(Block::new(BlockKind::Heading {
                    level: 3,
                    runs,
                    toggleable: false,
                    children: Vec::new(),
                }));
            }
        }
    }

    let mut rows = Vec::new();
    let mut hoisted = Vec::new();
    let mut header_row = false;
    let mut width = 0u32;
    for (i, tr) in el.select(&TR_SEL).enumerate() {
        let mut cells = Vec::new();
        for cell in tr.select(&CELL_SEL) {
            let (runs, cell_hoisted) = build_cell(cell, ctx);
            cells.push(runs);
            hoisted.extend(cell_hoisted);
        }
        width = width.max(cells.len() as u32);
        if i == 0 && is_in_thead(tr) {
            header_row = true;
        }
        rows.push(crate::model::TableRow { cells });
    }

    out.push(Block::new(BlockKind::Table { width, header_row, rows }));
    out.extend(hoisted);
}

static LANGUAGE_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"language-([\w-]+)").expect("valid regex"));

fn detect_language(el: ElementRef) -> crate::model::Language {
    use crate::model::Language;
    let mut candidates: Vec<String> = element_classes(el);
    if let Some(code_el) = el
        .children()
        .filter_map(ElementRef::wrap)
        .find(|c| c.value().name() == "code")
    {
        candidates.extend(element_classes(code_el));
        if let Some(lang) = code_el.value().attr("data-language") {
            candidates.push(format!("language-{lang}"));
        }
    }
    if let Some(lang) = el.value().attr("data-language") {
        candidates.push(format!("language-{lang}"));
    }
    let tag = candidates.iter().find_map(|c| {
        LANGUAGE_CLASS
            .captures(c)
            .map(|caps| caps[1].to_ascii_lowercase())
    });
    match tag.as_deref() {
        Some("rust" | "rs") => Language::Rust,
        Some("javascript" | "js") => Language::JavaScript,
        Some("typescript" | "ts") => Language::TypeScript,
        Some("python" | "py") => Language::Python,
        Some("json") => Language::Json,
        Some("bash" | "sh" | "shell") => Language::Shell,
        Some("html") => Language::Html,
        Some("css") => Language::Css,
        Some("sql") => Language::Sql,
        Some("xml") => Language::Xml,
        Some("yaml" | "yml") => Language::Yaml,
        Some("markdown" | "md") => Language::Markdown,
        Some("java") => Language::Java,
        Some("go" | "golang") => Language::Go,
        Some("ruby" | "rb") => Language::Ruby,
        _ => Language::PlainText,
    }
}

fn build_code(el: ElementRef, ctx: &mut Conversion) -> Vec<Block> {
    let language = detect_language(el);
    let raw_text: String = el.text().collect();
    let chunks = richtext::split_on_boundary(&raw_text, ctx.options.max_content_chars);
    if chunks.len() > 1 {
        ctx.diagnostics.record_repair("split_overlong_code_block");
    }
    chunks
        .into_iter()
        .filter(|c| !c.is_empty())
        .map(|c| Block::new(BlockKind::Code { runs: vec![RichSpan::plain(c)], language }))
        .collect()
}

fn build_figure(el: ElementRef, ctx: &mut Conversion, depth: u32, out: &mut Vec<Block>) {
    let caption_runs = el
        .select(&FIGCAPTION_SEL)
        .next()
        .map(|fc| richtext::extract_rich_text(fc, ctx).runs)
        .unwrap_or_default();

    if let Some(img_el) = el.select(&IMG_SEL).next() {
        let src = img_el.value().attr("src").unwrap_or("").trim().to_string();
        if !src.is_empty() && ctx.claim_image_url(&src) {
            out.push(Block::new(BlockKind::Image {
                source: MediaSource::External(src.clone()),
                caption: caption_runs,
                source_url: Some(src),
            }));
        }
    }

    out.extend(walk_container_filtered(el, ctx, depth, &["img", "figcaption"]));
}

fn build_definition_list(el: ElementRef, ctx: &mut Conversion, depth: u32) -> Vec<Block> {
    let mut out = Vec::new();
    for child in el.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "dt" => {
                let extraction = richtext::extract_rich_text(child, ctx);
                let text = plain_text(&extraction.runs);
                if !text.trim().is_empty() {
                    out.push(Block::new(BlockKind::Paragraph {
                        runs: vec![RichSpan::Text {
                            content: text,
                            annotations: Annotations {
                                bold: true,
                                ..Default::default()
                            },
                            link: None,
                        }],
                    }));
                }
                out.extend(extraction.images);
                out.extend(extraction.videos);
            }
            "dd" => out.extend(walk_container(child, ctx, depth)),
            _ => {}
        }
    }
    out
}

/// Replace any nested `Callout` found in `items` with its own runs (as a
/// `Paragraph`, so it remains promotable) followed by its children, flattened
/// one level: Notion disallows nested callouts, so the source's inner
/// admonition becomes part of the outer one's text instead of a child block
/// (spec.md §8 boundary behavior: "a callout containing a callout").
fn flatten_nested_callouts(items: Vec<Block>) -> Vec<Block> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        if let BlockKind::Callout { runs, children, .. } = item.kind {
            out.push(Block::new(BlockKind::Paragraph { runs }));
            out.extend(flatten_nested_callouts(children));
        } else {
            out.push(item);
        }
    }
    out
}

fn build_prereq(el: ElementRef, ctx: &mut Conversion, depth: u32) -> Vec<Block> {
    let mut items = flatten_nested_callouts(walk_container(el, ctx, depth + 1));
    let runs = promote_leading_paragraph(&mut items);
    vec![Block::new(BlockKind::Callout {
        runs,
        icon: "\u{1f4cd}".to_string(),
        color: TextColor::Default,
        children: items,
    })]
}

fn build_callout_div(el: ElementRef, color: TextColor, icon: &str, ctx: &mut Conversion, depth: u32, out: &mut Vec<Block>) {
    let mut items = flatten_nested_callouts(walk_container(el, ctx, depth + 1));
    let runs = promote_leading_paragraph(&mut items);
    out.push(Block::new(BlockKind::Callout {
        runs,
        icon: icon.to_string(),
        color,
        children: items,
    }));
}

fn is_related_content_container(el: ElementRef, classes: &[String]) -> bool {
    let marks_contentplaceholder = classes.iter().any(|c| c == "contentPlaceholder");
    let is_nav = el.value().name() == "nav";
    (marks_contentplaceholder || is_nav) && collect_text_preview(el).contains("Related Content")
}

fn collect_text_preview(el: ElementRef) -> String {
    el.text().collect::<String>()
}

fn build_nav(el: ElementRef, ctx: &mut Conversion, depth: u32, out: &mut Vec<Block>) {
    let classes = element_classes(el);
    if is_related_content_container(el, &classes) {
        build_related_content(el, ctx, out);
    } else {
        out.extend(walk_container(el, ctx, depth));
    }
}

/// Open Question decision: detect the "Related Content" pattern once, here,
/// regardless of whether it arrived via `<nav>` or
/// `<div class="contentPlaceholder">`, and suppress any further occurrence
/// in this conversion (spec.md §9 Open Questions, Scenario F).
fn build_related_content(el: ElementRef, ctx: &mut Conversion, out: &mut Vec<Block>) {
    if !ctx.claim_related_content() {
        return;
    }
    let items = walk_container(el, ctx, 2);
    let links: Vec<Block> = items
        .into_iter()
        .filter(|b| matches!(b.kind, BlockKind::BulletedListItem { .. } | BlockKind::NumberedListItem { .. }))
        .collect();
    out.push(Block::new(BlockKind::Heading {
        level: 3,
        runs: vec![RichSpan::plain("Related Content")],
        toggleable: true,
        children: links,
    }));
}

fn build_div(el: ElementRef, classes: &[String], ctx: &mut Conversion, depth: u32, out: &mut Vec<Block>) {
    if is_related_content_container(el, classes) {
        build_related_content(el, ctx, out);
        return;
    }
    if let Some((color, icon)) = classify::callout_style_for_class(classes) {
        build_callout_div(el, color, icon, ctx, depth, out);
        return;
    }
    if classes.iter().any(|c| c == "p") {
        let extraction = richtext::extract_rich_text(el, ctx);
        emit_text_and_media(extraction, ctx, out);
        return;
    }
    out.extend(walk_container(el, ctx, depth));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConvertOptions;

    fn convert(html: &str) -> Vec<Block> {
        convert_with_options(html, ConvertOptions::default())
    }

    fn convert_with_options(html: &str, options: ConvertOptions) -> Vec<Block> {
        let mut report = crate::diagnostics::AuditReport::default();
        let normalized = crate::dom::normalize(html, options.preserve_ui_controls_as_paragraphs, &mut report);
        let document = crate::dom::parse(&normalized);
        let mut ctx = Conversion::new(options);
        walk_document(&document, &mut ctx)
    }

    #[test]
    fn simple_paragraph_round_trips_as_text() {
        let blocks = convert("<p>Hello world</p>");
        assert_eq!(blocks.len(), 1);
        match &blocks[0].kind {
            BlockKind::Paragraph { runs } => assert_eq!(plain_text(runs), "Hello world"),
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn menu_cascade_scenario_a() {
        let blocks = convert(
            r#"<p>Navigate to <span class="menucascade"><span class="ph uicontrol">Workspace</span><abbr>&gt;</abbr><span class="ph uicontrol">Roles</span></span>.</p>"#,
        );
        assert_eq!(blocks.len(), 1);
        match &blocks[0].kind {
            BlockKind::Paragraph { runs } => {
                let plain = plain_text(runs);
                assert!(plain.contains("Navigate to"));
                assert!(plain.contains("Workspace > Roles"));
                let workspace = runs.iter().find_map(|r| match r {
                    RichSpan::Text { content, annotations, .. } if content.contains("Workspace") => {
                        Some(annotations.clone())
                    }
                    _ => None,
                });
                let workspace = workspace.expect("a run carrying the Workspace label");
                assert!(workspace.bold, "uicontrol labels stay bold through the cascade merge");
                assert_eq!(workspace.color, TextColor::Blue);
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn table_with_caption_paragraph_scenario_c() {
        let blocks = convert(
            r#"<p>Table 1. Role matrix</p><table><thead><tr><th>Role</th><th>Access</th></tr></thead><tbody><tr><td>admin</td><td>full</td></tr></tbody></table>"#,
        );
        assert_eq!(blocks.len(), 2);
        assert!(matches!(blocks[0].kind, BlockKind::Heading { level: 3, .. }));
        match &blocks[1].kind {
            BlockKind::Table { width, header_row, rows } => {
                assert_eq!(*width, 2);
                assert!(*header_row);
                assert_eq!(rows.len(), 2);
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn list_item_with_table_defers_via_children_scenario_d() {
        let blocks = convert(
            "<ol><li>Configure the following settings: <table><tr><td>x</td></tr></table></li><li>Save.</li></ol>",
        );
        assert_eq!(blocks.len(), 2);
        match &blocks[0].kind {
            BlockKind::NumberedListItem { runs, children } => {
                assert!(plain_text(runs).starts_with("Configure the following settings:"));
                assert_eq!(children.len(), 1);
                assert!(matches!(children[0].kind, BlockKind::Table { .. }));
            }
            other => panic!("expected numbered list item, got {other:?}"),
        }
    }

    #[test]
    fn related_content_scenario_f() {
        let blocks = convert(
            r#"<h3>Related Content</h3><ul><li><a href="/docs/x">X</a></li><li><a href="/docs/y">Y</a></li></ul>"#,
        );
        assert_eq!(blocks.len(), 1);
        match &blocks[0].kind {
            BlockKind::Heading {
                level,
                toggleable,
                children,
                ..
            } => {
                assert_eq!(*level, 3);
                assert!(*toggleable);
                assert_eq!(children.len(), 2);
            }
            other => panic!("expected toggleable heading, got {other:?}"),
        }
    }

    #[test]
    fn strict_source_order_disables_related_content_lookahead_merge() {
        let html = r#"<h3>Related Content</h3><ul><li><a href="/docs/x">X</a></li><li><a href="/docs/y">Y</a></li></ul>"#;
        let options = ConvertOptions {
            strict_source_order: true,
            ..ConvertOptions::default()
        };
        let blocks = convert_with_options(html, options);
        assert_eq!(blocks.len(), 2, "heading and list stay separate, unmerged top-level blocks");
        assert!(matches!(
            blocks[0].kind,
            BlockKind::Heading { toggleable: false, .. }
        ));
        assert!(matches!(blocks[1].kind, BlockKind::BulletedListItem { .. }));
    }

    #[test]
    fn ui_chrome_preserved_as_paragraph_option_reaches_the_wire() {
        let options = ConvertOptions {
            preserve_ui_controls_as_paragraphs: true,
            ..ConvertOptions::default()
        };
        let blocks = convert_with_options(
            r#"<div class="zDocsBreadcrumbs">Home &gt; Docs</div>"#,
            options,
        );
        assert_eq!(blocks.len(), 1);
        assert!(matches!(blocks[0].kind, BlockKind::Paragraph { .. }));
    }
}
