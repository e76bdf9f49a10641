//! `TokenizeRichText` (spec.md §4.3): turns a run list into Notion-legal rich
//! text by enforcing the 100-run / 2000-char caps, splitting overlong runs on
//! whitespace boundaries where possible, and rendering marker spans to their
//! textual token form. The split logic is new (nuc2not never had a content
//! cap to enforce — Markdown source was short enough that it never hit
//! Notion's limits) but the cap-then-truncate-with-a-diagnostic shape matches
//! the defensive style of nuc2not's `retries.rs` surfacing `NotionClientError`
//! as a typed outcome rather than panicking.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Node};

use crate::classify::{self, InlineDirective};
use crate::context::Conversion;
use crate::diagnostics::AuditReport;
use crate::model::{Annotations, Block, BlockKind, MediaSource, RichSpan};

/// Render a marker token to its textual form embedded in a host's rich text,
/// per spec.md §4.6: `" (marker:XXXX)"` appended as a plain, unannotated run.
pub fn render_marker_text(token: &str) -> String {
    format!(" (marker:{token})")
}

/// Side output of walking one element's inline content: the text runs ready
/// for the host block, plus any `Image`/`Video`/`Embed` blocks extracted from
/// `<img>`/`<iframe>` descendants, which are emitted as siblings adjacent to
/// the host (spec.md §4.3 steps 2-3).
#[derive(Debug, Default)]
pub struct InlineExtraction {
    pub runs: Vec<RichSpan>,
    pub images: Vec<Block>,
    pub videos: Vec<Block>,
}

static KNOWN_VIDEO_HOSTS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "vimeo.com",
    "wistia.com",
    "wistia.net",
    "loom.com",
    "brightcove.net",
    "vidyard.com",
];

static TECHNICAL_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z0-9]+(?:[._][A-Za-z0-9]+)+\b").expect("valid regex"));

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{2,}").expect("valid regex"));

fn normalize_whitespace(text: &str) -> String {
    let collapsed_blank_lines = BLANK_LINES.replace_all(text, "\n\n");
    WHITESPACE_RUN
        .replace_all(&collapsed_blank_lines, " ")
        .into_owned()
}

/// Normalize an `href` the way ServiceNow-relative links need: `/foo` becomes
/// an absolute URL against the documentation site; anything that still
/// doesn't parse as absolute HTTP(S) with a host is rejected (spec.md §4.2,
/// AnnotatedRun's link invariant).
pub fn normalize_href(href: &str) -> Option<String> {
    let candidate = if href.starts_with('/') {
        format!("https://www.servicenow.com{href}")
    } else {
        href.to_string()
    };
    let url = url::Url::parse(&candidate).ok()?;
    if (url.scheme() == "http" || url.scheme() == "https") && url.host().is_some() {
        Some(url.to_string())
    } else {
        None
    }
}

fn classify_iframe_src(src: &str) -> BlockKind {
    let is_video = KNOWN_VIDEO_HOSTS.iter().any(|host| src.contains(host));
    if is_video {
        BlockKind::Video {
            external_url: src.to_string(),
        }
    } else {
        BlockKind::Embed { url: src.to_string() }
    }
}

/// Wrap bare dotted/underscored technical identifiers in inline code, per the
/// §4.2 technical-identifier heuristic, splitting `text` into alternating
/// plain/code runs sharing `base` as their starting annotation set.
fn wrap_technical_identifiers(text: &str, base: &Annotations) -> Vec<RichSpan> {
    if base.code || !TECHNICAL_IDENTIFIER.is_match(text) {
        if text.is_empty() {
            return Vec::new();
        }
        return vec![RichSpan::Text {
            content: text.to_string(),
            annotations: base.clone(),
            link: None,
        }];
    }
    let mut runs = Vec::new();
    let mut last = 0;
    for m in TECHNICAL_IDENTIFIER.find_iter(text) {
        if m.start() > last {
            runs.push(RichSpan::Text {
                content: text[last..m.start()].to_string(),
                annotations: base.clone(),
                link: None,
            });
        }
        let mut code_annotations = base.clone();
        code_annotations.code = true;
        runs.push(RichSpan::Text {
            content: m.as_str().to_string(),
            annotations: code_annotations,
            link: None,
        });
        last = m.end();
    }
    if last < text.len() {
        runs.push(RichSpan::Text {
            content: text[last..].to_string(),
            annotations: base.clone(),
            link: None,
        });
    }
    runs
}

fn merge_annotation(base: &Annotations, overlay: Annotations) -> Annotations {
    Annotations {
        bold: base.bold || overlay.bold,
        italic: base.italic || overlay.italic,
        strikethrough: base.strikethrough || overlay.strikethrough,
        underline: base.underline || overlay.underline,
        code: base.code || overlay.code,
        color: if matches!(overlay.color, crate::model::TextColor::Default) {
            base.color
        } else {
            overlay.color
        },
    }
}

fn element_classes(el: &ElementRef) -> Vec<String> {
    el.value().classes().map(|c| c.to_string()).collect()
}

fn collect_plain_text(el: ElementRef) -> String {
    normalize_whitespace(&el.text().collect::<String>()).trim().to_string()
}

fn handle_inline_img(el: ElementRef, out: &mut InlineExtraction, ctx: &mut Conversion) {
    let src = el.value().attr("src").unwrap_or("").trim().to_string();
    if src.is_empty() {
        return;
    }
    let alt = el.value().attr("alt").unwrap_or("").to_string();
    let width = el.value().attr("width").and_then(|v| v.parse::<u32>().ok());
    let height = el.value().attr("height").and_then(|v| v.parse::<u32>().ok());
    if let (Some(w), Some(h)) = (width, height) {
        if w < ctx.options.image_min_dimension && h < ctx.options.image_min_dimension {
            ctx.diagnostics.record_repair("drop_decorative_icon");
            return;
        }
    }
    if !ctx.claim_image_url(&src) {
        return;
    }
    let caption = if alt.trim().is_empty() {
        Vec::new()
    } else {
        vec![RichSpan::plain(alt)]
    };
    out.images.push(Block::new(BlockKind::Image {
        source: MediaSource::External(src.clone()),
        caption,
        source_url: Some(src),
    }));
}

fn handle_iframe(el: ElementRef, out: &mut InlineExtraction) {
    let src = el.value().attr("src").unwrap_or("").trim().to_string();
    if src.is_empty() {
        return;
    }
    out.videos.push(Block::new(classify_iframe_src(&src)));
}

fn handle_link(el: ElementRef, base: &Annotations, out: &mut InlineExtraction, ctx: &mut Conversion) {
    let href = el.value().attr("href").map(|h| h.to_string());
    let normalized = href.as_deref().and_then(normalize_href);
    let mut inner = InlineExtraction::default();
    extract_inline_nodes(el.children(), base, &mut inner, ctx);
    if inner.runs.is_empty() && normalized.is_some() {
        let text = collect_plain_text(el);
        if !text.is_empty() {
            inner.runs.push(RichSpan::Text {
                content: text,
                annotations: base.clone(),
                link: None,
            });
        }
    }
    for run in inner.runs {
        match run {
            RichSpan::Text {
                content,
                annotations,
                ..
            } => out.runs.push(RichSpan::Text {
                content,
                annotations,
                link: normalized.clone(),
            }),
            marker => out.runs.push(marker),
        }
    }
    out.images.extend(inner.images);
    out.videos.extend(inner.videos);
}

/// Recursively walk the inline children of a text-bearing element, building
/// up `out` by folding an active-annotation stack (`base`) over the tree
/// (spec.md §4.3 steps 4, 5, 7 combined into one direct tree walk rather than
/// a sentinel-token round trip through a second text pass).
pub fn extract_inline_nodes<'a>(
    children: impl Iterator<Item = ego_tree::NodeRef<'a, Node>>,
    base: &Annotations,
    out: &mut InlineExtraction,
    ctx: &mut Conversion,
) {
    for child in children {
        match child.value() {
            Node::Text(text) => {
                let normalized = normalize_whitespace(text);
                if normalized.trim().is_empty() {
                    continue;
                }
                out.runs.extend(wrap_technical_identifiers(&normalized, base));
            }
            Node::Element(el) => {
                let Some(el_ref) = ElementRef::wrap(child) else { continue };
                let tag = el.name();
                match tag {
                    "img" => handle_inline_img(el_ref, out, ctx),
                    "iframe" => handle_iframe(el_ref, out),
                    "br" => out.runs.push(RichSpan::plain("\n")),
                    "a" => handle_link(el_ref, base, out, ctx),
                    "kbd" => {
                        let content = collect_plain_text(el_ref);
                        if !content.is_empty() {
                            let ann = classify::classify_kbd(&content).into_annotations();
                            let merged = merge_annotation(base, ann);
                            out.runs.push(RichSpan::Text {
                                content,
                                annotations: merged,
                                link: None,
                            });
                        }
                    }
                    _ => {
                        let classes = element_classes(&el_ref);
                        match classify::classify_inline(tag, &classes) {
                            InlineDirective::Drop => {}
                            InlineDirective::Annotate(ann) => {
                                let merged = merge_annotation(base, ann.into_annotations());
                                extract_inline_nodes(el_ref.children(), &merged, out, ctx);
                            }
                            InlineDirective::Transparent => {
                                extract_inline_nodes(el_ref.children(), base, out, ctx);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

/// Entry point for a whole text-bearing element (spec.md §4.3 contract).
pub fn extract_rich_text(el: ElementRef, ctx: &mut Conversion) -> InlineExtraction {
    let mut out = InlineExtraction::default();
    extract_inline_nodes(el.children(), &Annotations::default(), &mut out, ctx);
    out
}

/// Split `content` into chunks no longer than `max_chars` code points,
/// preferring to break on whitespace within the last 20% of the window so
/// words aren't sheared in two; falls back to a hard cut if no boundary is
/// found.
pub(crate) fn split_on_boundary(content: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 {
        return vec![content.to_string()];
    }
    let chars: Vec<char> = content.chars().collect();
    if chars.len() <= max_chars {
        return vec![content.to_string()];
    }
    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < chars.len() {
        let remaining = chars.len() - start;
        if remaining <= max_chars {
            chunks.push(chars[start..].iter().collect());
            break;
        }
        let window_end = start + max_chars;
        let search_floor = start + (max_chars * 4 / 5);
        let mut cut = window_end;
        for i in (search_floor..window_end).rev() {
            if chars[i].is_whitespace() {
                cut = i + 1;
                break;
            }
        }
        if cut <= start {
            cut = window_end;
        }
        chunks.push(chars[start..cut].iter().collect());
        start = cut;
    }
    chunks
}

fn expand_runs(
    runs: Vec<RichSpan>,
    max_content_chars: usize,
    context: &str,
    report: &mut AuditReport,
) -> Vec<RichSpan> {
    let mut expanded = Vec::with_capacity(runs.len());
    for run in runs {
        match run {
            RichSpan::Text {
                content,
                annotations,
                link,
            } => {
                let chunks = split_on_boundary(&content, max_content_chars);
                if chunks.len() > 1 {
                    report.record_repair(&format!("split_overlong_run:{context}"));
                }
                for chunk in chunks {
                    if chunk.is_empty() {
                        continue;
                    }
                    expanded.push(RichSpan::Text {
                        content: chunk,
                        annotations: annotations.clone(),
                        link: link.clone(),
                    });
                }
            }
            RichSpan::Marker(token) => {
                expanded.push(RichSpan::Text {
                    content: render_marker_text(&token),
                    annotations: Default::default(),
                    link: None,
                });
            }
        }
    }
    expanded
}

/// Normalize a run list to Notion's per-block caps. Character-length
/// overflow is split on a whitespace boundary within a single run (folded
/// into `expand_runs`); run-count overflow past `max_rich_text_runs` is split
/// into multiple same-length chunks instead of being dropped, one chunk per
/// sibling block the caller builds of the same kind, preserving order and
/// leaving the concatenation of all chunks' text identical to the
/// unsplit input (spec.md §4.3 step 8, invariant 3). This generalizes
/// `walk.rs::build_code`'s existing code-block splitting from one split axis
/// (content length) to both axes.
pub fn tokenize_rich_text(
    runs: Vec<RichSpan>,
    max_rich_text_runs: usize,
    max_content_chars: usize,
    context: &str,
    report: &mut AuditReport,
) -> Vec<Vec<RichSpan>> {
    let expanded = expand_runs(runs, max_content_chars, context, report);
    if max_rich_text_runs == 0 || expanded.len() <= max_rich_text_runs {
        return vec![expanded];
    }
    report.record_repair(&format!("split_overlong_run_set:{context}"));
    expanded.chunks(max_rich_text_runs).map(|c| c.to_vec()).collect()
}

/// Variant of `tokenize_rich_text` for a host that can't grow sibling
/// blocks — a table cell is a leaf in its row's fixed cell array, not an
/// independently emittable block — so run-count overflow is truncated
/// instead of split, same as this crate's earlier, cruder behavior
/// everywhere.
pub fn tokenize_rich_text_capped(
    runs: Vec<RichSpan>,
    max_rich_text_runs: usize,
    max_content_chars: usize,
    context: &str,
    report: &mut AuditReport,
) -> Vec<RichSpan> {
    let mut expanded = expand_runs(runs, max_content_chars, context, report);
    if expanded.len() > max_rich_text_runs {
        report.record_repair(&format!("truncate_rich_text_runs:{context}"));
        expanded.truncate(max_rich_text_runs);
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Annotations;

    fn plain(s: &str) -> RichSpan {
        RichSpan::Text {
            content: s.to_string(),
            annotations: Annotations::default(),
            link: None,
        }
    }

    #[test]
    fn short_runs_pass_through_unchanged() {
        let mut report = AuditReport::default();
        let out = tokenize_rich_text(vec![plain("hello")], 100, 2000, "paragraph", &mut report);
        assert_eq!(out, vec![vec![plain("hello")]]);
        assert!(report.repairs_applied.is_empty());
    }

    #[test]
    fn overlong_run_splits_on_whitespace() {
        let mut report = AuditReport::default();
        let long = "word ".repeat(500);
        let out = tokenize_rich_text(vec![plain(&long)], 100, 2000, "paragraph", &mut report);
        assert_eq!(out.len(), 1, "run count stays under the cap, so no sibling split");
        let runs = &out[0];
        assert!(runs.len() > 1);
        for run in runs {
            assert!(run.content_len() <= 2000);
        }
        assert_eq!(report.repairs_applied.get("split_overlong_run:paragraph"), Some(&1));
    }

    #[test]
    fn excess_runs_split_into_sibling_chunks() {
        let mut report = AuditReport::default();
        let runs: Vec<RichSpan> = (0..150).map(|i| plain(&i.to_string())).collect();
        let expected_text: String = runs
            .iter()
            .map(|r| match r {
                RichSpan::Text { content, .. } => content.as_str(),
                _ => unreachable!(),
            })
            .collect();
        let chunks = tokenize_rich_text(runs, 100, 2000, "paragraph", &mut report);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[1].len(), 50);
        let joined: String = chunks
            .iter()
            .flatten()
            .map(|r| match r {
                RichSpan::Text { content, .. } => content.as_str(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(joined, expected_text);
        assert_eq!(report.repairs_applied.get("split_overlong_run_set:paragraph"), Some(&1));
    }

    #[test]
    fn table_cell_runs_are_truncated_not_split() {
        let mut report = AuditReport::default();
        let runs: Vec<RichSpan> = (0..150).map(|i| plain(&i.to_string())).collect();
        let out = tokenize_rich_text_capped(runs, 100, 2000, "table_row", &mut report);
        assert_eq!(out.len(), 100);
        assert_eq!(report.repairs_applied.get("truncate_rich_text_runs:table_row"), Some(&1));
    }

    #[test]
    fn marker_renders_to_textual_token() {
        let mut report = AuditReport::default();
        let out = tokenize_rich_text(
            vec![RichSpan::Marker("AB12".to_string())],
            100,
            2000,
            "paragraph",
            &mut report,
        );
        assert_eq!(out, vec![vec![plain(" (marker:AB12)")]]);
    }
}
