//! `NormalizeHTML` (spec.md §4.1): a best-effort, never-failing string
//! repair pass that runs before parsing, grounded in the
//! `once_cell::sync::Lazy<Regex>` table idiom of
//! `spider_transformations::html2md` (`other_examples/e33fd105_...`), which
//! runs a fixed sequence of regex substitutions over markup text the same
//! way. Every repair records into the `AuditReport` it's handed.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::diagnostics::AuditReport;

static SCRIPT_STYLE_SVG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style|svg)\b[^>]*>.*?</\1\s*>").expect("valid regex pattern")
});

static ARTICLE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<article\b").expect("valid regex pattern"));
static ARTICLE_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</article\s*>").expect("valid regex pattern"));

static TABLE_CLOSE_COLLAPSE_3: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</table>\s*</div>\s*</div>\s*</div>").expect("valid regex pattern"));
static TABLE_CLOSE_COLLAPSE_2: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</table>\s*</div>\s*</div>").expect("valid regex pattern"));

static MENUCASCADE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<span[^>]*class="[^"]*menucascade[^"]*"[^>]*>(.*?)</span>"#)
        .expect("valid regex pattern")
});
static MENUCASCADE_SEP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<abbr[^>]*>\s*&gt;\s*</abbr>").expect("valid regex pattern"));

static WRAPPER_DIV: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<div[^>]*class="[^"]*(?:dataTables_wrapper|zDocsFilterTableDiv)[^"]*"[^>]*>(.*?)</div>"#,
    )
    .expect("valid regex pattern")
});

static PLACEHOLDER_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&lt;([a-zA-Z][\w\s-]*)&gt;").expect("valid regex pattern"));

/// HTML tag names that a bracketed token is allowed to actually be; anything
/// else that looks like `<token>` is treated as an authored placeholder
/// (e.g. `<plugin name>`) rather than markup, per spec.md §4.1 repair 7.
fn is_known_tag(name: &str) -> bool {
    const KNOWN: &[&str] = &[
        "a", "abbr", "article", "b", "blockquote", "br", "caption", "code", "dd", "dfn", "div",
        "dl", "dt", "em", "figcaption", "figure", "h1", "h2", "h3", "h4", "h5", "h6", "i", "iframe",
        "img", "kbd", "li", "nav", "ol", "p", "pre", "samp", "section", "span", "strong", "table",
        "tbody", "td", "th", "thead", "tr", "ul",
    ];
    KNOWN.contains(&name.trim().to_ascii_lowercase().as_str())
}

/// Run all normalization repairs over raw HTML, returning cleaned HTML ready
/// for `scraper::Html::parse_fragment`. Never fails; steps that don't apply
/// are no-ops. `report` accumulates one counter increment per repair kind
/// that actually fired. `preserve_ui_controls_as_paragraphs` controls what
/// happens to a matched UI-chrome div: dropped entirely (default) or kept as
/// a plain paragraph of its text (`ConvertOptions::preserve_ui_controls_as_paragraphs`).
pub fn normalize(raw: &str, preserve_ui_controls_as_paragraphs: bool, report: &mut AuditReport) -> String {
    let mut html = raw.to_string();

    if SCRIPT_STYLE_SVG.is_match(&html) {
        html = SCRIPT_STYLE_SVG.replace_all(&html, "").into_owned();
        report.record_repair("strip_script_style_svg");
    }

    html = strip_ui_chrome_comments(&html, preserve_ui_controls_as_paragraphs, report);

    html = fix_excess_article_close(&html, report);

    if TABLE_CLOSE_COLLAPSE_3.is_match(&html) {
        html = TABLE_CLOSE_COLLAPSE_3
            .replace_all(&html, "</table></div>")
            .into_owned();
        report.record_repair("collapse_table_close_3");
    }
    if TABLE_CLOSE_COLLAPSE_2.is_match(&html) {
        html = TABLE_CLOSE_COLLAPSE_2
            .replace_all(&html, "</table></div>")
            .into_owned();
        report.record_repair("collapse_table_close_2");
    }

    html = unwrap_wrapper_divs(&html, report);

    html = preprocess_menu_cascades(&html, report);

    html = protect_placeholders(&html, report);

    html
}

fn strip_ui_chrome_comments(html: &str, preserve_as_paragraphs: bool, report: &mut AuditReport) -> String {
    let mut out = html.to_string();
    let mut fired = false;
    for class in crate::classify::UI_CHROME_CLASSES.iter() {
        let pattern = format!(r#"(?is)<div[^>]*class="[^"]*{}[^"]*"[^>]*>(.*?)</div>"#, regex::escape(class));
        if let Ok(re) = Regex::new(&pattern) {
            if re.is_match(&out) {
                out = re
                    .replace_all(&out, |caps: &regex::Captures<'_>| {
                        if !preserve_as_paragraphs {
                            return String::new();
                        }
                        let text = strip_tags(&caps[1]);
                        if text.is_empty() {
                            String::new()
                        } else {
                            format!("<p>{text}</p>")
                        }
                    })
                    .into_owned();
                fired = true;
            }
        }
    }
    if fired {
        report.record_repair("strip_ui_chrome");
    }
    out
}

fn strip_tags(s: &str) -> String {
    static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex pattern"));
    TAG.replace_all(s, "").trim().to_string()
}

/// Count opening/closing `</article>` tags; if closes exceed opens, drop the
/// excess from the end, one at a time, re-verifying tag balance after each
/// removal (spec.md §4.1 repair 3).
fn fix_excess_article_close(html: &str, report: &mut AuditReport) -> String {
    let mut out = html.to_string();
    loop {
        let opens = ARTICLE_OPEN.find_iter(&out).count();
        let closes: Vec<_> = ARTICLE_CLOSE.find_iter(&out).map(|m| (m.start(), m.end())).collect();
        if closes.len() <= opens {
            break;
        }
        let Some(&(start, end)) = closes.last() else { break };
        out.replace_range(start..end, "");
        report.record_repair("trim_excess_article_close");
    }
    out
}

/// Unwrap ServiceNow wrapper divs iteratively until fixed point, bounded to
/// 10 passes (spec.md §4.1 repair 5).
fn unwrap_wrapper_divs(html: &str, report: &mut AuditReport) -> String {
    let mut out = html.to_string();
    for _ in 0..10 {
        if !WRAPPER_DIV.is_match(&out) {
            break;
        }
        out = WRAPPER_DIV.replace_all(&out, "$1").into_owned();
        report.record_repair("unwrap_wrapper_div");
    }
    out
}

/// Normalize a `menucascade`'s `<abbr>&gt;</abbr>` separators to a plain
/// " > " text node, leaving the label spans (and any `uicontrol` formatting
/// on them) completely intact for `richtext.rs`'s inline walk to annotate
/// normally (spec.md §4.1 repair 6: "preserving any inline formatting on the
/// individual labels"). Earlier revisions of this repair flattened the whole
/// cascade to plain text here, which threw that formatting away before
/// `scraper` ever saw it — the merge belongs downstream, where annotations
/// are still live.
fn preprocess_menu_cascades(html: &str, report: &mut AuditReport) -> String {
    if !MENUCASCADE.is_match(html) {
        return html.to_string();
    }
    report.record_repair("preprocess_menu_cascade");
    MENUCASCADE
        .replace_all(html, |caps: &regex::Captures<'_>| {
            let inner = MENUCASCADE_SEP.replace_all(&caps[1], " > ");
            format!("<span>{inner}</span>")
        })
        .into_owned()
}

/// Protect angle-bracket placeholders like `<plugin name>` by replacing them
/// with an opaque sentinel before parsing, so the HTML parser doesn't
/// mistake them for markup; the sentinel form round-trips intact since the
/// parser treats it as plain text (spec.md §4.1 repair 7, invariant 8).
fn protect_placeholders(html: &str, report: &mut AuditReport) -> String {
    if !PLACEHOLDER_TOKEN.is_match(html) {
        return html.to_string();
    }
    let mut fired = false;
    let out = PLACEHOLDER_TOKEN
        .replace_all(html, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            if is_known_tag(name) {
                caps[0].to_string()
            } else {
                fired = true;
                format!("\u{2}{}\u{3}", name.trim())
            }
        })
        .into_owned();
    if fired {
        report.record_repair("protect_placeholder");
    }
    out
}

/// Restore placeholder sentinels to their original `<name>` form. Applied to
/// plain-text run content after tokenization (spec.md §4.3 step 9).
pub fn restore_placeholders(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{2}' {
            let mut name = String::new();
            for inner in chars.by_ref() {
                if inner == '\u{3}' {
                    break;
                }
                name.push(inner);
            }
            out.push('<');
            out.push_str(&name);
            out.push('>');
        } else {
            out.push(c);
        }
    }
    out
}

/// Parse normalized HTML into a `scraper::Html` fragment document.
pub fn parse(html: &str) -> scraper::Html {
    scraper::Html::parse_fragment(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_and_style() {
        let mut report = AuditReport::default();
        let out = normalize("<p>hi</p><script>evil()</script><style>.a{}</style>", false, &mut report);
        assert!(!out.contains("script"));
        assert!(!out.contains("evil"));
        assert_eq!(report.repairs_applied.get("strip_script_style_svg"), Some(&1));
    }

    #[test]
    fn collapses_extra_table_closing_divs() {
        let mut report = AuditReport::default();
        let out = normalize("<table><tr><td>x</td></tr></table></div></div></div>", false, &mut report);
        assert!(out.ends_with("</table></div>"));
    }

    #[test]
    fn placeholder_round_trips() {
        let mut report = AuditReport::default();
        let out = normalize("<p>Run &lt;plugin name&gt; now</p>", false, &mut report);
        assert!(out.contains('\u{2}'));
        let restored = restore_placeholders(&out);
        assert!(restored.contains("<plugin name>"));
    }

    #[test]
    fn menu_cascade_normalizes_separator_but_keeps_label_spans() {
        let mut report = AuditReport::default();
        let input = r#"<p>Navigate to <span class="menucascade"><span class="ph uicontrol">Workspace</span><abbr>&gt;</abbr><span class="ph uicontrol">Roles</span></span>.</p>"#;
        let out = normalize(input, false, &mut report);
        assert!(out.contains("Workspace > Roles"));
        assert!(out.contains(r#"<span class="ph uicontrol">Workspace</span>"#));
        assert!(out.contains(r#"<span class="ph uicontrol">Roles</span>"#));
        assert_eq!(report.repairs_applied.get("preprocess_menu_cascade"), Some(&1));
    }

    #[test]
    fn ui_chrome_dropped_by_default() {
        let mut report = AuditReport::default();
        let input = r#"<div class="zDocsBreadcrumbs">Home &gt; Docs</div><p>Body</p>"#;
        let out = normalize(input, false, &mut report);
        assert!(!out.contains("Breadcrumbs") && !out.contains("Home &gt; Docs"));
        assert!(out.contains("<p>Body</p>"));
    }

    #[test]
    fn ui_chrome_kept_as_paragraph_when_preserved() {
        let mut report = AuditReport::default();
        let input = r#"<div class="zDocsBreadcrumbs">Home &gt; Docs</div><p>Body</p>"#;
        let out = normalize(input, true, &mut report);
        assert!(out.contains("<p>Home &gt; Docs</p>"));
        assert_eq!(report.repairs_applied.get("strip_ui_chrome"), Some(&1));
    }
}
