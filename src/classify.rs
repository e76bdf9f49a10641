//! `ClassifyInline` and the block-kind lookup table backing `ClassifyBlock`.
//! Precomputed, declarative tables rather than duck-typed class-string
//! matching, per the Design Notes' "replace duck-typed class matching with a
//! precomputed lookup" instruction. The table shape mirrors nuc2not's own
//! exhaustive `match` over `mdast::Node` variants (`render_node` in the
//! original `lib.rs`), just keyed by tag name / class instead of AST variant.

use once_cell::sync::Lazy;
use std::collections::HashSet;

use crate::model::{Annotations, TextColor};

/// What a classified inline span should do to the run(s) it wraps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineDirective {
    Annotate(InlineAnnotation),
    /// Transparent: no annotation, descend into children as-is (`<abbr>`,
    /// `<span class="ph">`).
    Transparent,
    /// Drop the element and its children entirely.
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlineAnnotation {
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
    pub color: TextColorTag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextColorTag {
    Default,
    Blue,
}

impl InlineAnnotation {
    pub fn into_annotations(self) -> Annotations {
        Annotations {
            bold: self.bold,
            italic: self.italic,
            code: self.code,
            color: match self.color {
                TextColorTag::Default => TextColor::Default,
                TextColorTag::Blue => TextColor::Blue,
            },
            ..Default::default()
        }
    }
}

const BOLD: InlineAnnotation = InlineAnnotation {
    bold: true,
    italic: false,
    code: false,
    color: TextColorTag::Default,
};
const ITALIC: InlineAnnotation = InlineAnnotation {
    bold: false,
    italic: true,
    code: false,
    color: TextColorTag::Default,
};
const CODE: InlineAnnotation = InlineAnnotation {
    bold: false,
    italic: false,
    code: true,
    color: TextColorTag::Default,
};
const BOLD_BLUE: InlineAnnotation = InlineAnnotation {
    bold: true,
    italic: false,
    code: false,
    color: TextColorTag::Blue,
};

/// Classify an inline element by tag name and (already-split) class list.
/// Implements spec.md §4.2's exhaustive semantic mapping.
pub fn classify_inline(tag: &str, classes: &[String]) -> InlineDirective {
    let has_class = |name: &str| classes.iter().any(|c| c == name);

    match tag {
        "strong" | "b" => InlineDirective::Annotate(BOLD),
        "em" | "i" | "dfn" => InlineDirective::Annotate(ITALIC),
        "code" | "samp" => InlineDirective::Annotate(CODE),
        "abbr" => InlineDirective::Transparent,
        "script" | "style" | "svg" => InlineDirective::Drop,
        "span" => {
            if has_class("uicontrol") {
                InlineDirective::Annotate(BOLD_BLUE)
            } else if has_class("sectiontitle") && has_class("tasklabel") && has_class("ph") {
                InlineDirective::Annotate(BOLD)
            } else if has_class("keyword") || has_class("parmname") || has_class("codeph") {
                InlineDirective::Annotate(CODE)
            } else if has_class("ph") {
                InlineDirective::Transparent
            } else {
                InlineDirective::Transparent
            }
        }
        _ => InlineDirective::Transparent,
    }
}

/// `<kbd>` needs its text content to decide between inline-code and bold,
/// per spec.md §4.2.
pub fn classify_kbd(content: &str) -> InlineAnnotation {
    if looks_like_url(content) || looks_like_technical_identifier(content) {
        CODE
    } else {
        BOLD
    }
}

pub fn looks_like_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with("www.")
}

/// A bare multi-segment dotted or underscored identifier, e.g.
/// `com.snc.incident.ml`, `sys_user_table` — spec.md §4.2's technical
/// identifier heuristic.
pub fn looks_like_technical_identifier(s: &str) -> bool {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return false;
    }
    let has_separator = trimmed.contains('.') || trimmed.contains('_');
    let alnum_dense = trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');
    has_separator && alnum_dense && !looks_like_url(trimmed)
}

/// UI-chrome class deny-list (spec.md §4.1 repair 2): elements matching
/// these are classified as "skip" during `WalkDOM` rather than physically
/// removed from a mutable DOM, which has the same net effect without
/// requiring a mutation-capable tree.
pub static UI_CHROME_CLASSES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "zDocsExportButton",
        "zDocsFilterTableDiv",
        "zDocsFilterDropdown",
        "miniTocContainer",
        "zDocsMiniToc",
        "codeExplanationContainer",
        "zDocsCopyButton",
        "onThisPageNav",
        "zDocsBreadcrumbs",
    ]
    .into_iter()
    .collect()
});

/// ServiceNow-specific wrapper divs that are unwrapped (replaced by their
/// children) during normalization, spec.md §4.1 repair 5.
pub static WRAPPER_CLASSES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "dataTables_wrapper",
        "zDocsFilterTableDiv",
        "itemgroup",
        "info",
        "stepxmp",
    ]
    .into_iter()
    .collect()
});

/// Callout color/icon for a `Note:|Warning:|Important:|Caution:|Tip:` label
/// or an equivalent `div.note|warning|important|tip|caution|info` class,
/// spec.md §4.4 table.
pub fn callout_style_for_label(label: &str) -> (TextColor, &'static str) {
    let lower = label.to_ascii_lowercase();
    if lower.starts_with("warning") {
        (TextColor::RedBackground, "\u{26a0}\u{fe0f}")
    } else if lower.starts_with("important") {
        (TextColor::RedBackground, "\u{26a0}\u{fe0f}")
    } else if lower.starts_with("caution") {
        (TextColor::OrangeBackground, "\u{26a0}\u{fe0f}")
    } else if lower.starts_with("tip") {
        (TextColor::GreenBackground, "\u{1f4a1}")
    } else if lower.starts_with("note") {
        (TextColor::BlueBackground, "\u{1f4dd}")
    } else {
        (TextColor::Default, "\u{2139}\u{fe0f}")
    }
}

/// Whether `text` opens with one of the five admonition labels WalkDOM
/// treats a plain `<p>` as a `Callout` instead of a `Paragraph` for
/// (spec.md §4.4 table, row 2). Unlike `callout_style_for_label`, which
/// always resolves to *some* color, this returns `None` when no label is
/// present so callers can fall back to an ordinary paragraph.
pub fn detect_admonition_label(text: &str) -> Option<(TextColor, &'static str)> {
    let trimmed = text.trim_start();
    let labels = ["Warning:", "Important:", "Caution:", "Tip:", "Note:"];
    if labels.iter().any(|l| trimmed.starts_with(l)) {
        Some(callout_style_for_label(trimmed))
    } else {
        None
    }
}

pub fn callout_style_for_class(classes: &[String]) -> Option<(TextColor, &'static str)> {
    let has_class = |name: &str| classes.iter().any(|c| c.contains(name));
    if has_class("warning") {
        Some((TextColor::RedBackground, "\u{26a0}\u{fe0f}"))
    } else if has_class("important") {
        Some((TextColor::RedBackground, "\u{26a0}\u{fe0f}"))
    } else if has_class("caution") {
        Some((TextColor::OrangeBackground, "\u{26a0}\u{fe0f}"))
    } else if has_class("tip") {
        Some((TextColor::GreenBackground, "\u{1f4a1}"))
    } else if has_class("note") {
        Some((TextColor::BlueBackground, "\u{1f4dd}"))
    } else if has_class("info") && !has_class("itemgroup") {
        Some((TextColor::Default, "\u{2139}\u{fe0f}"))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uicontrol_is_bold_and_blue() {
        let directive = classify_inline("span", &["uicontrol".to_string()]);
        assert_eq!(directive, InlineDirective::Annotate(BOLD_BLUE));
    }

    #[test]
    fn technical_identifiers_are_detected() {
        assert!(looks_like_technical_identifier("com.snc.incident.ml"));
        assert!(looks_like_technical_identifier("sys_user_table"));
        assert!(!looks_like_technical_identifier("hello world"));
        assert!(!looks_like_technical_identifier("https://example.com/a.b"));
    }

    #[test]
    fn callout_label_maps_to_color() {
        let (color, icon) = callout_style_for_label("Important: do this");
        assert_eq!(color, TextColor::RedBackground);
        assert_eq!(icon, "\u{26a0}\u{fe0f}");
    }
}
