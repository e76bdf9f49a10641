//! The `Conversion` context: all state that would otherwise be a module-level
//! global or a jQuery-style shared cursor lives here instead, per the Design
//! Notes' "replace global mutable state with an explicit context" directive.
//! One `Conversion` is created per `Convert` call and threaded by `&mut`
//! through `WalkDOM`, `EnforceNesting`, and `Markers`; nothing in this crate
//! keeps a `static mut` or a `Lazy<Mutex<_>>` for per-document state.

use std::collections::HashSet;

use crate::config::ConvertOptions;
use crate::diagnostics::AuditReport;

/// Alphabet marker tokens are drawn from: unambiguous in rich text (no
/// HTML-significant characters, no Unicode format characters), spec.md §4.6.
const MARKER_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub struct Conversion {
    pub options: ConvertOptions,
    pub diagnostics: AuditReport,
    marker_counter: u64,
    /// Source URLs already emitted as an `Image { source: External(_), .. }`
    /// in this conversion, for invariant 7 (image de-duplication).
    seen_image_urls: HashSet<String>,
    /// `(id, first-100-chars)` fingerprints of tables already emitted, to
    /// suppress accidental re-emission (spec.md §4.4 "Ordering & tie-breaks").
    seen_table_fingerprints: HashSet<String>,
    /// Whether a "Related Content" heading has already been emitted; only
    /// the first of possibly several source variants survives.
    related_content_emitted: bool,
    /// `"Table N. ..."` caption texts already consumed as a `Heading`, so a
    /// later duplicate occurrence of the same caption text elsewhere in the
    /// document is suppressed (spec.md §4.4 "Ordering & tie-breaks").
    seen_table_captions: HashSet<String>,
}

impl Conversion {
    pub fn new(options: ConvertOptions) -> Self {
        Conversion {
            options,
            diagnostics: AuditReport::default(),
            marker_counter: 0,
            seen_image_urls: HashSet::new(),
            seen_table_fingerprints: HashSet::new(),
            related_content_emitted: false,
            seen_table_captions: HashSet::new(),
        }
    }

    /// Allocate a fresh, monotonically unique marker token (spec.md §4.6
    /// invariant: "allocation is thread-safe and monotonically unique within
    /// one conversion" — single-threaded here since the DOM walk itself is
    /// inherently serial per spec.md §5, but the counter guarantees
    /// uniqueness regardless of call order).
    pub fn allocate_marker(&mut self) -> String {
        let mut n = self.marker_counter;
        self.marker_counter += 1;
        let mut out = String::with_capacity(6);
        for _ in 0..6 {
            let idx = (n % MARKER_ALPHABET.len() as u64) as usize;
            out.push(MARKER_ALPHABET[idx] as char);
            n /= MARKER_ALPHABET.len() as u64;
        }
        self.diagnostics.markers_allocated += 1;
        out
    }

    /// Returns `true` the first time a given source URL is seen in this
    /// conversion; subsequent calls with the same URL return `false` so the
    /// caller can skip emitting a duplicate `Image` block.
    pub fn claim_image_url(&mut self, url: &str) -> bool {
        self.seen_image_urls.insert(url.to_string())
    }

    pub fn claim_table_fingerprint(&mut self, fingerprint: &str) -> bool {
        self.seen_table_fingerprints.insert(fingerprint.to_string())
    }

    pub fn claim_related_content(&mut self) -> bool {
        if self.related_content_emitted {
            false
        } else {
            self.related_content_emitted = true;
            true
        }
    }

    /// Returns `true` the first time this exact caption text is seen.
    pub fn claim_table_caption(&mut self, text: &str) -> bool {
        self.seen_table_captions.insert(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_are_unique_and_monotonic() {
        let mut ctx = Conversion::new(ConvertOptions::default());
        let a = ctx.allocate_marker();
        let b = ctx.allocate_marker();
        assert_ne!(a, b);
        assert_eq!(ctx.diagnostics.markers_allocated, 2);
    }

    #[test]
    fn image_url_dedup_claims_once() {
        let mut ctx = Conversion::new(ConvertOptions::default());
        assert!(ctx.claim_image_url("https://example.com/a.png"));
        assert!(!ctx.claim_image_url("https://example.com/a.png"));
    }
}
