//! `ConvertOptions`, nuc2not's equivalent being the implicit defaults baked
//! into `convert()`. This crate makes them explicit and `clap`-derivable so
//! the CLI and library callers share one struct, matching nuc2not's
//! `Args`/library split (`main.rs` vs `lib.rs`).

use clap::Parser;

#[derive(Parser, Debug, Clone, PartialEq)]
#[clap(name = "html2notion-options")]
pub struct ConvertOptions {
    /// Depth-first top-level traversal instead of section-based collection:
    /// disables the Related-Content heading+list lookahead merge in
    /// `walk.rs` so headings and the lists that follow them stay separate,
    /// sequential top-level blocks instead of being grouped.
    #[clap(long)]
    pub strict_source_order: bool,

    /// Keep UI-control chrome (breadcrumbs, cascade labels) as plain
    /// paragraphs instead of dropping it during `dom::normalize`.
    #[clap(long)]
    pub preserve_ui_controls_as_paragraphs: bool,

    /// Experimental: attach trailing numbered siblings to a prior
    /// colon-terminated bullet. Opt-in; occasionally absorbs unrelated
    /// content (see spec Open Questions).
    #[clap(long)]
    pub orphan_list_repair: bool,

    /// Images smaller than this (in either dimension) are treated as
    /// decorative icons and dropped.
    #[clap(long, default_value_t = 64)]
    pub image_min_dimension: u32,

    /// Notion's rich-text-runs-per-block cap.
    #[clap(long, default_value_t = 100)]
    pub max_rich_text_runs: usize,

    /// Notion's per-run content length cap, in code points.
    #[clap(long, default_value_t = 2000)]
    pub max_content_chars: usize,

    /// Maximum concurrent image uploads during extraction.
    #[clap(long, default_value_t = 4)]
    pub image_upload_concurrency: usize,

    /// Maximum retries for a single append/create/update call before the
    /// marker token is left in place and an `OrchestrationAppendFailed`
    /// diagnostic is recorded.
    #[clap(long, default_value_t = 5)]
    pub max_retries: u8,

    /// Maximum concurrent marker resolutions during `Orchestrate`.
    #[clap(long, default_value_t = 3)]
    pub orchestration_concurrency: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            strict_source_order: false,
            preserve_ui_controls_as_paragraphs: false,
            orphan_list_repair: false,
            image_min_dimension: 64,
            max_rich_text_runs: 100,
            max_content_chars: 2000,
            image_upload_concurrency: 4,
            max_retries: 5,
            orchestration_concurrency: 3,
        }
    }
}
