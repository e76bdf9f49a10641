//! CLI front-end for `html2notion`: read an HTML file, convert it, and
//! either print the resulting audit report or push the page straight into
//! a Notion workspace. Mirrors nuc2not's own `main.rs` shape — `clap` args,
//! `dotenvy` for the API key, `miette` for top-level error rendering — just
//! pointed at a single HTML file instead of a whole Nuclino workspace, since
//! there is no remote source to crawl or cache here.

#![deny(future_incompatible, clippy::unwrap_used)]
#![warn(rust_2018_idioms, trivial_casts)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;
use html2notion::{ConvertOptions, NotionBlockStore, NullImageUploader, RetryPolicy};
use miette::{IntoDiagnostic, Result};
use notion_client::endpoints::Client as NotionClient;
use notion_client::objects::page::PageProperty;
use notion_client::objects::rich_text::{RichText, Text};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(name = "html2notion", version)]
pub struct Args {
    /// The HTML file to convert.
    input: PathBuf,

    /// The Notion page id to create the new page under. If omitted, the
    /// conversion runs and its audit report prints, but nothing is pushed
    /// to Notion.
    #[clap(long, short)]
    parent: Option<String>,

    /// Title for the created Notion page.
    #[clap(long, default_value = "Untitled")]
    title: String,

    #[clap(flatten)]
    options: ConvertOptions,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let _ignored = dotenvy::dotenv();

    let html = std::fs::read_to_string(&args.input).into_diagnostic()?;

    let Some(parent) = args.parent else {
        let result = html2notion::convert(&html, args.options);
        println!(
            "{} {} blocks, {} markers, {} deferred children",
            "Converted:".green(),
            result.payload.len(),
            result.diagnostics.markers_allocated,
            result.diagnostics.deferred_children
        );
        print_report(&result.diagnostics);
        return Ok(());
    };

    let notion_key =
        std::env::var("NOTION_API_KEY").expect("You must provide a Notion api key in the env var NOTION_API_KEY.");
    let client = NotionClient::new(notion_key, None).expect("should construct a Notion client");
    let store = NotionBlockStore::new(client, RetryPolicy::new(args.options.max_retries));

    let mut properties: BTreeMap<String, PageProperty> = BTreeMap::new();
    properties.insert(
        "title".to_string(),
        PageProperty::Title {
            id: None,
            title: vec![RichText::Text {
                text: Text {
                    content: args.title.clone(),
                    link: None,
                },
                annotations: None,
                plain_text: Some(args.title.clone()),
                href: None,
            }],
        },
    );

    println!("Creating {} under {}…", args.title.blue(), parent.blue());
    let (page, report) = html2notion::create_page(
        &store,
        &NullImageUploader,
        &html,
        args.options,
        parent.as_str(),
        properties,
    )
    .await
    .into_diagnostic()?;

    println!("{} {}", "Created page".green(), page.id);
    print_report(&report);
    Ok(())
}

fn print_report(report: &html2notion::AuditReport) {
    println!(
        "coverage: {:.1}% ({} / {} chars), {} image fallbacks, {} errors",
        report.coverage_ratio() * 100.0,
        report.emitted_text_chars,
        report.source_text_chars,
        report.image_fallbacks,
        report.errors.len()
    );
    for err in &report.errors {
        println!("  {} {}", "error:".red(), err);
    }
}
