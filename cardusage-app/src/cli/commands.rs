use crate::catalog::SwuDbFetcher;
use crate::cli::opts::*;
use crate::paths::{default_db_file, default_report_file};
use crate::report::{write_atomic, MarkdownReport};
use crate::sorted::{file_output_path, render_sorted, url_output_path};
use crate::source::{deck_id_for_removal, DeckInput, LoadedDeck};

use anyhow::{bail, Result};
use cardusage_core::{CachedCatalog, CoreError, Ledger, MainSets, PurgeOutcome, UsageStore};
use cardusage_sqlite::SqliteStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub async fn run_cli(args: Cli) -> Result<()> {
    // Sorting a single deck never touches the ledger.
    if let Command::Sort { source, output_dir } = &args.cmd {
        return sort_cmd(&args.main_sets, source, output_dir.as_deref()).await;
    }

    let store = open_store(args.db_path.clone()).await?;
    let ledger = Ledger::new(store, args.main_sets.clone());
    let report = MarkdownReport::new(args.report_path.clone().unwrap_or_else(default_report_file));

    match args.cmd {
        Command::Add { source } => add_cmd(&ledger, &report, &source).await,
        Command::Remove { deck } => remove_cmd(&ledger, &report, &deck).await,
        Command::RemoveAll => remove_all_cmd(&ledger, &report).await,
        Command::List => list_cmd(&ledger).await,
        Command::Export(cmd) => export_cmd(&ledger, &report, cmd).await,
        Command::Check => check_cmd(&ledger).await,
        Command::Sort { .. } => unreachable!("handled before the store is opened"),
    }
}

pub async fn open_store(db_path: Option<PathBuf>) -> Result<Arc<dyn UsageStore>> {
    let p = db_path.unwrap_or_else(default_db_file);
    if let Some(parent) = p.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    debug!(path = %p.display(), "opening usage store");
    let s = SqliteStore::open_file(&p).await?;
    Ok(Arc::new(s))
}

async fn load_deck(input: &DeckInput, source: &str, main_sets: &MainSets) -> Result<LoadedDeck> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("cardusage/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let catalog = CachedCatalog::new(SwuDbFetcher::new(client.clone()), main_sets.clone());
    let loaded = input.load(&client, &catalog, main_sets).await?;

    if loaded.submission.cards.is_empty() {
        bail!("no cards found in {source}");
    }
    Ok(loaded)
}

async fn add_cmd(ledger: &Ledger, report: &MarkdownReport, source: &str) -> Result<()> {
    let input = DeckInput::classify(source)?;
    let submission = load_deck(&input, source, ledger.main_sets()).await?.submission;

    match ledger.add_deck(&submission).await {
        Ok(out) => {
            println!("Added deck: {} ({})", submission.deck.title, submission.deck.format);
            println!("  Unique cards: {}, Total cards: {}", out.unique_cards, out.total_quantity);
        }
        Err(CoreError::DuplicateDeck(_)) => {
            bail!(
                "deck '{}' is already being tracked; use 'remove' first if you want to re-add it",
                submission.deck.title
            )
        }
        Err(e) => return Err(e.into()),
    }

    write_report(ledger, report).await
}

async fn remove_cmd(ledger: &Ledger, report: &MarkdownReport, deck: &str) -> Result<()> {
    let deck_id = deck_id_for_removal(deck)?;
    let out = ledger.remove_deck(&deck_id).await?;
    println!("Removed deck: {}", out.deck.title);
    println!("  Cards no longer in use: {}", out.cards_purged);

    write_report(ledger, report).await
}

async fn remove_all_cmd(ledger: &Ledger, report: &MarkdownReport) -> Result<()> {
    match ledger.purge_all(report).await? {
        PurgeOutcome::NothingToDo => println!("No decks are currently being tracked."),
        PurgeOutcome::Cleared { decks, cards, archived } => {
            if let Some(path) = archived {
                println!("Archived: {}", path.display());
            }
            println!("Removed all data:");
            println!("  Decks removed: {decks}");
            println!("  Cards removed: {cards}");
        }
    }
    Ok(())
}

async fn list_cmd(ledger: &Ledger) -> Result<()> {
    let decks = ledger.list_decks().await?;
    if decks.is_empty() {
        println!("No decks are currently being tracked.");
        return Ok(());
    }
    println!("\nTracked Decks ({}):\n", decks.len());
    for d in decks {
        println!("  • {} ({})", d.title, d.format);
        println!("    {}", d.url);
        println!("    Added: {}\n", d.added_at.format("%Y-%m-%d"));
    }
    Ok(())
}

async fn export_cmd(ledger: &Ledger, report: &MarkdownReport, cmd: ExportCmd) -> Result<()> {
    if cmd.json {
        let view = ledger.project().await?;
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }
    write_report(ledger, report).await
}

async fn check_cmd(ledger: &Ledger) -> Result<()> {
    let violations = ledger.audit().await?;
    if violations.is_empty() {
        println!("ok");
        return Ok(());
    }
    for v in &violations {
        println!("{v}");
    }
    bail!("{} invariant violation(s)", violations.len())
}

async fn sort_cmd(main_sets: &MainSets, source: &str, output_dir: Option<&Path>) -> Result<()> {
    let input = DeckInput::classify(source)?;
    let loaded = load_deck(&input, source, main_sets).await?;
    let out = match &input {
        DeckInput::SwuDb { deck_id, .. } => {
            url_output_path(&loaded.submission.deck.title, deck_id, output_dir)
        }
        DeckInput::DeckFile(path) | DeckInput::Picklist(path) => file_output_path(path, output_dir)?,
    };

    let text = render_sorted(&loaded, main_sets);
    println!("{text}");
    write_atomic(&out, &text)?;
    println!("\nSaved to: {}", out.display());
    Ok(())
}

async fn write_report(ledger: &Ledger, report: &MarkdownReport) -> Result<()> {
    let view = ledger.project().await?;
    report.write(&view)?;
    println!("\nExported to: {}", report.path().display());
    println!("  Decks: {}", view.decks.len());
    println!("  Unique cards: {}", view.unique_cards());
    Ok(())
}
