//! BOOTH Library - command line front end
//!
//! Scans a library root, builds and applies purchase imports, and lists the
//! catalog index or the change-detection store.

use booth_library::catalog::{read_catalog, scan_last_root, scan_library, ScanOptions};
use booth_library::change_db::ChangeDetectionStore;
use booth_library::purchase_import::{
    apply_import, build_purchase_json_from_html_files, build_purchase_json_from_text,
};
use booth_library::query::{display_title, filter_items, ItemFilter, SortKey};
use booth_library::{BoothClient, LibraryError, Result, ScanSummary, Settings};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Local index of purchased BOOTH item folders
#[derive(Parser, Debug)]
#[command(name = "booth_library")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the settings file
    #[arg(long, default_value_os_t = Settings::default_path())]
    settings: PathBuf,

    /// Path to the change-detection database
    #[arg(long, default_value_os_t = ChangeDetectionStore::default_path())]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a library root and rewrite its catalog index
    Scan {
        /// Library root containing one folder per item
        root: PathBuf,
        #[command(flatten)]
        scan: ScanArgs,
    },
    /// Scan the last used library root
    ScanLast {
        #[command(flatten)]
        scan: ScanArgs,
    },
    /// Build a purchase import file from pasted text or HTML ("-" reads stdin)
    ImportText {
        input: PathBuf,
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Build a purchase import file from saved HTML pages
    ImportHtml {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Merge a purchase import file into a library's catalog index
    Apply { root: PathBuf, purchase_json: PathBuf },
    /// List catalog items
    List {
        root: PathBuf,
        /// Case-insensitive text matched against title, product id and path
        #[arg(short, long, default_value = "")]
        query: String,
        #[arg(long, value_enum, default_value_t = ItemFilter::All)]
        filter: ItemFilter,
        #[arg(long, value_enum, default_value_t = SortKey::Title)]
        sort: SortKey,
        /// Sort descending
        #[arg(long, default_value_t = false)]
        desc: bool,
    },
    /// List tracked items, most recently seen first
    Changes {
        /// Only show items flagged as updated
        #[arg(long, default_value_t = false)]
        flagged: bool,
    },
    /// Clear the update flag of one item
    ClearFlag { item_id: String },
}

#[derive(ClapArgs, Debug)]
struct ScanArgs {
    /// Do not contact the public item pages
    #[arg(long, default_value_t = false)]
    offline: bool,

    /// Seconds cached public metadata stays fresh
    #[arg(long, default_value_t = 3600)]
    ttl: u64,

    /// Refresh public metadata even when the cache is fresh
    #[arg(long, default_value_t = false)]
    force: bool,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Do not carry purchase fields and thumbnails over from the previous index
    #[arg(long, default_value_t = false)]
    no_diff: bool,
}

impl ScanArgs {
    fn options(&self) -> ScanOptions {
        ScanOptions {
            diff: !self.no_diff,
            public_ttl: Duration::from_secs(self.ttl),
            force_refresh: self.force,
        }
    }

    fn client(&self) -> Result<Option<BoothClient>> {
        if self.offline {
            return Ok(None);
        }
        Ok(Some(BoothClient::new(Duration::from_secs(self.timeout))?))
    }
}

#[derive(ClapArgs, Debug)]
struct BuildArgs {
    /// Output purchase import file
    #[arg(short, long, default_value = "purchase_import.json")]
    out: PathBuf,

    /// Free-form note stored in the file's source block
    #[arg(long, default_value = "")]
    hint: String,

    /// Keep only items that have a folder in this library root
    #[arg(long)]
    filter_root: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Scan { root, scan } => {
            let client = scan.client()?;
            let summary = scan_library(&root, &scan.options(), client.as_ref())?;

            let mut settings = Settings::load_from(&args.settings);
            if settings.set_last_root(&root) {
                settings.save()?;
            }
            after_scan(&root, summary, &args.db)
        }
        Command::ScanLast { scan } => {
            let settings = Settings::load_from(&args.settings);
            let root = settings.last_root().ok_or(LibraryError::NoLastRoot)?;
            let client = scan.client()?;
            let summary = scan_last_root(&settings, &scan.options(), client.as_ref())?;
            after_scan(&root, summary, &args.db)
        }
        Command::ImportText { input, build } => {
            let text = if input.as_os_str() == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                std::fs::read_to_string(&input)?
            };
            let summary =
                build_purchase_json_from_text(&text, &build.out, &build.hint, build.filter_root.as_deref())?;
            println!(
                "Extracted {} item URLs ({} filtered out) -> {}",
                summary.extracted, summary.filtered_out, summary.out_path
            );
            Ok(())
        }
        Command::ImportHtml { files, build } => {
            let summary = build_purchase_json_from_html_files(
                &files,
                &build.out,
                &build.hint,
                build.filter_root.as_deref(),
            )?;
            println!(
                "Extracted {} item URLs ({} filtered out) -> {}",
                summary.extracted, summary.filtered_out, summary.out_path
            );
            Ok(())
        }
        Command::Apply {
            root,
            purchase_json,
        } => {
            let summary = apply_import(&root, &purchase_json)?;
            println!(
                "Purchase records: {}, matched: {}, updated: {}",
                summary.total, summary.matched, summary.updated
            );
            Ok(())
        }
        Command::List {
            root,
            query,
            filter,
            sort,
            desc,
        } => {
            let items = read_catalog(&root);
            for item in filter_items(&items, &query, filter, sort, desc) {
                println!(
                    "{:>10}  {:<60}  archives:{} docs:{} images:{}{}",
                    item.product_id.as_deref().unwrap_or("-"),
                    display_title(item),
                    item.stats.archive_count,
                    item.stats.document_count,
                    item.stats.image_count,
                    if item.purchased_at.is_empty() {
                        String::new()
                    } else {
                        format!("  purchased:{}", item.purchased_at)
                    }
                );
            }
            Ok(())
        }
        Command::Changes { flagged } => {
            let store = ChangeDetectionStore::open(&args.db)?;
            for record in store.list_items()? {
                if flagged && !record.has_update {
                    continue;
                }
                let seen = record
                    .last_seen()
                    .map(booth_library::utils::format_utc)
                    .unwrap_or_default();
                println!(
                    "{} {:>10}  {}  {}  (seen {})",
                    if record.has_update { "*" } else { " " },
                    record.item_id,
                    record.title,
                    record.url,
                    seen
                );
            }
            Ok(())
        }
        Command::ClearFlag { item_id } => {
            let store = ChangeDetectionStore::open(&args.db)?;
            store.clear_update_flag(&item_id)?;
            log::info!("Cleared update flag for {}", item_id);
            Ok(())
        }
    }
}

/// Prints scan totals and feeds the fresh index into the change store
fn after_scan(root: &Path, summary: ScanSummary, db_path: &Path) -> Result<()> {
    println!(
        "Items: {}, archives: {}, documents: {}",
        summary.count, summary.archives, summary.documents
    );

    let mut store = ChangeDetectionStore::open(db_path)?;
    let stats = store.sync_catalog(&read_catalog(root))?;
    for item_id in &stats.updated {
        println!("Updated since last scan: {}", item_id);
    }
    Ok(())
}
