use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use travel_log::config::{self, SUMMARY_ERROR_LIMIT};
use travel_log::{
    check_local_media, import_posts, load_export, localize_urls, media, AssumeYes, Config,
    ConfigOverrides, Confirm, MigrationPlan, Migrator, SqliteStore,
};

#[derive(Parser)]
#[command(name = "travel-log")]
#[command(version)]
#[command(about = "Migrate a travel log and blog export into SQLite", long_about = None)]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "TRAVEL_LOG_DB")]
    db: Option<PathBuf>,

    /// Where every per-record error is written (JSON lines)
    #[arg(long, global = true, env = "TRAVEL_LOG_ERROR_LOG")]
    error_log: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse the travel log and show the derived trips (no writes)
    Preview {
        /// Semicolon-delimited travel log (Trip;Country;Companion;Start-time;End-time)
        csv: PathBuf,
    },

    /// Upsert countries, trips and links, then assign posts to trips
    Migrate {
        csv: PathBuf,

        /// Skip the confirmation prompt
        #[arg(short, long, default_value_t = false)]
        yes: bool,
    },

    /// Seed the post table from the blog export JSON
    ImportPosts { json: PathBuf },

    /// Rewrite media URLs in the export to local paths
    LocalizeMedia {
        json: PathBuf,
        out: PathBuf,

        /// URL prefix of the local media tree
        #[arg(long, env = "TRAVEL_LOG_MEDIA_BASE")]
        media_base: Option<String>,
    },

    /// Check that localized media files exist
    CheckMedia {
        json: PathBuf,

        /// Directory the local media URLs are resolved against
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

/// Prompt on stdin; ENTER proceeds, anything else (or EOF) aborts
struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, preview: &str) -> bool {
        println!("{}", preview);
        print!("Proceed? [ENTER] to continue, 'n' or CTRL+C to abort: ");
        let _ = io::stdout().flush();

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => false,
            Ok(_) => answer.trim().is_empty() || answer.trim().eq_ignore_ascii_case("y"),
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    // .env before clap so `env = ...` arguments see it
    config::load_dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let overrides = ConfigOverrides {
        database: cli.db,
        error_log: cli.error_log,
        media_base: None,
    };

    match cli.command {
        Command::Preview { csv } => {
            let plan = MigrationPlan::load(&csv)?;
            println!("{}", plan);
        }

        Command::Migrate { csv, yes } => {
            // Configuration first: a missing database aborts before any stage
            let config = Config::load(overrides)?;
            run_migration(&config, &csv, yes)?;
        }

        Command::ImportPosts { json } => {
            let config = Config::load(overrides)?;

            println!("📦 Loading export {}...", json.display());
            let posts = load_export(&json)?;
            println!("✓ Loaded {} posts", posts.len());

            let mut store = SqliteStore::open(&config.database)?;
            let stats = import_posts(&mut store, &posts);
            if !stats.errors.is_empty() {
                println!("⚠️  {} posts failed:", stats.errors.len());
                for err in stats.errors.iter().take(SUMMARY_ERROR_LIMIT) {
                    println!("    - {}: {}", err.record, err.message);
                }
            }
        }

        Command::LocalizeMedia { json, out, media_base } => {
            let media_base = config::load_media_base(media_base)?;

            let mut posts = media::load_posts_json(&json)?;
            let rewritten = localize_urls(&mut posts, &media_base);
            media::save_posts_json(&out, &posts)?;
            println!("✓ {} media URLs localized → {}", rewritten, out.display());
        }

        Command::CheckMedia { json, root } => {
            let posts = media::load_posts_json(&json)?;
            let report = check_local_media(&posts, &root);

            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            println!("📊 Media files:  {}", report.total);
            println!("✓ Found:         {} ({:.1}%)", report.found, report.success_rate());
            println!("❌ Missing:       {}", report.missing.len());
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

            for (idx, missing) in report.missing.iter().take(SUMMARY_ERROR_LIMIT).enumerate() {
                println!("{}. Post {}, block {}", idx + 1, missing.post_id, missing.block);
                println!("   Expected: {}", missing.expected_path.display());
                if let Some(original) = &missing.original_url {
                    println!("   Original: {}", original);
                }
            }
            if report.missing.len() > SUMMARY_ERROR_LIMIT {
                println!("   ... and {} more", report.missing.len() - SUMMARY_ERROR_LIMIT);
            }
        }
    }

    Ok(())
}

fn run_migration(config: &Config, csv: &Path, yes: bool) -> Result<()> {
    println!("🚀 TRAVEL LOG → SQLITE MIGRATION");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\n📋 Parsing {}...", csv.display());
    let plan = MigrationPlan::load(csv)?;

    let mut store = SqliteStore::open(&config.database)?;
    let mut migrator = Migrator::new(&mut store);

    let summary = if yes {
        println!("{}", plan.render_preview());
        migrator.run_confirmed(&plan, &mut AssumeYes)
    } else {
        migrator.run_confirmed(&plan, &mut StdinConfirm)
    };

    let Some(summary) = summary else {
        println!("Aborted, nothing written.");
        return Ok(());
    };

    println!("\n{}", summary.display(SUMMARY_ERROR_LIMIT));

    let written = summary.write_error_log(&config.error_log)?;
    if written > 0 {
        println!("📄 {} errors written to {}", written, config.error_log.display());
    }

    Ok(())
}
