//! resealeds: command-line viewer for the monitored-products catalog.
//!
//! Mounts a catalog view over a local SQLite store and prints what a user
//! would see.
//!
//! ## Subcommands
//!
//! - `list`: print the catalog after the initial load
//! - `add`: sign in, write one product through, print the result
//! - `replay`: drive a JSON-lines script of session and catalog steps

mod db;
mod logging;
mod script;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use resealeds_core::{
    load_view_config, render_lines, CatalogSnapshot, CatalogView, SessionFeed, SessionObserver,
    StoreHandle, ViewConfig,
};
use resealeds_protocol::{Identity, NewProduct};
use tokio::io::AsyncReadExt;

use crate::db::SqliteStore;
use crate::script::Step;

#[derive(Parser)]
#[command(name = "resealeds")]
#[command(about = "Monitored resealed products catalog")]
#[command(version)]
struct Cli {
    /// SQLite catalog path (defaults to ~/.resealeds/catalog.db)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the catalog
    List,

    /// Add a product as a signed-in user
    Add {
        /// Identity to sign in as
        #[arg(long)]
        identity: String,

        #[arg(long)]
        name: String,

        /// Image URL
        #[arg(long)]
        img: String,

        /// Price in Lei
        #[arg(long)]
        price: f64,
    },

    /// Replay a JSON-lines script (`-` reads stdin)
    Replay {
        #[arg(value_name = "FILE")]
        path: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "resealeds failed");
        eprintln!("resealeds: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let config = load_view_config();
    let db_path = cli
        .db
        .clone()
        .or_else(|| config.resolve_db_path())
        .ok_or_else(|| "Home directory not found".to_string())?;
    let store = SqliteStore::open(db_path.clone())
        .map_err(|err| format!("Failed to open catalog {}: {}", db_path.display(), err))?;
    tracing::debug!(db = %db_path.display(), "Catalog store opened");

    match cli.command {
        Commands::List => list(store, config).await,
        Commands::Add {
            identity,
            name,
            img,
            price,
        } => add(store, config, &identity, NewProduct { name, img, price }).await,
        Commands::Replay { path } => {
            let content = read_script(&path).await?;
            let steps = script::parse_script(&content).map_err(|err| err.to_string())?;
            replay(store, config, steps).await
        }
    }
}

struct Mounted {
    feed: SessionFeed,
    // Kept alive so the mounted view's subscription stays valid.
    _observer: SessionObserver,
    view: CatalogView,
}

async fn mount(store: SqliteStore, config: ViewConfig) -> Result<Mounted, String> {
    let feed = SessionFeed::new();
    let observer = SessionObserver::new(&feed);
    let view = CatalogView::mount(StoreHandle::new(store), &observer, config)
        .map_err(|err| err.to_string())?;
    view.settled().await.map_err(|err| err.to_string())?;
    Ok(Mounted {
        feed,
        _observer: observer,
        view,
    })
}

async fn list(store: SqliteStore, config: ViewConfig) -> Result<(), String> {
    let mounted = mount(store, config).await?;
    print_view(&mounted.view.snapshot());
    mounted.view.unmount().await;
    Ok(())
}

async fn add(
    store: SqliteStore,
    config: ViewConfig,
    identity: &str,
    draft: NewProduct,
) -> Result<(), String> {
    let identity =
        Identity::new(identity).ok_or_else(|| "Identity must not be blank".to_string())?;
    let mounted = mount(store, config).await?;

    mounted.feed.signed_in(identity);
    mounted
        .view
        .wait_until(|s| s.can_add)
        .await
        .map_err(|err| err.to_string())?;

    let result = mounted.view.add_product(draft).await;
    let outcome = match result {
        Ok(receipt) => {
            println!(
                "added #{} {} | {} | {}",
                receipt.product.id,
                receipt.product.name,
                receipt.product.display_price(),
                receipt.product.detail_path()
            );
            print_view(&mounted.view.snapshot());
            Ok(())
        }
        Err(err) => Err(format!("Failed to add product: {}", err)),
    };
    mounted.view.unmount().await;
    outcome
}

async fn replay(store: SqliteStore, config: ViewConfig, steps: Vec<Step>) -> Result<(), String> {
    let mounted = mount(store, config).await?;
    println!("== mounted");
    print_view(&mounted.view.snapshot());

    for step in steps {
        println!("== {}", step.label());
        let before = mounted.view.snapshot().revision;
        apply_step(&mounted, &step, before).await?;
        print_view(&mounted.view.snapshot());
    }

    mounted.view.unmount().await;
    Ok(())
}

async fn apply_step(mounted: &Mounted, step: &Step, before: u64) -> Result<(), String> {
    let feed = &mounted.feed;
    let view = &mounted.view;

    match step {
        Step::SignedIn { identity } => {
            let identity = Identity::new(identity.as_str())
                .ok_or_else(|| "signed_in step needs a non-blank identity".to_string())?;
            feed.signed_in(identity);
        }
        Step::SignedOut => {
            feed.signed_out();
        }
        Step::TokenRefreshed => {
            feed.token_refreshed();
        }
        Step::ProviderError { reason } => {
            feed.fail(reason.as_str());
        }
        Step::Add { .. } => {
            if let Some(draft) = step.draft() {
                if let Err(err) = view.add_product(draft).await {
                    tracing::warn!(error = %err, "Replay add refused");
                    println!("! {}", err);
                }
            }
            return Ok(());
        }
        Step::Reload => {
            view.reload().await.map_err(|err| err.to_string())?;
            view.wait_until(|s| s.revision > before && !s.loading)
                .await
                .map_err(|err| err.to_string())?;
            return Ok(());
        }
    }

    // Every session transition bumps the revision once applied.
    view.wait_until(|s| s.revision > before)
        .await
        .map_err(|err| err.to_string())?;
    Ok(())
}

async fn read_script(path: &str) -> Result<String, String> {
    if path == "-" {
        let mut content = String::new();
        tokio::io::stdin()
            .read_to_string(&mut content)
            .await
            .map_err(|err| format!("Failed to read script from stdin: {}", err))?;
        return Ok(content);
    }
    fs_err::read_to_string(path).map_err(|err| format!("Failed to read script: {}", err))
}

fn print_view(snapshot: &CatalogSnapshot) {
    for line in render_lines(snapshot) {
        println!("{}", line);
    }
}
