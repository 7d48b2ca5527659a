//! `movieapp` - terminal front end for the MovieApp catalog.
//!
//! # Environment Variables
//!
//! - `MOVIEAPP_API_URL`: catalog service base URL
//! - `MOVIEAPP_PROFILE_DIR`: directory holding the persisted token
//! - `MOVIEAPP_PASSWORD`: password for `login`/`register` when `--password` is omitted
//! - `RUST_LOG`: log filter when no `-v` is given

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use movieapp_client::{
    AppConfig, CatalogClient, CatalogEntry, CatalogReconciler, CatalogService, ClientConfig,
    EntryId, EntryPatch, FileCredentialStore, NewEntry, Notifier, Route, SessionController,
    SessionState, ViewVariant, resolve_view,
};
use tracing_subscriber::EnvFilter;
use url::Url;

/// MovieApp catalog client
#[derive(Parser, Debug)]
#[command(name = "movieapp")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Catalog service base URL (also: MOVIEAPP_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<Url>,

    /// Directory holding the persisted token (also: MOVIEAPP_PROFILE_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    profile_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and persist the session token
    Login(Account),
    /// Create an account (does not log in)
    Register(Account),
    /// Forget the persisted session
    Logout,
    /// Show the current session
    Whoami,
    /// Render a route (e.g. `/movies`, `/movies/<id>`, `/admin`)
    Open { path: Route },
    /// Add a movie
    Add(AddArgs),
    /// Update fields of a movie
    Update(UpdateArgs),
    /// Delete a movie
    Delete {
        id: EntryId,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
struct Account {
    #[arg(long)]
    email: String,
    #[arg(long, env = "MOVIEAPP_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args, Debug)]
struct AddArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    director: String,
    #[arg(long)]
    year: i32,
    #[arg(long)]
    genre: String,
    #[arg(long)]
    description: Option<String>,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    id: EntryId,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    director: Option<String>,
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    genre: Option<String>,
    #[arg(long)]
    description: Option<String>,
}

impl UpdateArgs {
    fn patch(&self) -> Result<EntryPatch> {
        let mut patch = EntryPatch::new();
        if let Some(title) = &self.title {
            patch = patch.title(title.as_str())?;
        }
        if let Some(director) = &self.director {
            patch = patch.director(director.as_str())?;
        }
        if let Some(year) = self.year {
            patch = patch.year(year)?;
        }
        if let Some(genre) = &self.genre {
            patch = patch.genre(genre.as_str())?;
        }
        if let Some(description) = &self.description {
            patch = patch.description(description.as_str());
        }
        Ok(patch.validated()?)
    }
}

/// Prints notifications to stderr and mirrors them into the log.
#[derive(Debug, Clone, Copy)]
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify_success(&self, message: &str) {
        tracing::debug!(target: "notification", "{message}");
        eprintln!("✓ {message}");
    }

    fn notify_error(&self, message: &str) {
        tracing::debug!(target: "notification", "{message}");
        eprintln!("✗ {message}");
    }
}

type Controller = SessionController<CatalogClient, FileCredentialStore, ConsoleNotifier>;
type Catalog = CatalogReconciler<CatalogClient, ConsoleNotifier>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info,hyper=warn,reqwest=warn,rustls=warn"),
        _ => EnvFilter::new("debug,hyper=warn,h2=warn,reqwest=warn,rustls=warn"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::from_env().context("loading configuration")?;
    if let Some(url) = cli.api_url {
        config = config.with_client(ClientConfig::new(url)?);
    }
    if let Some(dir) = cli.profile_dir {
        config = config.with_profile_dir(dir);
    }
    tracing::debug!(
        api = %config.client.base_url(),
        profile = %config.profile_dir().display(),
        "Configuration resolved"
    );

    let client = Arc::new(CatalogClient::new(config.client.clone()));
    let store = FileCredentialStore::new(config.profile_dir());
    let controller = SessionController::new(client.clone(), store, ConsoleNotifier);
    let state = controller.startup().await;

    match cli.command {
        Command::Login(account) => {
            let identity = controller.login(&account.email, &account.password).await?;
            println!(
                "logged in as {}{}",
                identity.subject_id,
                admin_suffix(identity.is_privileged)
            );
        }
        Command::Register(account) => {
            controller.register(&account.email, &account.password).await?;
        }
        Command::Logout => controller.logout(),
        Command::Whoami => match state {
            SessionState::Authenticated(identity) => {
                println!("{}{}", identity.subject_id, admin_suffix(identity.is_privileged));
            }
            _ => println!("not logged in"),
        },
        Command::Open { path } => open(&controller, &path).await?,
        Command::Add(args) => {
            let mut entry = NewEntry::new(args.title, args.director, args.year, args.genre)?;
            if let Some(description) = args.description {
                entry = entry.with_description(description);
            }
            let catalog = Catalog::new(client, ConsoleNotifier);
            let token = controller.credential();
            let created = controller.guard(catalog.create(token.as_ref(), &entry).await)?;
            print_entry(&created);
        }
        Command::Update(args) => {
            let patch = args.patch()?;
            let catalog = Catalog::new(client, ConsoleNotifier);
            let token = controller.credential();
            controller.guard(catalog.update(token.as_ref(), &args.id, &patch).await)?;
        }
        Command::Delete { id, yes } => {
            let catalog = Catalog::new(client, ConsoleNotifier);
            let pending = catalog.request_delete(id);
            if !yes && !confirm(&format!("Delete movie {}?", pending.id()))? {
                catalog.cancel_delete(pending);
                return Ok(());
            }
            let token = controller.credential();
            controller.guard(catalog.confirm_delete(token.as_ref(), pending).await)?;
        }
    }
    Ok(())
}

async fn open(controller: &Controller, route: &Route) -> Result<()> {
    let token = controller.credential();
    match resolve_view(route, &controller.state()) {
        ViewVariant::Loading => bail!("session unresolved"),
        ViewVariant::LoginView => println!("Log in with `movieapp login --email <EMAIL>`"),
        ViewVariant::RegisterView => println!("Register with `movieapp register --email <EMAIL>`"),
        ViewVariant::NotFoundView => bail!("no such page: {route}"),
        ViewVariant::DetailsView(id) => {
            let fetched = controller.service().get_entry(token.as_ref(), &id).await;
            let entry = controller.guard(fetched)?;
            print_entry(&entry);
            if let Some(description) = &entry.description {
                println!("\n{description}");
            }
        }
        variant @ (ViewVariant::StandardView | ViewVariant::AdminView) => {
            let catalog = Catalog::new(controller.service().clone(), ConsoleNotifier);
            controller.guard(catalog.load_all(token.as_ref()).await)?;
            if variant == ViewVariant::AdminView {
                println!("{:<26} {:<32} {:<24} {:>4}  GENRE", "ID", "TITLE", "DIRECTOR", "YEAR");
                for entry in catalog.snapshot() {
                    println!(
                        "{:<26} {:<32} {:<24} {:>4}  {}",
                        entry.id, entry.title, entry.director, entry.year, entry.genre
                    );
                }
            } else {
                for entry in catalog.snapshot() {
                    print_entry(&entry);
                }
            }
        }
    }
    Ok(())
}

fn print_entry(entry: &CatalogEntry) {
    println!(
        "{} ({}) - {}, {} [{}]",
        entry.title, entry.year, entry.director, entry.genre, entry.id
    );
}

fn admin_suffix(is_privileged: bool) -> &'static str {
    if is_privileged { " (admin)" } else { "" }
}

fn confirm(prompt: &str) -> Result<bool> {
    let mut stderr = std::io::stderr();
    write!(stderr, "{prompt} [y/N] ")?;
    stderr.flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
