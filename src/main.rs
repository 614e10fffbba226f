// SPDX-License-Identifier: MPL-2.0

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use storyline::api::{Coordinates, NewStory, StoryClient};
use storyline::cache::{CacheLayer, CacheStorage, Scope};
use storyline::config::{ONLINE_WAIT_TIMEOUT, static_manifest};
use storyline::net::{Connectivity, HttpFetcher, probe};
use storyline::photo::PhotoFile;
use storyline::push::{BrowserClients, handle_notification_click, parse_push_payload};
use storyline::router::{Freshness, Notice, Route, StoryCard, View, ViewRenderer};
use storyline::state::{AppSettings, AuthState, LocalStorage, SessionGate, SessionStorage};
use storyline::store::MirrorDb;
use storyline::validate::validate_story;
use storyline::{StoryApp, SubmitOutcome, runtime};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

/// Story App - offline-first geotagged stories
#[derive(Parser, Debug)]
#[command(name = "storyline")]
#[command(about = "Browse and post geotagged photo stories, online or off")]
struct Args {
    /// Data directory for the mirror, caches and session
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Story API base URL
    #[arg(long, global = true)]
    api: Option<String>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account
    Register {
        name: String,
        email: String,
        password: String,
    },
    Login {
        email: String,
        password: String,
    },
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List stories (falls back to the local copy when offline)
    Stories,
    /// Show one story
    Story { id: String },
    Favorites,
    /// Add or remove a favorite
    Favorite { id: String },
    /// Post a story; queued for later when offline
    Add {
        description: String,
        #[arg(long)]
        photo: PathBuf,
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },
    /// List uploads waiting for connectivity
    Pending,
    /// Upload queued stories now
    Sync {
        /// Wait for connectivity first
        #[arg(long)]
        wait: bool,
    },
    /// Cache the application shell and activate the cache layer
    Install,
    /// Track connectivity and sync whenever it comes back
    Watch {
        /// Seconds between connectivity probes
        #[arg(long, default_value_t = 10)]
        interval: u64,
    },
    /// Render a push payload as a notification
    Notify {
        /// JSON payload file; omit for an empty push
        #[arg(long)]
        payload: Option<PathBuf>,
        /// Simulate a click with this action
        #[arg(long)]
        click: Option<String>,
    },
}

struct TerminalRenderer;

impl TerminalRenderer {
    fn print_card(card: &StoryCard) {
        let star = if card.favorite { "*" } else { " " };
        println!("{star} {}  {} ({})", card.id, card.name, card.created_at);
        println!("    {}", card.preview);
        if let Some(location) = card.location {
            println!("    at {:.4}, {:.4}", location.lat, location.lon);
        }
    }
}

impl ViewRenderer for TerminalRenderer {
    fn render(&self, route: &Route, view: View) {
        debug!(%route, "rendering");
        match view {
            View::Stories { cards, freshness } => {
                if freshness == Freshness::Mirror {
                    println!("(offline copy)");
                }
                if cards.is_empty() {
                    println!("No stories yet");
                }
                cards.iter().for_each(Self::print_card);
            }
            View::StoryDetail {
                story,
                favorite,
                freshness,
            } => {
                if freshness == Freshness::Mirror {
                    println!("(offline copy)");
                }
                println!("{} by {}", story.id, story.name);
                println!("{}", story.created_at);
                println!("{}", story.photo_url);
                if let Some(location) = story.location {
                    println!("Location: {:.6}, {:.6}", location.lat, location.lon);
                }
                println!();
                println!("{}", story.description);
                if favorite {
                    println!();
                    println!("In your favorites");
                }
            }
            View::Favorites(cards) => {
                if cards.is_empty() {
                    println!("No favorites yet");
                }
                cards.iter().for_each(Self::print_card);
            }
            View::AddStory { pending } => println!("{pending} upload(s) waiting"),
            View::Login => println!("Not signed in. Run `storyline login <email> <password>`."),
            View::Register => println!("Run `storyline register <name> <email> <password>`."),
        }
    }

    fn notify(&self, notice: Notice) {
        match notice {
            Notice::Success(message) => eprintln!("{message}"),
            Notice::Error(message) => eprintln!("error: {message}"),
        }
    }
}

type Network = Arc<CacheLayer<HttpFetcher>>;

struct Shell {
    app: StoryApp<Network, Arc<TerminalRenderer>>,
    layer: Network,
    renderer: Arc<TerminalRenderer>,
    api_url: Url,
    shell_url: Url,
}

async fn build(args: &Args) -> anyhow::Result<Shell> {
    let mut settings = AppSettings::load();
    if let Some(dir) = &args.data_dir {
        settings.data_dir = Some(dir.clone());
    }
    if let Some(api) = &args.api {
        settings.api_base_url = api.clone();
    }

    let data_dir = settings.data_dir().map_err(anyhow::Error::msg)?;
    let api_url = settings.api_url().map_err(anyhow::Error::msg)?;
    let shell_url = settings.shell_url().map_err(anyhow::Error::msg)?;

    // No degraded mode without the mirror
    let db = MirrorDb::open(&data_dir).context("failed to open local mirror")?;
    let storage = CacheStorage::open(&data_dir).context("failed to open cache storage")?;
    let local = LocalStorage::open(&data_dir.join("local-storage.json"))
        .context("failed to open session storage")?;

    let layer = Arc::new(CacheLayer::new(
        HttpFetcher::new()?,
        storage,
        Scope::new(&shell_url, &api_url),
    ));
    let client = Arc::new(StoryClient::new(layer.clone(), api_url.clone()));
    let session = Arc::new(SessionGate::new(local, SessionStorage::new()));
    let online = probe(&HttpFetcher::new()?, &api_url).await;
    debug!(online, "initial connectivity");

    let renderer = Arc::new(TerminalRenderer);
    let app = StoryApp::new(
        db,
        client,
        session,
        Connectivity::new(online),
        renderer.clone(),
    )
    .with_page_size(settings.page_size);

    Ok(Shell {
        app,
        layer,
        renderer,
        api_url,
        shell_url,
    })
}

/// Keep `connectivity` current by probing the API host
fn spawn_prober(
    connectivity: Connectivity,
    api_url: Url,
    interval: Duration,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let fetcher = HttpFetcher::new()?;
    Ok(runtime::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            connectivity.set_online(probe(&fetcher, &api_url).await);
        }
    }))
}

async fn run(args: Args) -> anyhow::Result<()> {
    let shell = build(&args).await?;
    let app = &shell.app;

    match args.command {
        Command::Register {
            name,
            email,
            password,
        } => {
            let message = app.register(&name, &email, &password).await?;
            println!("{message}");
        }
        Command::Login { email, password } => {
            let session = app.login(&email, &password).await?;
            println!("Signed in as {} ({})", session.profile.name, session.profile.email);
        }
        Command::Logout => {
            app.logout()?;
            println!("Signed out");
        }
        Command::Whoami => match app.session().state() {
            AuthState::Authenticated(session) => {
                println!("{} <{}>", session.profile.name, session.profile.email);
                println!("user id: {}", session.profile.user_id);
            }
            AuthState::Unauthenticated => println!("Not signed in"),
        },
        Command::Stories => {
            app.navigate(Route::Home).await?;
        }
        Command::Story { id } => {
            app.navigate(Route::StoryDetail(id)).await?;
        }
        Command::Favorites => {
            app.navigate(Route::Favorites).await?;
        }
        Command::Favorite { id } => {
            if app.toggle_favorite_by_id(&id).await? {
                println!("Added {id} to favorites");
            } else {
                println!("Removed {id} from favorites");
            }
        }
        Command::Add {
            description,
            photo,
            lat,
            lon,
        } => {
            let photo = PhotoFile::read(&photo)
                .with_context(|| format!("cannot use {}", photo.display()))?;
            validate_story(&description, true)?;

            let story = NewStory {
                description: description.trim().to_string(),
                photo,
                location: Coordinates::from_parts(lat, lon),
            };

            match app.submit_story(story).await? {
                SubmitOutcome::Published(message) => println!("{message}"),
                SubmitOutcome::Queued(id) => println!("Queued as #{id}"),
            }
        }
        Command::Pending => {
            let pending = app.pending_uploads()?;
            if pending.is_empty() {
                println!("Nothing waiting");
            }
            for upload in pending {
                let when = chrono::DateTime::from_timestamp_millis(upload.timestamp)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default();
                println!("#{}  {}  {}", upload.id, when, upload.description);
            }
        }
        Command::Sync { wait } => {
            if !app.connectivity().is_online() {
                if !wait {
                    bail!("offline, {} upload(s) waiting", app.pending_uploads()?.len());
                }
                let prober = spawn_prober(
                    app.connectivity().clone(),
                    shell.api_url.clone(),
                    Duration::from_secs(2),
                )?;
                let online = app.connectivity().wait_for_online(ONLINE_WAIT_TIMEOUT).await;
                prober.abort();
                if !online {
                    bail!("still offline after {}s", ONLINE_WAIT_TIMEOUT.as_secs());
                }
            }

            let report = app.sync_now().await?;
            println!("{} synced, {} still waiting", report.synced, report.failed);
        }
        Command::Install => {
            let manifest = static_manifest(&shell.shell_url)?;
            let mut changes = shell.layer.subscribe_controller();

            shell.layer.install(&manifest).await?;
            for name in shell.layer.activate()? {
                println!("Removed old cache {name}");
            }
            println!("Cached {} shell assets", manifest.len());

            if changes.try_recv().is_ok() {
                shell
                    .renderer
                    .notify(Notice::Success("App updated, please refresh".to_string()));
            }
        }
        Command::Watch { interval } => {
            if app.session().is_authenticated()
                && let Err(e) = app.navigate(Route::Home).await
            {
                warn!("initial load failed: {}", e);
            }

            let prober = spawn_prober(
                app.connectivity().clone(),
                shell.api_url.clone(),
                Duration::from_secs(interval.max(1)),
            )?;

            tokio::select! {
                _ = app.watch_connectivity() => {}
                signal = tokio::signal::ctrl_c() => signal?,
            }
            prober.abort();
        }
        Command::Notify { payload, click } => {
            let data = payload.map(std::fs::read).transpose()?;
            let notification = parse_push_payload(data.as_deref());
            println!("{}", serde_json::to_string_pretty(&notification)?);

            if let Some(action) = click {
                let outcome =
                    handle_notification_click(Some(&action), &shell.shell_url, &BrowserClients)?;
                println!("{outcome:?}");
            }
        }
    }

    shell.layer.settle().await;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = match args.verbose {
        0 => "storyline=info",
        1 => "storyline=debug",
        _ => "storyline=trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    runtime::block_on(run(args))
}
