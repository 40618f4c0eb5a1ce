//! WebRadio: background service and console client

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, info, warn};
use wrcache::CacheConfigExt;
use wrconfig::Config;
use wrradio::{
    Catalog, ChannelMatch, Crawler, DataStage, HeadlessPlayer, RemoteClient, WaitOutcome,
    WebRadioConfigExt, WebRadioService, create_router,
};
use wrserver::Server;

/// How long client commands wait for the catalog to be complete
const CATALOG_WAIT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "webradio", about = "Internet radio service and console client", version)]
struct Cli {
    /// Configuration directory
    #[arg(long, global = true, value_name = "DIR")]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the background service
    Service,
    #[command(flatten)]
    Client(ClientCommand),
}

/// Commands talking to a running service
#[derive(Subcommand)]
enum ClientCommand {
    /// List channels matching QUERY, or the saved tag filter
    List { query: Vec<String> },
    /// Show what is playing
    Status,
    /// Play the channel matching QUERY, or the last played channel
    Play { query: Vec<String> },
    Pause,
    Resume,
    /// List every known tag
    Tags,
    /// Save the tag filter used by `list` (no tag clears it)
    Filter { tags: Vec<String> },
    /// Add or remove the playing title from the wishlist
    Wish,
    /// Show favorite streams
    Favorites,
    /// Show or set the equalizer profile
    Eq { profile: Option<String> },
    /// Stop the service
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = wrconfig::init_config(cli.config_dir.as_deref().unwrap_or(""))?;

    match cli.command {
        Command::Service => run_service(config).await,
        Command::Client(command) => {
            wrserver::init_console_logging(Level::WARN);
            run_client(&config, command).await
        }
    }
}

async fn run_client(config: &Config, command: ClientCommand) -> Result<()> {
    let client = RemoteClient::new(format!(
        "http://{}:{}",
        config.get_base_url(),
        config.get_http_port()
    ))?;
    let hint = || unreachable_hint(&client);

    match command {
        ClientCommand::List { query } => list(config, &client, query).await,
        ClientCommand::Status => status(&client).await,
        ClientCommand::Play { query } => play(config, &client, query).await,
        ClientCommand::Pause => Ok(client.pause().await.with_context(hint)?),
        ClientCommand::Resume => Ok(client.resume().await.with_context(hint)?),
        ClientCommand::Tags => {
            for tag in client.tags().await.with_context(hint)? {
                println!("{tag}");
            }
            Ok(())
        }
        ClientCommand::Filter { tags } => {
            config.set_preferred_tags(&tags)?;
            if tags.is_empty() {
                println!("Tag filter cleared");
            } else {
                println!("Tag filter: {}", tags.join(" "));
            }
            Ok(())
        }
        ClientCommand::Wish => wish(&client).await,
        ClientCommand::Favorites => favorites(&client).await,
        ClientCommand::Eq { profile } => equalizer(&client, profile).await,
        ClientCommand::Quit => Ok(client.quit().await.with_context(hint)?),
    }
}

async fn run_service(config: Arc<Config>) -> Result<()> {
    let mut server = Server::new_configured(&config);
    server.init_logging(&config).await;

    // No catalog without a station list
    let stations = config.load_stations().context("cannot load the station list")?;
    info!(stations = stations.len(), "Station list loaded");

    let cache = config.create_response_cache()?;
    let fetcher = Arc::new(config.create_fetcher(Some(cache))?);
    let catalog = Arc::new(Catalog::default());
    let shutdown = server.shutdown_token();

    let service = Arc::new(
        WebRadioService::new(catalog.clone(), Arc::new(HeadlessPlayer::new()))
            .with_scoreboard(config.load_scoreboard()?, config.get_score_interval()?)
            .with_wishlist(config.load_wishlist()?)
            .with_shutdown(shutdown.clone()),
    );
    service.start();

    Crawler::new(catalog, fetcher)?
        .with_cancellation(shutdown)
        .spawn(stations);

    server
        .add_router("/api/webradio", create_router(service))
        .await;

    server.start().await?;
    let info = server.info();
    info!("{} is ready on {}:{}", info.name, info.base_url, info.http_port);
    server.wait().await;
    Ok(())
}

fn unreachable_hint(client: &RemoteClient) -> String {
    format!(
        "cannot reach the service at {}, is `webradio service` running?",
        client.base_url()
    )
}

/// Waits for the full catalog, warning when it is still incomplete
async fn wait_catalog(client: &RemoteClient) -> Result<()> {
    let stage = client.data_stage().await.with_context(|| unreachable_hint(client))?;
    if stage >= DataStage::ChannelsLoaded {
        return Ok(());
    }
    eprintln!("Loading catalog...");
    if let WaitOutcome::StillLoading(stage) = client.wait(DataStage::ChannelsLoaded, CATALOG_WAIT).await? {
        warn!(stage = stage.as_u8(), "Catalog still loading, results may be partial");
    }
    Ok(())
}

fn print_channel(found: &ChannelMatch, current: Option<&ChannelMatch>) {
    let marker = if current.is_some_and(|c| c.channel.uri == found.channel.uri) {
        "*"
    } else {
        " "
    };
    println!(
        "{} {:<12} {:<40} {}",
        marker,
        found.station_id,
        found.channel.title(),
        found.channel.tags.join(",")
    );
}

async fn list(config: &Config, client: &RemoteClient, mut query: Vec<String>) -> Result<()> {
    if query.is_empty() {
        query = config.get_preferred_tags()?;
    }
    wait_catalog(client).await?;

    let found = client.find(query.as_slice()).await?;
    if found.is_empty() {
        println!("No channel matches");
        return Ok(());
    }
    let current = client.current_channel().await?;
    for m in &found {
        print_channel(m, current.as_ref());
    }
    Ok(())
}

async fn status(client: &RemoteClient) -> Result<()> {
    let state = client.state().await.with_context(|| unreachable_hint(client))?;
    if state.current_uri.is_empty() {
        println!("Stopped");
        return Ok(());
    }

    println!("{} {}", if state.is_playing { "Playing" } else { "Paused" }, state.current_uri);
    if let Some(current) = client.current_channel().await? {
        println!("Channel: {} ({})", current.channel.title(), current.station_id);
    }
    for (key, value) in client.stream_tags().await? {
        println!("  {key}: {value}");
    }
    Ok(())
}

async fn play(config: &Config, client: &RemoteClient, query: Vec<String>) -> Result<()> {
    wait_catalog(client).await?;

    if query.is_empty() {
        let Some(last) = config.get_last_channel_uri()? else {
            bail!("no channel played yet, give a query");
        };
        let Some(channel) = client.channel_containing(&last).await? else {
            bail!("last played channel {last} is not in the catalog");
        };
        return play_channel(config, client, &channel).await;
    }

    let found = client.find(query.as_slice()).await?;
    match found.as_slice() {
        [] => bail!("no channel matches {}", query.join(" ")),
        [single] => play_channel(config, client, single).await,
        several => {
            println!("{} channels match, be more specific:", several.len());
            for m in several {
                print_channel(m, None);
            }
            Ok(())
        }
    }
}

async fn play_channel(config: &Config, client: &RemoteClient, channel: &ChannelMatch) -> Result<()> {
    let Some(stream) = channel.channel.streams.first() else {
        bail!("channel {} has no stream", channel.channel.uri);
    };
    client.play(&stream.uri).await?;
    config.set_last_channel_uri(&channel.channel.uri)?;
    println!("Playing {} ({})", channel.channel.title(), channel.station_id);
    Ok(())
}

async fn wish(client: &RemoteClient) -> Result<()> {
    let tags = client.stream_tags().await.with_context(|| unreachable_hint(client))?;
    let title = match tags.get("title") {
        Some(title) => title.clone(),
        None => match client.current_channel().await? {
            Some(current) => current.channel.title().to_string(),
            None => bail!("nothing is playing"),
        },
    };

    if client.toggle_wishlist(&title).await? {
        println!("Added to wishlist: {title}");
    } else {
        println!("Removed from wishlist: {title}");
    }
    Ok(())
}

async fn favorites(client: &RemoteClient) -> Result<()> {
    let entries = client.favorites().await.with_context(|| unreachable_hint(client))?;
    if entries.is_empty() {
        println!("No favorites yet");
    }
    for entry in entries {
        println!("{:>5} {:>4.0}% {}", entry.score, entry.relative_score * 100.0, entry.uri);
    }
    Ok(())
}

async fn equalizer(client: &RemoteClient, profile: Option<String>) -> Result<()> {
    if let Some(profile) = profile {
        client.set_equalizer_profile(&profile).await?;
        println!("Equalizer profile: {profile}");
        return Ok(());
    }

    let eq = client.equalizer().await.with_context(|| unreachable_hint(client))?;
    for name in eq.profiles {
        let marker = if name == eq.current { "*" } else { " " };
        println!("{marker} {name}");
    }
    Ok(())
}
