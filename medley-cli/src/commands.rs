//! CLI command implementations

use anyhow::{Context, bail};
use clap::{Args, Subcommand};
use medley_core::{CancellationToken, MedleyConfig};
use medley_search::types::PLACEHOLDER_COVER;
use medley_search::{
    EpisodeRef, MediaKind, MediaRef, ResolutionContext, ResolutionOrchestrator, ResolveError, SourceId,
};
use serde::Serialize;
use tracing::{debug, info};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Search every source, or one kind when --kind is given
    Search {
        /// Search text
        query: String,
        /// Restrict to one kind (movie, series, anime, hentai)
        #[arg(short, long)]
        kind: Option<MediaKind>,
        /// Page to fetch when searching one kind
        #[arg(short, long, default_value = "1")]
        page: u32,
    },
    /// Resolve full details of one title
    Media(Target),
    /// List episodes of one title
    Episodes(Target),
    /// List ranked streaming providers for one title
    Providers {
        #[command(flatten)]
        target: Target,
        /// Season number (catalog series only)
        #[arg(short, long)]
        season: Option<u32>,
        /// Episode number; defaults to the first episode
        #[arg(short, long)]
        episode: Option<u32>,
    },
    /// List every known genre
    Genres,
    /// List one page of a genre
    Genre {
        /// Genre name, case-insensitive
        name: String,
        #[arg(short, long, default_value = "1")]
        page: u32,
    },
    /// List trending or recently released titles
    Trending {
        /// Media kind (movie, series, anime, hentai)
        kind: MediaKind,
        #[arg(short, long, default_value = "1")]
        page: u32,
    },
}

/// One title in one source namespace.
#[derive(Args)]
pub struct Target {
    /// Source owning the id (catalog, anime-primary, anime-backup, hentai-primary, hentai-backup)
    source: SourceId,
    /// Media kind (movie, series, anime, hentai)
    kind: MediaKind,
    /// Source-specific id
    id: String,
}

impl Target {
    fn media_ref(&self) -> MediaRef {
        MediaRef::new(self.source, self.kind, self.id.clone())
    }
}

/// Handle the CLI command
///
/// Ctrl-C cancels the in-flight resolution.
///
/// # Errors
/// - Resolution context could not be built
/// - Resolution failed; the error carries a user-facing message
pub async fn handle_command(command: Commands, config: &MedleyConfig) -> anyhow::Result<()> {
    let context = ResolutionContext::from_config(config).context("Failed to build resolution context")?;
    let orchestrator = ResolutionOrchestrator::new(context);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    let result = run(&orchestrator, command, &cancel).await;
    cancel.cancel();
    result
}

async fn run(orchestrator: &ResolutionOrchestrator, command: Commands, cancel: &CancellationToken) -> anyhow::Result<()> {
    match command {
        Commands::Search { query, kind: None, .. } => print_json(&resolved(orchestrator.search(&query, cancel).await)?),
        Commands::Search {
            query,
            kind: Some(kind),
            page,
        } => print_json(&resolved(orchestrator.search_kind(kind, &query, page, cancel).await)?),
        Commands::Media(target) => print_json(&resolved(orchestrator.resolve_media(&target.media_ref(), cancel).await)?),
        Commands::Episodes(target) => {
            print_json(&resolved(orchestrator.resolve_episodes(&target.media_ref(), cancel).await)?)
        }
        Commands::Providers {
            target,
            season,
            episode,
        } => {
            let media = target.media_ref();
            let selected = select_episode(orchestrator, &media, season, episode, cancel).await?;
            let providers = orchestrator.resolve_providers(&media, selected.as_ref(), cancel).await;
            print_json(&resolved(providers)?)
        }
        Commands::Genres => print_json(&orchestrator.list_genres().await),
        Commands::Genre { name, page } => print_json(&resolved(orchestrator.list_by_genre(&name, page, cancel).await)?),
        Commands::Trending { kind, page } => print_json(&resolved(orchestrator.trending(kind, page, cancel).await)?),
    }
}

/// Picks the episode the user asked for, if any.
///
/// Catalog series need no lookup; scraper episodes are matched by number
/// against the resolved episode list.
async fn select_episode(
    orchestrator: &ResolutionOrchestrator,
    media: &MediaRef,
    season: Option<u32>,
    episode: Option<u32>,
    cancel: &CancellationToken,
) -> anyhow::Result<Option<EpisodeRef>> {
    let Some(number) = episode else {
        return Ok(None);
    };

    match media.kind {
        MediaKind::Movie => Ok(None),
        MediaKind::Series => {
            let season = season.unwrap_or(1);
            Ok(Some(EpisodeRef {
                id: format!("{}-s{season}e{number}", media.id),
                title: format!("Episode {number}"),
                episode_number: number,
                season_number: season,
                cover: PLACEHOLDER_COVER.to_string(),
                stream_ref: format!("{}/{season}/{number}", media.id),
            }))
        }
        MediaKind::Anime | MediaKind::Hentai => {
            let episodes = resolved(orchestrator.resolve_episodes(media, cancel).await)?;
            debug!("{media}: {} episodes to match against", episodes.len());
            match episodes.into_iter().find(|candidate| candidate.episode_number == number) {
                Some(found) => Ok(Some(found)),
                None => bail!("{media} has no episode {number}"),
            }
        }
    }
}

/// Converts a resolution error into one carrying its user-facing message.
fn resolved<T>(result: Result<T, ResolveError>) -> anyhow::Result<T> {
    result.map_err(|e| {
        let message = e.user_message();
        anyhow::Error::new(e).context(message)
    })
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
