// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use clap::{ArgGroup, Args, Parser, Subcommand};
use lookout_application::{
    ChoicePrompt, ChooserOutcome, CrossServiceMappingHelper, DiscoveryOptions,
    MappingSourceChooser, ReleaseDiscoveryService, SettingsStore,
};
use lookout_config::{load as load_config, AppConfig};
use lookout_domain::{MediaIdentity, MediaType, NormalizedRelease};
use lookout_infrastructure::{
    build_connector_registry, build_mapping_sources, http_client, init_database,
    SqliteSettingsStore,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "lookout-cli")]
#[command(author, version, about = "Discover and rank releases across Radarr/Sonarr instances", long_about = None)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, value_name = "FILE", env = "LOOKOUT_CONFIG_FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search every configured connector and print the ranked releases.
    Discover(DiscoverArgs),
    /// Forget the remembered mapping source so the next query asks again.
    ClearMappingPreference,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("kind").required(true).args(["movie", "series"])))]
struct DiscoverArgs {
    #[arg(long)]
    movie: bool,

    #[arg(long)]
    series: bool,

    /// TMDB ID (catalog ID).
    #[arg(long, value_name = "ID")]
    tmdb: Option<u64>,

    /// TVDB ID (secondary catalog ID).
    #[arg(long, value_name = "ID")]
    tvdb: Option<u64>,

    /// IMDb ID, e.g. tt0133093.
    #[arg(long, value_name = "ID")]
    imdb: Option<String>,

    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    year: Option<u32>,

    /// Drop torrents with fewer seeders. Defaults to the configured value.
    #[arg(long, value_name = "N")]
    min_seeders: Option<u32>,

    /// Rank by seeders first instead of by quality first.
    #[arg(long)]
    prefer_seeders: bool,

    /// Print the releases as JSON.
    #[arg(long)]
    json: bool,
}

impl DiscoverArgs {
    fn identity(&self) -> MediaIdentity {
        let media_type = if self.series {
            MediaType::Series
        } else {
            MediaType::Movie
        };

        let mut identity = MediaIdentity::new(media_type);
        if let Some(tmdb) = self.tmdb {
            identity = identity.with_catalog_id(tmdb);
        }
        if let Some(tvdb) = self.tvdb {
            identity = identity.with_secondary_catalog_id(tvdb);
        }
        if let Some(imdb) = self.imdb.as_deref() {
            identity = identity.with_external_id(imdb);
        }
        if let Some(title) = self.title.as_deref() {
            identity = identity.with_title(title);
        }
        if let Some(year) = self.year {
            identity = identity.with_year(year);
        }
        identity
    }

    fn options(&self, config: &AppConfig) -> DiscoveryOptions {
        let mut options = DiscoveryOptions::from(&config.discovery);
        if let Some(min_seeders) = self.min_seeders {
            options.min_seeders = min_seeders;
        }
        if self.prefer_seeders {
            options.prefer_quality = false;
        }
        options
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config.telemetry.log_level);

    let pool = init_database(&config).await?;
    let settings: Arc<dyn SettingsStore> = Arc::new(SqliteSettingsStore::new(pool));
    let client = http_client()?;

    let mapping = Arc::new(CrossServiceMappingHelper::new(
        build_mapping_sources(&config, &client),
        settings,
        Arc::new(TerminalChooser),
    ));

    match cli.command {
        Command::ClearMappingPreference => {
            mapping.clear_preference().await?;
            println!("Mapping source preference cleared.");
        }
        Command::Discover(args) => {
            let registry = Arc::new(build_connector_registry(&config, &client));
            if registry.is_empty() {
                warn!(target: "cli", "no connectors configured");
            }

            let service = ReleaseDiscoveryService::from_config(registry, &config.discovery)
                .with_mapping_helper(mapping);

            let identity = args.identity();
            let options = args.options(&config);
            info!(target: "cli", media_type = %identity.media_type, ?options, "discovering releases");

            let releases = service.discover_releases(&identity, options).await?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&releases)?);
            } else {
                print!("{}", render_table(&releases));
            }
        }
    }

    Ok(())
}

fn init_tracing(default_level: &str) {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// Asks on the terminal which mapping source to use.
struct TerminalChooser;

#[async_trait]
impl MappingSourceChooser for TerminalChooser {
    async fn choose(&self, prompt: &ChoicePrompt) -> ChooserOutcome {
        let mut stderr = tokio::io::stderr();
        let text = render_prompt(prompt);
        if stderr.write_all(text.as_bytes()).await.is_err() || stderr.flush().await.is_err() {
            return ChooserOutcome::Cancelled;
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        match lines.next_line().await {
            Ok(Some(line)) => parse_choice(&line, prompt),
            _ => ChooserOutcome::Cancelled,
        }
    }
}

fn render_prompt(prompt: &ChoicePrompt) -> String {
    let mut text = format!("{}\n", prompt.message);
    for (index, option) in prompt.options.iter().enumerate() {
        text.push_str(&format!("  {}) {}\n", index + 1, option));
    }
    text.push_str("  s) decide later in settings\n");
    text.push_str("Choice (empty to cancel): ");
    text
}

fn parse_choice(input: &str, prompt: &ChoicePrompt) -> ChooserOutcome {
    let input = input.trim();
    if input.eq_ignore_ascii_case("s") {
        return ChooserOutcome::OpenSettings;
    }

    if let Ok(number) = input.parse::<usize>() {
        if let Some(option) = number.checked_sub(1).and_then(|i| prompt.options.get(i)) {
            return ChooserOutcome::Selected(option.clone());
        }
    }

    prompt
        .options
        .iter()
        .find(|option| option.as_str() == input)
        .map(|option| ChooserOutcome::Selected(option.clone()))
        .unwrap_or(ChooserOutcome::Cancelled)
}

fn render_table(releases: &[NormalizedRelease]) -> String {
    if releases.is_empty() {
        return "No releases found.\n".to_string();
    }

    let mut out = format!(
        "{:>3}  {:<14} {:>7} {:>9}  {:<7} {:<16} {}\n",
        "#", "QUALITY", "SEEDERS", "SIZE", "PROTO", "INDEXER", "TITLE"
    );
    for (index, release) in releases.iter().enumerate() {
        let seeders = if release.protocol.has_seeders() {
            release.seeders.to_string()
        } else {
            "-".to_string()
        };
        out.push_str(&format!(
            "{:>3}  {:<14} {:>7} {:>9}  {:<7} {:<16} {}\n",
            index + 1,
            release.quality_label.as_deref().unwrap_or("Unknown"),
            seeders,
            format_size(release.size_bytes),
            release.protocol.as_str(),
            release.indexer_name,
            release.title
        ));
    }
    out
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
