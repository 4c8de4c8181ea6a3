mod backend;
mod braille;
mod colors;
mod config;
mod controller;
mod error;
mod fallback;
mod geo;
mod help;
mod logging;
mod projection;
mod settings;
mod share;
mod sync;
mod targets;
mod terminal;
mod view;
mod world;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use config::{MapConfig, Overrides, API_KEY_ENV};
use error::AppError;
use geo::{GeoPoint, LocatableEntity};
use logging::LogTarget;
use settings::Settings;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tacmap")]
#[command(version = "0.1.0")]
#[command(about = "Terminal tactical map: last known target positions on an interactive or offline vector map", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RosterArgs {
    /// Roster file (JSON or TOML); the demo roster is used otherwise
    #[arg(long)]
    targets: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the tactical map
    Map {
        /// Map provider API key (overrides TACMAP_API_KEY and the settings file)
        #[arg(short = 'k', long)]
        api_key: Option<String>,

        /// TileJSON manifest URL of the map provider
        #[arg(long)]
        provider: Option<String>,

        /// Give up on the interactive map after this many milliseconds
        #[arg(short, long)]
        timeout_ms: Option<u64>,

        #[command(flatten)]
        roster: RosterArgs,

        /// Target id selected at startup
        #[arg(short, long)]
        select: Option<String>,

        /// Print a single frame to stdout (no interactive display)
        #[arg(short, long)]
        print: bool,

        /// Frame width in print mode
        #[arg(long, default_value = "100")]
        width: u16,

        /// Frame height in print mode
        #[arg(long, default_value = "30")]
        height: u16,
    },

    /// Project a coordinate onto the offline canvas (0-100 on both axes)
    #[command(allow_negative_numbers = true)]
    Project {
        /// Latitude in degrees
        lat: f64,
        /// Longitude in degrees
        lng: f64,
    },

    /// Print a share link (or an e-mail report link) for a target
    Share {
        /// Target id; the default map center is shared without one
        #[arg(short = 'T', long)]
        target: Option<String>,

        /// Print a mailto: report instead of a link
        #[arg(short, long)]
        email: bool,

        /// Base URL of shared links
        #[arg(long)]
        origin: Option<String>,

        #[command(flatten)]
        roster: RosterArgs,
    },

    /// List the targets of a roster
    Targets {
        #[command(flatten)]
        roster: RosterArgs,
    },
}

fn check_target(entities: &[LocatableEntity], id: Option<&str>) -> Result<(), AppError> {
    match id {
        Some(id) if !entities.iter().any(|e| e.id == id) => Err(AppError::UnknownTarget(id.to_string())),
        _ => Ok(()),
    }
}

fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    let env_key = std::env::var(API_KEY_ENV).ok();

    match cli.command {
        Commands::Map {
            api_key,
            provider,
            timeout_ms,
            roster,
            select,
            print,
            width,
            height,
        } => {
            let target = if print { LogTarget::Stderr } else { LogTarget::File(logging::log_path()) };
            logging::init(target)?;
            let overrides = Overrides {
                api_key,
                provider_url: provider,
                timeout_ms,
                targets: roster.targets,
                ..Overrides::default()
            };
            let config = MapConfig::resolve(Settings::load()?, env_key, overrides);
            let entities = config.roster()?;
            check_target(&entities, select.as_deref())?;
            if print {
                view::print_frame(&config, entities, select, (width.max(20), height.max(8)))?;
            } else {
                view::run(&config, entities, select)?;
            }
        }
        Commands::Project { lat, lng } => {
            let point = GeoPoint::new(lat, lng)?;
            let p = projection::project_point(point);
            println!("x={:.4} y={:.4}", p.x, p.y);
        }
        Commands::Share {
            target,
            email,
            origin,
            roster,
        } => {
            logging::init(LogTarget::Stderr)?;
            let overrides = Overrides {
                targets: roster.targets,
                origin,
                ..Overrides::default()
            };
            let config = MapConfig::resolve(Settings::load()?, env_key, overrides);
            let entities = config.roster()?;
            check_target(&entities, target.as_deref())?;
            let location = share::current_location(&entities, target.as_deref());
            if email {
                let report = share::report(&config.share_origin, location, target.as_deref(), Utc::now());
                println!("{}", report.mailto());
            } else {
                println!("{}", share::share_link(&config.share_origin, location, target.as_deref()));
            }
        }
        Commands::Targets { roster } => {
            logging::init(LogTarget::Stderr)?;
            let overrides = Overrides {
                targets: roster.targets,
                ..Overrides::default()
            };
            let config = MapConfig::resolve(Settings::load()?, env_key, overrides);
            println!("{:<8} {:<12} {:<9} LOCATION", "ID", "LABEL", "RISK");
            for entity in config.roster()? {
                let location = entity
                    .location
                    .map(|p| format!("{:.4}", p))
                    .unwrap_or_else(|| "unknown".to_string());
                println!("{:<8} {:<12} {:<9} {}", entity.id, entity.label, entity.risk.as_str(), location);
            }
        }
    }

    Ok(())
}
