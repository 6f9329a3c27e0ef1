use anyhow::{Context, bail};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use courtside::{AppState, router, version_string};
use courtside_config::Config;
use courtside_models::{CourtFilter, GameFilter, Moment, NewCourt};
use courtside_places::{NearbySearch, PlacesClient};
use sqlx::SqlitePool;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::OffsetTime;

// --- CLI definition ---

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Parser)]
#[command(name = "courtside")]
#[command(about = "Find courts, schedule pickup games, and see who's playing")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("COURTSIDE_GIT_HASH"), ")"))]
struct Cli {
    /// Log level [default: info, or config/env]
    #[arg(short, long, global = true)]
    log_level: Option<LogLevel>,

    /// Display log timestamps in UTC (default: local time)
    #[arg(long, global = true)]
    utc: bool,

    /// Database URL [default: sqlite:courtside.db, or config/env]
    #[arg(long, global = true)]
    db_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on [default: 3000, or config/env]
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Apply database migrations and exit
    Migrate,
    /// Search the places provider near a point and add every result as a court
    ImportCourts {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
        /// Search radius in meters
        #[arg(long)]
        radius: Option<u32>,
        /// Search keyword (default: "basketball court")
        #[arg(long)]
        keyword: Option<String>,
    },
    /// List scheduled games
    ListGames {
        /// Only games that haven't started yet
        #[arg(long)]
        upcoming: bool,
        /// Only games at this court id
        #[arg(long)]
        court: Option<i64>,
    },
    /// List known courts
    ListCourts {
        /// Only courts in this city
        #[arg(long)]
        city: Option<String>,
    },
}

// --- Logging ---

fn init_logging(level: &str, utc: bool) {
    let filter = EnvFilter::new(level);

    if utc {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_timer(OffsetTime::new(
                time::UtcOffset::UTC,
                time::macros::format_description!(
                    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
                ),
            ))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_timer(LocalTimer)
            .init();
    }
}

struct LocalTimer;

impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

// --- Commands ---

async fn run_server(port: u16, state: AppState) -> anyhow::Result<()> {
    info!("Courtside v{}", version_string());
    if state.places.is_none() {
        warn!("No places API key configured; /api/places/nearby will fail");
    }

    let app = router(state);
    let addr = format!("0.0.0.0:{port}");
    info!("Listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn import_courts(pool: &SqlitePool, config: &Config, search: NearbySearch) -> anyhow::Result<()> {
    let Some(key) = config.places_api_key.as_deref() else {
        bail!("no places API key configured (set PLACES_API_KEY or places_api_key in {})", Config::file_path().display());
    };
    let places = PlacesClient::new(key).nearby(&search).await?;

    let mut imported = 0;
    for place in places {
        let name = place.name.clone();
        match courtside_db::find_or_create_court(pool, &NewCourt::from(place)).await {
            Ok(court) => {
                println!("{:<6} {}", court.id, court.name);
                imported += 1;
            }
            Err(e) => warn!("Skipping {name}: {e}"),
        }
    }
    info!("{imported} courts imported");
    Ok(())
}

async fn list_games(pool: &SqlitePool, now: &Moment, upcoming: bool, court: Option<i64>) -> anyhow::Result<()> {
    let filter = GameFilter {
        court_id: court,
        upcoming: upcoming.then_some(true),
        limit: Some(100),
        ..Default::default()
    };
    let page = courtside_db::list_games(pool, &filter, now).await?;
    if page.items.is_empty() {
        println!("No games found.");
        return Ok(());
    }

    println!(
        "{:<6} {:<12} {:<6} {:<25} {:<16} {:<14} {}",
        "ID", "Date", "Time", "Court", "Type", "Skill", "Players"
    );
    println!("{}", "-".repeat(95));
    for g in &page.items {
        println!(
            "{:<6} {:<12} {:<6} {:<25} {:<16} {:<14} {}/{}",
            g.game.id,
            g.game.date,
            g.game.start_time,
            g.court.name,
            g.game.game_type,
            g.game.skill_level,
            g.game.participant_count,
            g.game.players_needed,
        );
    }
    println!("\n{} game(s) total", page.total);
    Ok(())
}

async fn list_courts(pool: &SqlitePool, city: Option<String>) -> anyhow::Result<()> {
    let filter = CourtFilter {
        city,
        limit: Some(100),
        ..Default::default()
    };
    let page = courtside_db::list_courts(pool, &filter).await?;
    if page.items.is_empty() {
        println!("No courts found. Use `courtside import-courts` to add some.");
        return Ok(());
    }

    println!("{:<6} {:<30} {:<18} {}", "ID", "Name", "City", "Type");
    println!("{}", "-".repeat(70));
    for c in &page.items {
        println!("{:<6} {:<30} {:<18} {}", c.id, c.name, c.city, c.court_type);
    }
    println!("\n{} court(s) total", page.total);
    Ok(())
}

// --- Main ---

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // CLI args win over config file and env.
    let mut config = Config::load();
    if let Some(level) = &cli.log_level {
        config.log_level = level.to_string();
    }
    if cli.utc {
        config.utc = true;
    }
    if let Some(url) = cli.db_url {
        config.db_url = url;
    }
    if let Commands::Serve { port: Some(port) } = &cli.command {
        config.port = *port;
    }

    init_logging(&config.log_level, config.utc);

    let pool = courtside_db::connect(&config.db_url)
        .await
        .with_context(|| format!("opening {}", config.db_url))?;
    courtside_db::migrate(&pool).await?;
    let state = AppState::from_config(pool.clone(), &config)?;

    match cli.command {
        Commands::Serve { .. } => run_server(config.port, state).await?,
        Commands::Migrate => println!("Database is up to date."),
        Commands::ImportCourts { lat, lng, radius, keyword } => {
            let search = NearbySearch {
                latitude: lat,
                longitude: lng,
                radius_meters: radius,
                keyword,
            };
            import_courts(&pool, &config, search).await?;
        }
        Commands::ListGames { upcoming, court } => list_games(&pool, &state.now(), upcoming, court).await?,
        Commands::ListCourts { city } => list_courts(&pool, city).await?,
    }

    Ok(())
}
