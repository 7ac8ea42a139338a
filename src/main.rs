use chrono::Local;
use clap::{Parser, ValueEnum};
use log::{info, warn};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use dartbridge::app_dirs::AppDirs;
use dartbridge::autodarts::AutodartsFeed;
use dartbridge::config::{Config, ConfigStore, FileConfigStore};
use dartbridge::dart::BoardEvent;
use dartbridge::game::{Game, GameRequest, GameType};
use dartbridge::history::{HistoryDb, SessionSummary};
use dartbridge::runtime::{BoardEventSource, FixedTicker, Runner};
use dartbridge::scoreboard::{ButtonMap, DryRunScoreboard, Scoreboard};
use dartbridge::sim::{SimConfig, SimulatedBoard};
use dartbridge::training::TrainingSession;

const TICK_RATE_MS: u64 = 250;
const DARTCONNECT_URL: &str = "https://app.dartconnect.com/";

/// bridges an autodarts board to online dart scoring
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Listens to an Autodarts board manager's event stream and scores your darts \
on DartConnect as you throw, or logs them for practice analysis. Darts are scored \
individually; the turn is submitted when you retrieve your darts."
)]
pub struct Cli {
    /// game to play
    #[clap(short = 'g', long, value_enum, default_value_t = GameArg::FiveOhOne)]
    game: GameArg,

    /// board manager base url (AUTODARTS_BASE_URL overrides)
    #[clap(short = 'u', long)]
    base_url: Option<String>,

    /// seconds a stuck takeout may linger before recovery kicks in
    #[clap(short = 't', long)]
    turn_timeout: Option<f64>,

    /// practice log csv (training mode)
    #[clap(short = 'l', long)]
    training_log: Option<PathBuf>,

    /// use a simulated board instead of a live one
    #[clap(long)]
    simulate: bool,

    /// open the scoring website in the default browser on startup
    #[clap(long)]
    open_scoreboard: bool,

    /// print past practice session summaries and exit
    #[clap(long)]
    history: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum GameArg {
    #[value(name = "501")]
    FiveOhOne,
    #[value(name = "301")]
    ThreeOhOne,
    Cricket,
    Training,
}

impl GameArg {
    fn as_game_type(&self) -> GameType {
        match self {
            GameArg::FiveOhOne => GameType::FiveOhOne,
            GameArg::ThreeOhOne => GameType::ThreeOhOne,
            GameArg::Cricket => GameType::Cricket,
            GameArg::Training => GameType::Training,
        }
    }
}

impl Cli {
    /// Overlay CLI arguments on the stored configuration.
    fn apply(&self, mut config: Config) -> Config {
        config.game_type = self.game.as_game_type();
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(secs) = self.turn_timeout {
            config.turn_timeout_secs = secs;
        }
        if let Some(path) = &self.training_log {
            config.training_log = Some(path.clone());
        }
        if self.open_scoreboard {
            config.open_scoreboard = true;
        }
        config
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.history {
        return print_history();
    }

    let store = FileConfigStore::new();
    let config = cli.apply(store.load());
    if let Err(err) = store.save(&config) {
        warn!("could not save config: {}", err);
    }

    if config.open_scoreboard && webbrowser::Browser::is_available() {
        if let Err(err) = webbrowser::open(DARTCONNECT_URL) {
            warn!("could not open scoring website: {}", err);
        }
    }

    let ticker = FixedTicker::new(Duration::from_millis(TICK_RATE_MS));
    println!("Now playing {}... GAME ON!", config.game_type);

    if cli.simulate {
        let board = SimulatedBoard::start(SimConfig {
            turns: if config.game_type == GameType::Training {
                Some(10)
            } else {
                None
            },
            ..Default::default()
        });
        run(&config, Runner::new(board, ticker))
    } else {
        let feed = AutodartsFeed::connect(&config.effective_base_url());
        run(&config, Runner::new(feed, ticker))
    }
}

fn run<E: BoardEventSource>(
    config: &Config,
    runner: Runner<E, FixedTicker>,
) -> Result<(), Box<dyn Error>> {
    match config.game_type {
        GameType::Training => run_training(config, runner),
        _ => run_scored_game(config, runner, DryRunScoreboard::new(ButtonMap::default())),
    }
}

fn run_scored_game<E: BoardEventSource, S: Scoreboard>(
    config: &Config,
    runner: Runner<E, FixedTicker>,
    scoreboard: S,
) -> Result<(), Box<dyn Error>> {
    let mut game = Game::new(config.game_type, scoreboard)
        .with_turn_timeout(Duration::from_secs_f64(config.turn_timeout_secs));

    while !game.is_over() {
        let event = runner.step();
        if let Some(GameRequest::ResetDevice) = game.on_event(event) {
            runner.request_reset();
        }
    }
    println!("GAME OVER");
    Ok(())
}

fn run_training<E: BoardEventSource>(
    config: &Config,
    runner: Runner<E, FixedTicker>,
) -> Result<(), Box<dyn Error>> {
    let log_path = match &config.training_log {
        Some(path) => path.clone(),
        None => default_training_log()?,
    };
    info!("logging practice throws to {}", log_path.display());

    let mut game = Game::new(GameType::Training, DryRunScoreboard::default())
        .with_turn_timeout(Duration::from_secs_f64(config.turn_timeout_secs));
    let mut session = TrainingSession::open(&log_path);

    loop {
        let event = runner.step();
        let feed_closed = event == BoardEvent::Disconnected;
        match game.on_event(event) {
            Some(GameRequest::LogThrow(throw)) => {
                let code = throw.code;
                if let Err(err) = session.log_throw(&throw) {
                    warn!("throw not logged: {}", err);
                } else {
                    let stats = session.stats();
                    println!(
                        "{} ({} throws, group center {:.1}/{:.1} mm)",
                        code,
                        session.len(),
                        stats.mean.0,
                        stats.mean.1,
                    );
                }
            }
            Some(GameRequest::ResetDevice) => runner.request_reset(),
            None => {}
        }
        if feed_closed {
            break;
        }
    }

    if !session.is_empty() {
        let summary =
            SessionSummary::from_stats(Local::now(), session.len(), &session.stats());
        match HistoryDb::new() {
            Ok(db) => db.record_session(&summary)?,
            Err(err) => warn!("practice history not recorded: {}", err),
        }
    }
    Ok(())
}

fn print_history() -> Result<(), Box<dyn Error>> {
    let db = HistoryDb::new()?;
    let summaries = db.session_summaries()?;
    if summaries.is_empty() {
        println!("No practice sessions recorded yet.");
        return Ok(());
    }
    for s in summaries {
        println!(
            "{}  {:>4} throws  center offset {:>6.1} mm  spread {:>6.1}/{:<6.1} mm",
            s.finished_at.format("%Y-%m-%d %H:%M"),
            s.throws,
            s.center_offset_mm,
            s.var_x.sqrt(),
            s.var_y.sqrt(),
        );
    }
    Ok(())
}

fn default_training_log() -> Result<PathBuf, Box<dyn Error>> {
    let dir = AppDirs::training_log_dir().ok_or("no home directory for training logs")?;
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join(format!(
        "training_{}.csv",
        Local::now().format("%Y%m%d_%H%M%S")
    )))
}
