//! Binary entrypoint for the Realmkeep CLI.
//!
//! Commands:
//! - `init` - create a starter `config.toml`
//! - `simulate-trade [--fill-inventory]` - run a two-player trade against the
//!   in-memory world and the sled trade store
//! - `simulate-encounter [--boss <name>] [--seconds <n>] [--heroic]` - tick a
//!   reference encounter script and print every cast
//!
//! See the library crate docs for module‑level details: `realmkeep::`.
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};

use realmkeep::behavior::scripts::{blood_queen, plague_abomination, BloodQueen, PlagueAbomination};
use realmkeep::behavior::{Behavior, ScriptedActor};
use realmkeep::config::Config;
use realmkeep::engine::{ActorId, CastResult, EngineServices, ItemId, ItemSpec, MemoryWorld};
use realmkeep::events::{Clock, ManualClock, Ticker};
use realmkeep::storage::TradeStore;
use realmkeep::trade::{TradeError, TradeManager, TradeProgress, TradeStatus};

#[derive(Parser)]
#[command(name = "realmkeep")]
#[command(about = "Gameplay core simulator: scripted encounters and two-party trades")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Run a two-player trade and print what each client would see
    SimulateTrade {
        /// Fill the buyer's bags first so the commit is refused
        #[arg(long)]
        fill_inventory: bool,
    },
    /// Tick an encounter script and print its casts
    SimulateEncounter {
        #[arg(long, value_enum, default_value_t = Boss::BloodQueen)]
        boss: Boss,
        /// Simulated fight length in seconds
        #[arg(long, default_value_t = 180)]
        seconds: u64,
        /// Use heroic timings
        #[arg(long)]
        heroic: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Boss {
    BloodQueen,
    Plague,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    if !matches!(cli.command, Commands::Init) {
        init_logging(&pre_config, cli.verbose);
    }

    match cli.command {
        Commands::Init => {
            Config::create_default(&cli.config).await?;
            println!("Created default configuration at {}", cli.config);
            println!("Edit the [trade] section to change trade rules.");
        }
        Commands::SimulateTrade { fill_inventory } => {
            let config = config_or_default(pre_config, &cli.config);
            simulate_trade(&config, fill_inventory).await?;
        }
        Commands::SimulateEncounter {
            boss,
            seconds,
            heroic,
        } => {
            let config = config_or_default(pre_config, &cli.config);
            simulate_encounter(&config, boss, Duration::from_secs(seconds), heroic);
        }
    }

    Ok(())
}

fn config_or_default(config: Option<Config>, path: &str) -> Config {
    config.unwrap_or_else(|| {
        warn!("No usable config at {}, using defaults", path);
        Config::default()
    })
}

async fn simulate_trade(config: &Config, fill_inventory: bool) -> Result<()> {
    tokio::fs::create_dir_all(&config.storage.data_dir).await?;
    let store = Arc::new(TradeStore::open(config.storage.trade_db_path())?);

    let world = Arc::new(MemoryWorld::new());
    let buyer = world.add_player("Aelric");
    let seller = world.add_player("Brannoc");
    world.set_gold(buyer, 250);
    let blade = world.give_item(seller, ItemSpec::new(19019, "Thunderfury"));
    if fill_inventory {
        world.fill_bags(buyer);
    }

    let trades = TradeManager::new(EngineServices::from_world(world.clone()), config.trade.clone())
        .with_store(store.clone());

    let outcome = run_trade(&trades, buyer, seller, blade);
    for (to, note) in world.take_notifications() {
        println!("{} <- {:?}", to, note);
    }

    match outcome {
        Ok(TradeProgress::Completed(receipt)) => {
            println!("{}", serde_json::to_string_pretty(&receipt)?);
            let stored = store.get_trade(&receipt.id)?;
            info!("Trade {} persisted at {}", stored.id, stored.completed_at);
        }
        Ok(TradeProgress::AwaitingCounterpart) => {
            println!("Trade still waiting on {}", seller);
        }
        Err(e) => {
            println!("Trade not completed: {}", e);
            if trades.is_trading(buyer) {
                trades.cancel(buyer, TradeStatus::TradeCanceled)?;
            }
        }
    }
    println!(
        "{}: {} gold, {} items",
        buyer,
        world.gold_of(buyer),
        world.items_of(buyer).len()
    );
    println!(
        "{}: {} gold, {} items",
        seller,
        world.gold_of(seller),
        world.items_of(seller).len()
    );
    Ok(())
}

fn run_trade(
    trades: &TradeManager,
    buyer: ActorId,
    seller: ActorId,
    blade: ItemId,
) -> Result<TradeProgress, TradeError> {
    trades.initiate(buyer, seller)?;
    trades.begin(seller)?;
    trades.set_money(buyer, 100)?;
    trades.set_item(seller, 0, blade)?;
    trades.accept(buyer)?;
    trades.accept(seller)
}

fn simulate_encounter(config: &Config, boss: Boss, length: Duration, heroic: bool) {
    let world = Arc::new(MemoryWorld::new());
    let me = world.add_player("Boss");
    let raid: Vec<_> = (1..=10)
        .map(|n| world.add_player(&format!("Raider{}", n)))
        .collect();
    info!("Encounter {:?} with {} raiders", boss, raid.len());
    let spells = match boss {
        Boss::BloodQueen => blood_queen::SPELLS,
        Boss::Plague => plague_abomination::SPELLS,
    };
    for spell in spells {
        world.learn_spell(*spell, CastResult::Ok);
    }

    let services = EngineServices::from_world(world.clone());
    let seed = config.scheduler.rng_seed;
    match boss {
        Boss::BloodQueen => {
            let actor = build_actor(me, BloodQueen::new(), services, seed).heroic(heroic);
            run_encounter(actor, &world, config.scheduler.tick(), length);
        }
        Boss::Plague => {
            let actor = build_actor(me, PlagueAbomination::new(), services, seed).heroic(heroic);
            run_encounter(actor, &world, config.scheduler.tick(), length);
        }
    }
}

fn build_actor<B: Behavior>(
    me: ActorId,
    behavior: B,
    services: EngineServices,
    seed: Option<u64>,
) -> ScriptedActor<B> {
    match seed {
        Some(seed) => ScriptedActor::with_seed(me, behavior, services, seed),
        None => ScriptedActor::new(me, behavior, services),
    }
}

/// Drive `actor` frame by frame; movement requests arrive instantly.
fn run_encounter<B: Behavior>(
    mut actor: ScriptedActor<B>,
    world: &MemoryWorld,
    step: Duration,
    length: Duration,
) {
    let mut ticker = Ticker::new(ManualClock::new());
    let mut printed = 0;
    actor.engage();
    while ticker.clock().elapsed() < length {
        ticker.clock().advance(step);
        let report = actor.tick(ticker.tick());
        for point in actor.take_movements() {
            actor.movement_complete(point);
        }
        let casts = world.casts();
        let at = ticker.clock().elapsed();
        for cast in &casts[printed..] {
            println!(
                "[{:>7.1}s] {} casts {} on {:?}",
                at.as_secs_f32(),
                cast.caster,
                cast.spell,
                cast.target
            );
        }
        printed = casts.len();
        if report.yielded {
            info!("{} is casting, deferring remaining events", actor.id());
        }
    }
    for (_, note) in world.take_notifications() {
        println!("{:?}", note);
    }
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let configured = config
        .as_ref()
        .and_then(|c| c.logging.level.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info);
    let base_level = match verbosity {
        0 => configured,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let file = config.as_ref().and_then(|cfg| {
        let path = cfg.logging.file.as_ref()?;
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });
    let security_path = config.as_ref().and_then(|cfg| cfg.logging.security_file.clone());

    match file {
        Some(f) => {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
            // Background runs redirect stdout, so only echo to a terminal
            let is_tty = atty::is(atty::Stream::Stdout);

            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());

                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }

                if record.target() == "security" {
                    if let Some(ref sec_path) = security_path {
                        if let Ok(mut sf) = std::fs::OpenOptions::new()
                            .create(true)
                            .append(true)
                            .open(sec_path)
                        {
                            let _ = writeln!(sf, "{}", line);
                        }
                    }
                }

                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if record.target() == "security" {
                    if let Some(ref sec_path) = security_path {
                        if let Ok(mut sf) = std::fs::OpenOptions::new()
                            .create(true)
                            .append(true)
                            .open(sec_path)
                        {
                            let _ = writeln!(sf, "{}", line);
                        }
                    }
                }
                writeln!(fmt, "{}", line)
            });
        }
    }
    let _ = builder.try_init();
}
