//! Headless chamber simulator
//!
//! Runs one chamber through an online session tick by tick, then an offline
//! gap, using the real scheduler. The sampled result is compared against a
//! brute-force run that resolves every occurrence individually.
//!
//! Usage:
//!   cargo run --bin simulator -- [OPTIONS]
//!
//! Options:
//!   --ticks N          Online ticks to run (default: 72000 = 1 hour)
//!   --offline-hours N  Offline gap after the session (default: 8)
//!   --speed N          Speed rank (default: 4)
//!   --thread N         Thread rank (default: 2)
//!   --seed N           RNG seed (default: 42)
//!   --runs N           Number of runs with incrementing seeds (default: 1)
//!   --brute-limit N    Skip brute force above this many occurrences (default: 2000000)
//!   --config FILE      Engine config JSON
//!   --quiet            Only final summary line

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::Path;
use vchamber::core::constants::MILLIS_PER_TICK;
use vchamber::host::memory::{
    LootEntry, LootTable, PriceTable, RecipeBook, RecordingLedger, StaticRanks, TableResolver,
};
use vchamber::host::Ability;
use vchamber::{AccountId, Chamber, ChamberEngine, ChamberRoster, EngineConfig, Host, SourceIdentity};

// ── CLI Configuration ────────────────────────────────────────────────

struct SimConfig {
    ticks: u64,
    offline_hours: i64,
    speed: u32,
    thread: u32,
    seed: u64,
    runs: u32,
    brute_limit: u64,
    config_path: Option<String>,
    quiet: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ticks: 72_000,
            offline_hours: 8,
            speed: 4,
            thread: 2,
            seed: 42,
            runs: 1,
            brute_limit: 2_000_000,
            config_path: None,
            quiet: false,
        }
    }
}

fn parse_args() -> SimConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = SimConfig::default();
    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--ticks" => config.ticks = number(&args, &mut i, flag),
            "--offline-hours" => config.offline_hours = number(&args, &mut i, flag),
            "--speed" => config.speed = number(&args, &mut i, flag),
            "--thread" => config.thread = number(&args, &mut i, flag),
            "--seed" => config.seed = number(&args, &mut i, flag),
            "--runs" => config.runs = number(&args, &mut i, flag),
            "--brute-limit" => config.brute_limit = number(&args, &mut i, flag),
            "--config" => {
                i += 1;
                config.config_path = args.get(i).cloned();
            }
            "--quiet" => config.quiet = true,
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }
    config
}

fn number<T: std::str::FromStr>(args: &[String], i: &mut usize, flag: &str) -> T {
    *i += 1;
    match args.get(*i).and_then(|v| v.parse().ok()) {
        Some(n) => n,
        None => {
            eprintln!("{flag} requires a number");
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!(
        "Chamber Simulator\n\
         \n\
         Usage: simulator [OPTIONS]\n\
         \n\
         Options:\n\
         \x20 --ticks N          Online ticks to run (default: 72000 = 1 hour)\n\
         \x20 --offline-hours N  Offline gap after the session (default: 8)\n\
         \x20 --speed N          Speed rank (default: 4)\n\
         \x20 --thread N         Thread rank (default: 2)\n\
         \x20 --seed N           RNG seed (default: 42)\n\
         \x20 --runs N           Number of runs with incrementing seeds (default: 1)\n\
         \x20 --brute-limit N    Skip brute force above this many occurrences\n\
         \x20 --config FILE      Engine config JSON\n\
         \x20 --quiet            Only final summary line\n\
         \x20 --help, -h         Show this help"
    );
}

// ── World Setup ──────────────────────────────────────────────────────

fn source() -> SourceIdentity {
    SourceIdentity::Creature("zombie".into())
}

fn loot_table() -> LootTable {
    LootTable::new(5)
        .with(LootEntry::new("rotten_flesh", 1.0, 0, 2))
        .with(LootEntry::new("iron_ingot", 0.025, 1, 1))
        .with(LootEntry::new("carrot", 0.025, 1, 1))
        .with(LootEntry::new("potato", 0.025, 1, 1))
}

struct RunResult {
    online_flushes: usize,
    total_units: u64,
    sampled: BTreeMap<String, u64>,
    brute: Option<BTreeMap<String, u64>>,
    expected: BTreeMap<String, f64>,
    currency: Decimal,
    energy: Decimal,
}

fn run_once(engine: &ChamberEngine, sim: &SimConfig, seed: u64) -> RunResult {
    let table = loot_table();
    let resolver = TableResolver::new().with(source(), table.clone());
    let prices = PriceTable::new(Decimal::ONE).with("iron_ingot", Decimal::new(25, 0));
    let ranks = StaticRanks::new()
        .with(Ability::ClockSpeed, sim.speed)
        .with(Ability::MultiThread, sim.thread)
        .with(Ability::OfflinePersistence, 1);
    let recipes = RecipeBook::new();
    let host = Host {
        resolver: &resolver,
        prices: &prices,
        ranks: &ranks,
        recipes: &recipes,
    };

    let owner = AccountId::new_random();
    let start_millis = 0;
    let mut roster = ChamberRoster::new(owner);
    let mut chamber = Chamber::new(source(), 0, start_millis);
    chamber.set_speed_rank(sim.speed, sim.speed);
    chamber.set_thread_rank(sim.thread, sim.thread);
    roster.capture(chamber);

    let mut ledger = RecordingLedger::new();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut total_units = 0u64;
    let mut online_flushes = 0;

    for tick in 1..=sim.ticks {
        let now = start_millis + tick as i64 * MILLIS_PER_TICK;
        let report = engine.run_online_tick(&mut roster, tick, now, &host, &mut ledger, &mut rng);
        online_flushes += report.flushes.len();
        total_units = total_units.saturating_add(report.total_units());
    }

    let session_end = start_millis + sim.ticks as i64 * MILLIS_PER_TICK;
    let login = session_end + sim.offline_hours * 3_600_000;
    let report = engine.catch_up_roster(&mut roster, login, &host, &mut ledger, &mut rng);
    total_units = total_units.saturating_add(report.total_units());

    let mut sampled = BTreeMap::new();
    for stack in &roster.chambers[0].storage {
        *sampled.entry(stack.id.to_string()).or_insert(0u64) += stack.count;
    }

    let expected = table
        .entries
        .iter()
        .map(|e| (e.item.to_string(), e.expected_count(0.0, 0) * total_units as f64))
        .collect();

    let brute = (total_units <= sim.brute_limit).then(|| {
        let mut brute_rng = ChaCha8Rng::seed_from_u64(seed ^ 0x5eed);
        let mut counts = BTreeMap::new();
        for _ in 0..total_units {
            for line in table.roll(0.0, 0, &mut brute_rng).lines {
                *counts.entry(line.stack.id.to_string()).or_insert(0u64) += line.stack.count;
            }
        }
        counts
    });

    let totals = ledger.totals(owner);
    RunResult {
        online_flushes,
        total_units,
        sampled,
        brute,
        expected,
        currency: totals.currency,
        energy: roster.chambers[0].pending_energy,
    }
}

fn relative_error(actual: u64, expected: f64) -> f64 {
    if expected <= 0.0 {
        return 0.0;
    }
    (actual as f64 - expected).abs() / expected
}

fn print_run(run: &RunResult, seed: u64) {
    println!("── Seed {seed} ──────────────────────────────────────────────");
    println!("  Online flushes:   {}", run.online_flushes);
    println!("  Occurrences:      {}", run.total_units);
    println!("  Currency:         {}", run.currency);
    println!("  Pending energy:   {}", run.energy.round_dp(2));
    println!();
    println!("  {:<14} {:>12} {:>12} {:>14}", "item", "sampled", "brute", "expected");
    for (item, expected) in &run.expected {
        let sampled = run.sampled.get(item).copied().unwrap_or(0);
        let brute = run
            .brute
            .as_ref()
            .map(|b| b.get(item).copied().unwrap_or(0).to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("  {item:<14} {sampled:>12} {brute:>12} {expected:>14.1}");
    }
    println!();
}

fn main() {
    let sim = parse_args();

    let level = if sim.quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    let config = match &sim.config_path {
        Some(path) => EngineConfig::load_or_default(Path::new(path)),
        None => EngineConfig::default(),
    };
    let engine = ChamberEngine::new(config);

    let mut worst = 0.0f64;
    for r in 0..sim.runs {
        let seed = sim.seed.wrapping_add(r as u64);
        let run = run_once(&engine, &sim, seed);
        if !sim.quiet {
            print_run(&run, seed);
        }
        for (item, expected) in &run.expected {
            // Rare items are too noisy to judge
            if *expected < 1_000.0 {
                continue;
            }
            let sampled = run.sampled.get(item).copied().unwrap_or(0);
            worst = worst.max(relative_error(sampled, *expected));
        }
    }

    println!(
        "runs={} ticks={} offline_hours={} speed={} thread={} worst_relative_error={:.4}",
        sim.runs, sim.ticks, sim.offline_hours, sim.speed, sim.thread, worst
    );
}
