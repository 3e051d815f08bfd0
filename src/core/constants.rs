// Tick and timing
pub const MILLIS_PER_TICK: i64 = 50;
pub const BASE_INTERVAL_TICKS: u64 = 1200;
pub const INTERVAL_DECAY: f64 = 0.8;
pub const MAX_SPEED_RANK: u32 = 20;

// Batch size damping: 2^rank up to the knee, sqrt growth above it, hard exponent cap
pub const DAMPING_KNEE: u32 = 16;
pub const DAMPING_MAX_EXPONENT: u32 = 32;

// Online leg
pub const ONLINE_OCCURRENCE_CEILING: u64 = 10_000;
pub const ONLINE_SAMPLE_CAP: u32 = 50;

// Offline leg
pub const OFFLINE_SAMPLE_CAP: u32 = 100;
pub const MAX_BACKFILL_MILLIS: i64 = 7 * 24 * 60 * 60 * 1000;

// Sampling
pub const SCALE_DECIMAL_PLACES: u32 = 10;

// Storage
pub const MAX_STORAGE: usize = 500;

// Energy -> secondary currency: cost per unit is EXCHANGE_BASE / rank
pub const ENERGY_EXCHANGE_BASE: u64 = 10_000;

// Luck modifier handed to the resolver per LuckInjection rank
pub const LUCK_PER_RANK: f32 = 5.0;

// On-kill permanent growth per SoulReap rank, per occurrence
pub const STAT_MAX_HEALTH: &str = "max_health";
pub const STAT_ATTACK_DAMAGE: &str = "attack_damage";
// Thousandths per rank: 0.033 max health, 0.016 attack damage
pub const MAX_HEALTH_GROWTH_MILLI: i64 = 33;
pub const ATTACK_DAMAGE_GROWTH_MILLI: i64 = 16;

// Per-source satiety from simulated kills, in tenths per occurrence
pub const SATIETY_PER_OCCURRENCE_TENTHS: i64 = 1;
pub const MAX_SATIETY: i64 = 100;

// Consumed from a chamber's input buffer, one per barter
pub const BARTERING_CURRENCY: &str = "gold_ingot";
