use engine::{LoopConfig, Scene};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::level::Level;

const SEED_ENV_VAR: &str = "HOMESTEAD_SEED";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: Box<dyn Scene>,
}

pub(crate) fn build_app() -> AppWiring {
    init_tracing();
    info!("=== Homestead Startup ===");

    let rng = match parse_seed_from_env() {
        Some(seed) => {
            info!(seed, "rng_seeded_from_env");
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    AppWiring {
        config: LoopConfig::default(),
        scene: Box::new(Level::new(rng)),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn parse_seed_from_env() -> Option<u64> {
    let raw = std::env::var(SEED_ENV_VAR).ok()?;
    parse_seed(&raw)
}

fn parse_seed(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<u64>() {
        Ok(seed) => Some(seed),
        Err(error) => {
            warn!(value = trimmed, error = %error, "seed_env_ignored");
            None
        }
    }
}
