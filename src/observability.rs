//! Structured logging setup. Independent of the Tracer (`domain::trace`),
//! which records a domain-level execution trace rather than operational
//! logs; follows the teacher's `observability` module in spirit (init
//! once at process start, env-filter driven).

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Initializes the global `tracing` subscriber. Safe to call once per
/// process; a second call is a no-op error that we deliberately ignore
/// (tests may call this repeatedly across the suite).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("COSTPILOT_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    let subscriber = Registry::default().with(filter).with(fmt_layer);
    let _ = subscriber.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_does_not_panic_when_called_twice() {
        init_tracing();
        init_tracing();
    }
}
