//! Resiliency simulator.
//!
//! Drives a simulated dependency through a named circuit breaker so the
//! configured behaviour can be watched in the logs.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────┐   ┌──────────────────┐   ┌──────────────┐   ┌────────────────────┐
//!   │  config  │──▶│ BreakerRegistry  │──▶│CircuitBreaker│──▶│ simulated dependency│
//!   │  (TOML)  │   │  (keyed, shared) │   │   .call()    │   │ (fails first N)     │
//!   └──────────┘   └──────────────────┘   └──────┬───────┘   └────────────────────┘
//!                                                │ failure / broken
//!                                                ▼
//!                                        ┌──────────────┐      ┌──────────────┐
//!                                        │ retry wait   │◀─────│ Ctrl-C/TERM  │
//!                                        │ (cancellable)│      │ → Shutdown   │
//!                                        └──────────────┘      └──────────────┘
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;
use thiserror::Error;

use resiliency::config::{load_config, ResiliencyConfig};
use resiliency::lifecycle::{wait_for_signal, Shutdown};
use resiliency::resilience::{
    BreakerRegistry, CallError, CircuitBreaker, RetryHandlerInfo, RetryOperation, RetryTotalInfo,
};

#[derive(Parser)]
#[command(name = "resiliency-sim")]
#[command(about = "Exercise a circuit breaker against a flaky simulated dependency", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Breaker key to drive.
    #[arg(short, long, default_value = "simulated")]
    key: String,

    /// Number of calls to attempt.
    #[arg(short = 'n', long, default_value_t = 20)]
    calls: u32,

    /// The dependency fails this many calls before recovering.
    #[arg(short, long, default_value_t = 3)]
    fail_first: u32,

    /// Delay between attempts after an ordinary failure or success.
    #[arg(short, long, default_value_t = 100)]
    delay_ms: u64,
}

#[derive(Debug, Clone, Error)]
#[error("simulated dependency unavailable (call {call})")]
struct Unavailable {
    call: u32,
}

/// Dependency that fails its first `fail_first` calls.
struct FlakyDependency {
    fail_first: u32,
    calls: AtomicU32,
}

impl FlakyDependency {
    async fn invoke(&self) -> Result<u32, Unavailable> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.fail_first {
            Err(Unavailable { call })
        } else {
            Ok(call)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ResiliencyConfig::default(),
    };

    resiliency::observability::init(&config.observability.log_level)?;

    tracing::info!("resiliency-sim v{} starting", env!("CARGO_PKG_VERSION"));

    let registry = BreakerRegistry::from_config(&config);
    let settings = config.breaker_settings(&cli.key);
    tracing::info!(
        key = %cli.key,
        initial_state = %settings.initial_state,
        cooldown_ms = settings.cooldown_ms,
        half_open_success_threshold = settings.half_open_success_threshold,
        "Configuration loaded"
    );
    let breaker = registry.get_or_create(&cli.key, || {
        CircuitBreaker::from_boxed(settings.strategy.build(), settings.options())
    });

    let shutdown = Shutdown::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_shutdown.trigger();
    });

    let dependency = FlakyDependency {
        fail_first: cli.fail_first,
        calls: AtomicU32::new(0),
    };
    let delay = Duration::from_millis(cli.delay_ms);

    let mut operation = RetryOperation::new(
        RetryHandlerInfo {
            name: cli.key.clone(),
            attempt: 1,
        },
        RetryTotalInfo::new(Instant::now()),
        shutdown.child_token(),
    );

    for _ in 0..cli.calls {
        let pause = match breaker.call(|| dependency.invoke()).await {
            Ok(call) => {
                tracing::info!(call, state = %breaker.state(), "Call succeeded");
                delay
            }
            Err(CallError::Inner(e)) => {
                tracing::warn!(error = %e, state = %breaker.state(), "Call failed");
                delay
            }
            Err(CallError::Broken(broken)) => {
                tracing::warn!(%broken, state = %breaker.state(), "Circuit broken");
                broken.retry_after().unwrap_or(delay).max(delay)
            }
        };

        if operation.wait(pause).await.is_err() {
            tracing::info!("Stopping early");
            break;
        }
        operation = operation.next_attempt();
    }

    let snapshot = breaker.snapshot();
    tracing::info!(
        attempts = operation.total().attempts,
        elapsed_ms = operation.total().elapsed().as_millis() as u64,
        state = %snapshot.state,
        "Simulation complete"
    );
    Ok(())
}
