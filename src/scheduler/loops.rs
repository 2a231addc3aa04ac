//! The rotation loop

use super::cycle::{run_cycle, CycleContext};
use super::events::{Phase, RotationEvent};
use super::handle::Shared;
use super::pool::CyclePool;
use super::timer::WaitOutcome;
use crate::config::Config;
use crate::error::ProcessError;
use crate::util::time::format_duration;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Loop tuning
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Concurrent rotation cycles
    pub workers: usize,
    /// Poll period while disabled
    pub idle_tick: Duration,
    /// Rotate once right after startup
    pub rotate_on_start: bool,
    /// How long shutdown waits for running cycles
    pub drain_timeout: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            workers: 2,
            idle_tick: Duration::from_secs(1),
            rotate_on_start: true,
            drain_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&Config> for ControllerOptions {
    fn from(config: &Config) -> Self {
        Self {
            rotate_on_start: config.rotation.rotate_on_start,
            ..Self::default()
        }
    }
}

/// Run until shutdown is requested, then drain the cycle pool
pub(super) async fn rotation_loop(
    shared: Arc<Shared>,
    ctx: Arc<CycleContext>,
    options: ControllerOptions,
) {
    let pool = CyclePool::new(options.workers, shared.shutdown.clone());

    let mut was_enabled = shared.supervisor.settings().await.enabled;
    if was_enabled {
        info!("Rotation enabled; starting daemons");
        start_daemons(&shared).await;
        if options.rotate_on_start {
            shared.rotate_requested.store(true, Ordering::SeqCst);
        }
    }
    let mut last_rotation = Instant::now();

    while !shared.shutdown.is_cancelled() {
        let settings = shared.supervisor.settings().await;

        if settings.enabled != was_enabled {
            was_enabled = settings.enabled;
            if was_enabled {
                info!("Rotation re-enabled; starting daemons");
                start_daemons(&shared).await;
                last_rotation = Instant::now();
            } else {
                info!("Rotation disabled; stopping daemons");
                stop_daemons(&shared).await;
            }
        }

        let manual = shared.rotate_requested.swap(false, Ordering::SeqCst);

        if !settings.enabled {
            shared.set_phase(Phase::Disabled);
            if manual {
                // Daemons stay as they are; the cycle reports what it can
                info!("Manual rotation requested while disabled");
                dispatch(&shared, &ctx, &pool, false).await;
            }
            if shared.timer.wait(options.idle_tick).await == WaitOutcome::Shutdown {
                break;
            }
            continue;
        }

        let interval = settings.interval();
        let elapsed = last_rotation.elapsed();

        if manual || elapsed >= interval {
            if manual {
                info!("Manual rotation requested");
            } else {
                debug!("Interval of {} elapsed", format_duration(interval));
            }
            dispatch(&shared, &ctx, &pool, true).await;
            last_rotation = Instant::now();
            continue;
        }

        let remaining = interval - elapsed;
        debug!("Next rotation in {}", format_duration(remaining));
        shared.set_phase(Phase::Waiting { remaining });

        match shared.timer.wait(remaining).await {
            WaitOutcome::Shutdown => break,
            WaitOutcome::Interrupted => debug!("Wait interrupted; re-evaluating"),
            WaitOutcome::Elapsed => {},
        }
    }

    info!("Rotation loop stopping");
    if !pool.drain(options.drain_timeout).await {
        error!("Rotation cycles did not finish in time and were aborted");
    }
}

/// Hand one cycle to the pool
async fn dispatch(shared: &Shared, ctx: &Arc<CycleContext>, pool: &CyclePool, repair: bool) {
    shared.set_phase(Phase::Rotating);

    if repair {
        if let Err(e) = shared.supervisor.ensure_running().await {
            report_daemon_error(shared, &e);
        }
    }

    if !pool.is_empty() {
        debug!("{} rotation cycle(s) already in the pool", pool.len());
    }
    let ctx = Arc::clone(ctx);
    pool.submit(async move {
        run_cycle(ctx).await;
    });
}

async fn start_daemons(shared: &Shared) {
    if let Err(e) = shared.supervisor.start_all().await {
        report_daemon_error(shared, &e);
    }
}

async fn stop_daemons(shared: &Shared) {
    if let Err(e) = shared.supervisor.stop_all().await {
        report_daemon_error(shared, &e);
    }
}

fn report_daemon_error(shared: &Shared, e: &ProcessError) {
    error!("{}", e);
    shared.events.publish(RotationEvent::DaemonError {
        daemon: e.daemon().to_string(),
        error: e.to_string(),
    });
}
