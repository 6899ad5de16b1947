//! Periodic status refresh for the tracked clock instances and the
//! mode selector.
//!
//! Each instance gets its own task so a slow or failing daemon never holds
//! up the other's cycle. Poll failures are expected while a service
//! restarts, so they are logged and the previous observation is kept on
//! display instead of blanked.
//!
//! Cancellation uses a shared generation counter: `stop()` bumps it, and
//! every write-back re-checks the generation it was started under after its
//! awaits. A response that comes back late for a stopped poller is dropped
//! on the floor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Local;
use log::{debug, warn};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::instance::ClockInstance;
use crate::status::{AggregateStatus, ObservedClockStatus, SyncModeState};
use crate::traits::ConfigGateway;

pub struct StatusPoller {
    generation: Arc<AtomicU64>,
    handles: Vec<JoinHandle<()>>,
}

impl StatusPoller {
    /// Spawn one polling task per instance plus one for the mode/aggregate
    /// cycle. `generation` is shared with the owner so other guarded
    /// refreshes (the post-apply settle refresh) honor the same cancellation.
    pub fn start<G>(
        gateway: Arc<G>,
        instances: Vec<Arc<RwLock<ClockInstance>>>,
        mode: Arc<RwLock<SyncModeState>>,
        aggregate: Arc<RwLock<AggregateStatus>>,
        period: Duration,
        generation: Arc<AtomicU64>,
    ) -> Self
    where
        G: ConfigGateway + 'static,
    {
        let expected = generation.load(Ordering::SeqCst);
        let mut handles = Vec::new();

        for slot in instances {
            let gateway = gateway.clone();
            let generation_task = generation.clone();
            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    if generation_task.load(Ordering::SeqCst) != expected {
                        break;
                    }
                    poll_instance_once(gateway.as_ref(), &slot, &generation_task, expected).await;
                }
            }));
        }

        {
            let gateway = gateway.clone();
            let generation_task = generation.clone();
            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    if generation_task.load(Ordering::SeqCst) != expected {
                        break;
                    }
                    poll_mode_once(gateway.as_ref(), &mode, &aggregate, &generation_task, expected)
                        .await;
                }
            }));
        }

        StatusPoller { generation, handles }
    }

    /// Invalidate all in-flight cycles and stop the tasks. Idempotent.
    pub fn stop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One FETCHING cycle for one instance: the three status queries run
/// concurrently, and the observation is replaced wholesale only if all three
/// succeed and the poller generation still matches.
pub async fn poll_instance_once<G: ConfigGateway + ?Sized>(
    gateway: &G,
    slot: &RwLock<ClockInstance>,
    generation: &AtomicU64,
    expected: u64,
) {
    let (id, domain) = {
        let guard = match slot.read() {
            Ok(guard) => guard,
            Err(e) => {
                warn!("[poller] instance lock poisoned: {}", e);
                return;
            }
        };
        (guard.id, guard.last_applied.domain_number)
    };

    let (time, port, data) = tokio::join!(
        gateway.time_status(id, domain),
        gateway.port_status(id, domain),
        gateway.current_time_data(id, domain),
    );

    match (time, port, data) {
        (Ok(time), Ok(port), Ok(data)) => {
            if generation.load(Ordering::SeqCst) != expected {
                debug!("[poller] {}: dropping stale cycle result", id);
                return;
            }
            let mut guard = match slot.write() {
                Ok(guard) => guard,
                Err(e) => {
                    warn!("[poller] instance lock poisoned: {}", e);
                    return;
                }
            };
            guard.observed = ObservedClockStatus {
                gm_identity: time.gm_identity,
                gm_present: time.gm_present,
                port_state: port,
                offset_from_master_ns: data.offset_from_master_ns,
                mean_path_delay_ns: data.mean_path_delay_ns,
                updated_at: Some(Local::now()),
            };
        }
        (time, port, data) => {
            // Keep the previous observation on display; restarts make this
            // a routine failure, not an operator-facing one.
            for err in [time.err(), port.err(), data.err()].into_iter().flatten() {
                debug!("[poller] {}: cycle failed: {}", id, err);
            }
        }
    }
}

/// One cycle of the mode-selector poll. The two queries update their slots
/// independently so a broken aggregate endpoint does not freeze the mode
/// display.
pub async fn poll_mode_once<G: ConfigGateway + ?Sized>(
    gateway: &G,
    mode: &RwLock<SyncModeState>,
    aggregate: &RwLock<AggregateStatus>,
    generation: &AtomicU64,
    expected: u64,
) {
    let (mode_result, aggregate_result) =
        tokio::join!(gateway.sync_mode(), gateway.system_clock_status());

    if generation.load(Ordering::SeqCst) != expected {
        debug!("[poller] dropping stale mode cycle result");
        return;
    }

    match mode_result {
        Ok(state) => {
            if let Ok(mut guard) = mode.write() {
                *guard = state;
            }
        }
        Err(e) => debug!("[poller] mode cycle failed: {}", e),
    }

    match aggregate_result {
        Ok(status) => {
            if let Ok(mut guard) = aggregate.write() {
                *guard = status;
            }
        }
        Err(e) => debug!("[poller] aggregate cycle failed: {}", e),
    }
}
