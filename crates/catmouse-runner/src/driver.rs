//! Drives a scheduler to completion, owning the clock for its restart timer.

use catmouse_core::EpisodeSummary;
use catmouse_world::{RoundScheduler, SchedulerState, TimerTicket};
use chrono::Utc;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

/// A sleeping restart task and the ticket it will fire
struct PendingFire {
    ticket: TimerTicket,
    handle: JoinHandle<()>,
}

impl PendingFire {
    fn cancel(self) {
        self.handle.abort();
    }
}

pub struct EpisodeDriver {
    scheduler: RoundScheduler,
    max_rounds: Option<u64>,
    fires_tx: mpsc::Sender<TimerTicket>,
    fires_rx: mpsc::Receiver<TimerTicket>,
    pending: Option<PendingFire>,
}

impl EpisodeDriver {
    pub fn new(scheduler: RoundScheduler) -> Self {
        let max_rounds = scheduler.config().max_rounds;
        let (fires_tx, fires_rx) = mpsc::channel(8);

        Self {
            scheduler,
            max_rounds,
            fires_tx,
            fires_rx,
            pending: None,
        }
    }

    pub fn scheduler(&self) -> &RoundScheduler {
        &self.scheduler
    }

    /// Play rounds until a side wins, the round cap is hit or `shutdown`
    /// resolves.
    ///
    /// With auto-advance on, rounds start when the scheduler's restart timer
    /// fires. Otherwise the driver starts them back to back.
    #[instrument(skip(self, shutdown), fields(episode_id = %self.scheduler.episode_id()))]
    pub async fn run<F>(mut self, shutdown: F) -> EpisodeSummary
    where
        F: Future<Output = ()>,
    {
        let started_at = Utc::now();
        tokio::pin!(shutdown);

        loop {
            if self.scheduler.victory().is_some() || self.round_cap_reached() {
                break;
            }

            if !self.scheduler.auto_advance() {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => {
                        info!("Shutdown requested, stopping episode");
                        break;
                    }
                    _ = tokio::task::yield_now() => {
                        let state = self.scheduler.start_next_round();
                        self.log_round(state);
                    }
                }
                continue;
            }

            if !self.sync_timer() {
                warn!("Auto-advance is on but no restart is armed, stopping");
                break;
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping episode");
                    break;
                }
                Some(ticket) = self.fires_rx.recv() => {
                    if self.scheduler.fire_restart(ticket) {
                        let state = self.scheduler.state();
                        self.log_round(state);
                    }
                }
            }
        }

        if let Some(pending) = self.pending.take() {
            pending.cancel();
        }
        self.scheduler.teardown();

        self.summary(started_at)
    }

    /// Make sure a sleeper exists for the currently armed restart
    fn sync_timer(&mut self) -> bool {
        let Some(armed) = self.scheduler.pending_restart() else {
            if let Some(pending) = self.pending.take() {
                pending.cancel();
            }
            return false;
        };

        if self.pending.as_ref().map(|p| p.ticket) == Some(armed.ticket) {
            return true;
        }

        if let Some(stale) = self.pending.take() {
            stale.cancel();
        }

        let tx = self.fires_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(armed.delay).await;
            // Receiver gone means the driver already stopped
            let _ = tx.send(armed.ticket).await;
        });
        trace!(ticket = ?armed.ticket, delay_ms = armed.delay.as_millis() as u64, "Restart sleeper spawned");

        self.pending = Some(PendingFire {
            ticket: armed.ticket,
            handle,
        });
        true
    }

    fn round_cap_reached(&self) -> bool {
        self.max_rounds
            .map_or(false, |cap| self.scheduler.current_round() >= cap)
    }

    fn log_round(&self, state: SchedulerState) {
        if let SchedulerState::Finished(_) = state {
            return;
        }

        debug!(
            round = self.scheduler.current_round(),
            cats = self.scheduler.alive_cats(),
            mice = self.scheduler.alive_mice(),
            "Round complete"
        );
        trace!("\n{}", self.scheduler.grid());
    }

    fn summary(&self, started_at: chrono::DateTime<Utc>) -> EpisodeSummary {
        let scheduler = &self.scheduler;
        EpisodeSummary {
            episode_id: scheduler.episode_id(),
            seed: scheduler.config().seed,
            map_size: scheduler.grid().size(),
            started_at,
            finished_at: Utc::now(),
            outcome: scheduler.victory(),
            final_cats: scheduler.alive_cats(),
            final_mice: scheduler.alive_mice(),
            stats: scheduler.stats().clone(),
        }
    }
}
