use std::sync::Arc;

use anyhow::{anyhow, Context};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::params::Parameters;
use crate::philosopher::spawn_philosopher;
use crate::table::{Resource, Snapshot, Table};
use crate::waiter::spawn_waiter;

/// Owns the shared table, the coordination channels and every spawned
/// participant. Created once per run; dropping it after `shutdown()`
/// releases everything.
pub struct Simulation {
    params: Parameters,
    table: Arc<Table>,
    bell_tx: mpsc::Sender<Resource>,
    bell_rx: Option<mpsc::Receiver<Resource>>,
    restocked: broadcast::Sender<Resource>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    philosophers: Vec<JoinHandle<()>>,
    waiter: Option<JoinHandle<()>>,
}

impl Simulation {
    /// Validates the configuration and builds the shared state. Nothing is
    /// allocated if validation fails.
    pub fn new(params: Parameters) -> anyhow::Result<Simulation> {
        params.validate()?;
        let table = Arc::new(Table::new(&params));
        let (bell_tx, bell_rx) = mpsc::channel(100);
        let (restocked, _) = broadcast::channel(100);
        let (stop_tx, stop_rx) = watch::channel(false);
        Ok(Simulation {
            params,
            table,
            bell_tx,
            bell_rx: Some(bell_rx),
            restocked,
            stop_tx,
            stop_rx,
            philosophers: Vec::new(),
            waiter: None,
        })
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Shared handle for passive observers (the periodic display).
    pub fn table(&self) -> Arc<Table> {
        self.table.clone()
    }

    pub fn spawn_philosopher(&mut self, id: usize, seed: u64) {
        let handle = spawn_philosopher(
            self.table.clone(),
            id,
            self.params.clone(),
            seed,
            self.bell_tx.clone(),
            self.restocked.clone(),
        );
        self.philosophers.push(handle);
    }

    pub fn spawn_waiter(&mut self) {
        let bell_rx = self
            .bell_rx
            .take()
            .expect("waiter was already spawned");
        let handle = spawn_waiter(
            self.table.clone(),
            self.params.clone(),
            bell_rx,
            self.restocked.clone(),
            self.stop_rx.clone(),
        );
        self.waiter = Some(handle);
    }

    /// Spawns the waiter and one philosopher per seat. Each philosopher
    /// gets its own rng seeded from the base seed, so a whole run replays
    /// from a single number.
    pub fn spawn_all(&mut self, base_seed: u64) {
        self.spawn_waiter();
        for id in 0..self.params.num_philosophers as usize {
            self.spawn_philosopher(id, base_seed.wrapping_add(id as u64));
        }
    }

    /// Waits for every philosopher to reach its natural death. Reaps all of
    /// them even if one panicked, then reports the first failure.
    pub async fn await_philosophers(&mut self) -> anyhow::Result<()> {
        let mut first_failure = None;
        for (id, handle) in self.philosophers.drain(..).enumerate() {
            if let Err(e) = handle.await {
                if first_failure.is_none() {
                    first_failure = Some(anyhow!(e).context(format!("philosopher {id} failed")));
                }
            }
        }
        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Tells the waiter to stop and waits for it. Idempotent; safe to call
    /// when no waiter was spawned.
    pub async fn shutdown(&mut self) -> anyhow::Result<()> {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.waiter.take() {
            handle.await.context("waiter failed")?;
        }
        Ok(())
    }

    /// Full run: spawn everyone, wait for all philosophers to die, stop the
    /// waiter. The waiter is reaped even when a philosopher failed.
    pub async fn run(&mut self, base_seed: u64) -> anyhow::Result<()> {
        self.spawn_all(base_seed);
        let result = self.await_philosophers().await;
        let stopped = self.shutdown().await;
        result.and(stopped)
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.table.snapshot().await
    }
}
