use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::params::Parameters;
use crate::philosopher::{Food, LifeState, Philosopher};
use crate::table::{LockSet, Resource, Table};

/// What the waiter is doing right now. The waiter serves one need at a
/// time; there is no internal concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Idle,
    ServingPizza,
    ServingSpaghetti,
    WashingCutlery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Inactive,
    Active,
}

/// The waiter's shared record. Only the waiter task writes it;
/// philosophers signal needs over the bell channel instead of touching
/// this state. The three task flags remember overlapping obligations
/// signalled by several hungry philosophers before they get serviced.
#[derive(Debug, Clone)]
pub struct WaiterState {
    pub activity: Activity,
    pub replenish_pizza: TaskStatus,
    pub replenish_spaghetti: TaskStatus,
    pub wash_cutlery: TaskStatus,
}

impl WaiterState {
    pub fn new() -> WaiterState {
        WaiterState {
            activity: Activity::Idle,
            replenish_pizza: TaskStatus::Inactive,
            replenish_spaghetti: TaskStatus::Inactive,
            wash_cutlery: TaskStatus::Inactive,
        }
    }
}

impl Default for WaiterState {
    fn default() -> WaiterState {
        WaiterState::new()
    }
}

pub fn spawn_waiter(
    table: Arc<Table>,
    params: Parameters,
    bell: mpsc::Receiver<Resource>,
    restocked: broadcast::Sender<Resource>,
    stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(waiter_loop(table, params, bell, restocked, stop))
}

/// The arbitration loop. Wakes on the bell, gathers every pending need
/// (queued rings plus a scan of the shared state), then services them in a
/// fixed priority order: cutlery wash first, then pizza, then spaghetti.
/// Cutlery goes first because it is reusable and usually the tighter
/// bottleneck. The loop has no terminal state of its own; it exits when
/// the stop signal flips or every bell sender is gone.
async fn waiter_loop(
    table: Arc<Table>,
    params: Parameters,
    mut bell: mpsc::Receiver<Resource>,
    restocked: broadcast::Sender<Resource>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
            need = bell.recv() => {
                let Some(need) = need else { break };
                note_need(&table, need).await;
                while let Ok(more) = bell.try_recv() {
                    note_need(&table, more).await;
                }
                scan_for_needs(&table).await;
                service_pending(&table, &params, &restocked).await;
            }
        }
    }
}

async fn note_need(table: &Table, need: Resource) {
    let mut waiter = table.waiter_state().await;
    match need {
        Resource::Pizza => waiter.replenish_pizza = TaskStatus::Active,
        Resource::Spaghetti => waiter.replenish_spaghetti = TaskStatus::Active,
        Resource::Cutlery => waiter.wash_cutlery = TaskStatus::Active,
    }
}

/// Looks for needs nobody rang about: a food at zero stock with someone
/// hungry for it, or dirty cutlery while someone is hungry. Keeps a
/// continuously running waiter from ever overlooking a waiting
/// philosopher.
async fn scan_for_needs(table: &Table) {
    let (pizza_out, spaghetti_out, cutlery_dirty) = {
        let mut t = table.lock(LockSet::ALL).await;
        let (hungry_pizza, hungry_spaghetti, any_hungry) = {
            let philosophers = t.philosophers.as_ref().expect("scan locked all partitions");
            let hungry = |p: &Philosopher| p.life_state == LifeState::Hungry;
            (
                philosophers
                    .iter()
                    .any(|p| hungry(p) && p.chosen_food == Some(Food::Pizza)),
                philosophers
                    .iter()
                    .any(|p| hungry(p) && p.chosen_food == Some(Food::Spaghetti)),
                philosophers.iter().any(|p| hungry(p)),
            )
        };
        let pizza_out = t.stock_mut(Food::Pizza).portions == 0 && hungry_pizza;
        let spaghetti_out = t.stock_mut(Food::Spaghetti).portions == 0 && hungry_spaghetti;
        let rack = t.cutlery_mut();
        let cutlery_dirty = (rack.dirty_forks + rack.dirty_knives) > 0 && any_hungry;
        (pizza_out, spaghetti_out, cutlery_dirty)
    };

    let mut waiter = table.waiter_state().await;
    if pizza_out {
        waiter.replenish_pizza = TaskStatus::Active;
    }
    if spaghetti_out {
        waiter.replenish_spaghetti = TaskStatus::Active;
    }
    if cutlery_dirty {
        waiter.wash_cutlery = TaskStatus::Active;
    }
}

async fn service_pending(table: &Table, params: &Parameters, restocked: &broadcast::Sender<Resource>) {
    let pending = table.waiter_state().await.clone();
    if pending.wash_cutlery == TaskStatus::Active {
        wash_cutlery(table, params, restocked).await;
    }
    if pending.replenish_pizza == TaskStatus::Active {
        replenish(table, Food::Pizza, params.pizza_batch, restocked).await;
    }
    if pending.replenish_spaghetti == TaskStatus::Active {
        replenish(table, Food::Spaghetti, params.spaghetti_batch, restocked).await;
    }
}

/// Moves everything in the sink into the waiter's hands, washes it with no
/// lock held, then returns it clean and announces the restock.
async fn wash_cutlery(table: &Table, params: &Parameters, restocked: &broadcast::Sender<Resource>) {
    {
        let mut waiter = table.waiter_state().await;
        waiter.activity = Activity::WashingCutlery;
    }

    let (forks, knives) = {
        let mut t = table.lock(LockSet::CUTLERY).await;
        t.cutlery_mut().start_washing()
    };
    if forks + knives > 0 {
        sleep(Duration::from_millis(params.wash_time_ms)).await;
        {
            let mut t = table.lock(LockSet::CUTLERY).await;
            t.cutlery_mut().finish_washing(forks, knives);
        }
        let _ = restocked.send(Resource::Cutlery);
    }

    let mut waiter = table.waiter_state().await;
    waiter.wash_cutlery = TaskStatus::Inactive;
    waiter.activity = Activity::Idle;
}

/// Refills one food if it is still at the low-water mark (zero) when the
/// waiter gets to it. A stale ring for a stock that recovered in the
/// meantime is dropped without effect.
async fn replenish(
    table: &Table,
    food: Food,
    batch: u32,
    restocked: &broadcast::Sender<Resource>,
) {
    {
        let mut waiter = table.waiter_state().await;
        waiter.activity = match food {
            Food::Pizza => Activity::ServingPizza,
            Food::Spaghetti => Activity::ServingSpaghetti,
        };
    }

    let refilled = {
        let mut t = table.lock(food.lock_class()).await;
        let stock = t.stock_mut(food);
        if stock.portions == 0 {
            stock.replenish(batch);
            true
        } else {
            false
        }
    };
    if refilled {
        let _ = restocked.send(food.resource());
    }

    let mut waiter = table.waiter_state().await;
    match food {
        Food::Pizza => waiter.replenish_pizza = TaskStatus::Inactive,
        Food::Spaghetti => waiter.replenish_spaghetti = TaskStatus::Inactive,
    }
    waiter.activity = Activity::Idle;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::philosopher::Held;
    use tokio::sync::{broadcast, mpsc, watch};
    use tokio::time::{timeout, Duration};

    fn harness(
        params: &Parameters,
    ) -> (
        Arc<Table>,
        mpsc::Sender<Resource>,
        broadcast::Sender<Resource>,
        watch::Sender<bool>,
        JoinHandle<()>,
    ) {
        let table = Arc::new(Table::new(params));
        let (bell_tx, bell_rx) = mpsc::channel(100);
        let (restocked, _) = broadcast::channel(100);
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = spawn_waiter(
            table.clone(),
            params.clone(),
            bell_rx,
            restocked.clone(),
            stop_rx,
        );
        (table, bell_tx, restocked, stop_tx, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_signal() {
        let params = Parameters::default();
        let (_table, _bell, _restocked, stop, handle) = harness(&params);
        stop.send(true).expect("waiter is still listening");
        timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter stopped")
            .expect("waiter exited cleanly");
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_all_bell_senders_are_gone() {
        let params = Parameters::default();
        let (_table, bell, _restocked, _stop, handle) = harness(&params);
        drop(bell);
        timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter stopped")
            .expect("waiter exited cleanly");
    }

    #[tokio::test(start_paused = true)]
    async fn refills_an_empty_stock_when_rung() {
        let params = Parameters::default();
        let (table, bell, restocked, _stop, _handle) = harness(&params);

        {
            let mut t = table.lock(LockSet::PIZZA).await;
            let stock = t.stock_mut(Food::Pizza);
            while stock.portions > 0 {
                stock.serve_one();
            }
        }

        let mut events = restocked.subscribe();
        bell.send(Resource::Pizza).await.expect("waiter is running");
        let event = timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("restock announced")
            .expect("channel open");
        assert_eq!(event, Resource::Pizza);

        let snap = table.snapshot().await;
        assert_eq!(snap.pizza.portions, params.pizza_batch);
        assert_eq!(snap.pizza.replenished, params.pizza_batch);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_ring_for_a_stocked_food_is_dropped() {
        let params = Parameters::default();
        let (table, bell, _restocked, _stop, _handle) = harness(&params);

        bell.send(Resource::Spaghetti).await.expect("waiter is running");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let snap = table.snapshot().await;
        assert_eq!(snap.spaghetti.portions, params.spaghetti_batch);
        assert_eq!(snap.spaghetti.replenished, 0);
        assert_eq!(snap.waiter.replenish_spaghetti, TaskStatus::Inactive);
    }

    #[tokio::test(start_paused = true)]
    async fn washes_dirty_cutlery_back_to_clean() {
        let params = Parameters::default();
        let (table, bell, restocked, _stop, _handle) = harness(&params);

        {
            let mut t = table.lock(LockSet::CUTLERY).await;
            let rack = t.cutlery_mut();
            rack.take(&[Held::Fork, Held::Knife]);
            rack.drop_dirty(&[Held::Fork, Held::Knife]);
        }

        let mut events = restocked.subscribe();
        bell.send(Resource::Cutlery).await.expect("waiter is running");
        let event = timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("restock announced")
            .expect("channel open");
        assert_eq!(event, Resource::Cutlery);

        let snap = table.snapshot().await;
        assert_eq!(snap.cutlery.clean_forks, params.num_forks);
        assert_eq!(snap.cutlery.clean_knives, params.num_knives);
        assert_eq!(snap.cutlery.dirty_forks + snap.cutlery.washing_forks, 0);
    }
}
