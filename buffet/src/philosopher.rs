use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};

use crate::params::Parameters;
use crate::table::{LockSet, Resource, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeState {
    Born,
    Thinking,
    Hungry,
    Eating,
    Washing,
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Food {
    Pizza,
    Spaghetti,
}

/// One cutlery slot in a philosopher's hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Held {
    Nothing,
    Fork,
    Knife,
}

pub const EMPTY_HANDS: [Held; 2] = [Held::Nothing, Held::Nothing];

impl Food {
    /// Pizza is cut with a knife; spaghetti is rolled between two forks.
    pub fn cutlery(self) -> [Held; 2] {
        match self {
            Food::Pizza => [Held::Fork, Held::Knife],
            Food::Spaghetti => [Held::Fork, Held::Fork],
        }
    }

    pub fn resource(self) -> Resource {
        match self {
            Food::Pizza => Resource::Pizza,
            Food::Spaghetti => Resource::Spaghetti,
        }
    }

    pub fn lock_class(self) -> LockSet {
        match self {
            Food::Pizza => LockSet::PIZZA,
            Food::Spaghetti => LockSet::SPAGHETTI,
        }
    }
}

/// Picks a food from a draw in [0, 100) against the configured threshold.
pub fn choose_food(draw: u32, pizza_prob: u32) -> Food {
    if draw < pizza_prob {
        Food::Pizza
    } else {
        Food::Spaghetti
    }
}

/// One philosopher's shared record. Mutated only by its own task, under
/// the philosopher-state lock.
#[derive(Debug, Clone)]
pub struct Philosopher {
    pub life_state: LifeState,
    pub chosen_food: Option<Food>,
    pub held: [Held; 2],
    /// Cycles drawn at birth; zero until the task first runs.
    pub lifetime: u32,
    pub meals_eaten: u32,
}

impl Philosopher {
    pub fn new() -> Philosopher {
        Philosopher {
            life_state: LifeState::Born,
            chosen_food: None,
            held: EMPTY_HANDS,
            lifetime: 0,
            meals_eaten: 0,
        }
    }
}

impl Default for Philosopher {
    fn default() -> Philosopher {
        Philosopher::new()
    }
}

pub fn spawn_philosopher(
    table: Arc<Table>,
    id: usize,
    params: Parameters,
    seed: u64,
    bell: mpsc::Sender<Resource>,
    restocked: broadcast::Sender<Resource>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rng = StdRng::seed_from_u64(seed);
        let lifetime = rng.random_range(params.min_life..=params.max_life);
        {
            let mut t = table.lock(LockSet::PHILOSOPHERS).await;
            t.philosopher_mut(id).lifetime = lifetime;
        }

        for _ in 0..lifetime {
            live_one_cycle(&table, id, &params, &mut rng, &bell, &restocked).await;
        }

        let mut t = table.lock(LockSet::PHILOSOPHERS).await;
        let me = t.philosopher_mut(id);
        me.life_state = LifeState::Dead;
        me.chosen_food = None;
    })
}

/// One think -> eat -> wash iteration. Never holds a lock across a delay.
async fn live_one_cycle(
    table: &Table,
    id: usize,
    params: &Parameters,
    rng: &mut StdRng,
    bell: &mpsc::Sender<Resource>,
    restocked: &broadcast::Sender<Resource>,
) {
    {
        let mut t = table.lock(LockSet::PHILOSOPHERS).await;
        t.philosopher_mut(id).life_state = LifeState::Thinking;
    }
    random_delay(rng, params.think_time_ms).await;

    let food = choose_food(rng.random_range(0..100), params.choose_pizza_prob);
    {
        let mut t = table.lock(LockSet::PHILOSOPHERS).await;
        let me = t.philosopher_mut(id);
        me.life_state = LifeState::Hungry;
        me.chosen_food = Some(food);
    }

    acquire_meal(table, id, params, food, bell, restocked).await;
    random_delay(rng, params.eat_time_ms).await;

    {
        let mut t = table.lock(LockSet::PHILOSOPHERS | LockSet::CUTLERY).await;
        let me = t.philosopher_mut(id);
        me.life_state = LifeState::Washing;
        me.chosen_food = None;
        me.meals_eaten += 1;
        let used = std::mem::replace(&mut me.held, EMPTY_HANDS);
        t.cutlery_mut().drop_dirty(&used);
    }
    // the sink just gained dirty cutlery; let the waiter know
    let _ = bell.send(Resource::Cutlery).await;
    random_delay(rng, params.wash_time_ms).await;
}

/// HUNGRY -> EATING: food portion and cutlery are committed together
/// under one compound lock, or not at all.
async fn acquire_meal(
    table: &Table,
    id: usize,
    params: &Parameters,
    food: Food,
    bell: &mpsc::Sender<Resource>,
    restocked: &broadcast::Sender<Resource>,
) {
    // Subscribe before checking stock so a restock between the failed check
    // and the wait cannot be missed.
    let mut restock_rx = restocked.subscribe();
    let needed = food.cutlery();

    loop {
        let mut missing = [None, None];
        let served = {
            let mut t = table
                .lock(LockSet::PHILOSOPHERS | food.lock_class() | LockSet::CUTLERY)
                .await;
            let stock_ok = t.stock_mut(food).portions > 0;
            let cutlery_ok = t.cutlery_mut().can_serve(&needed);
            if stock_ok && cutlery_ok {
                t.stock_mut(food).serve_one();
                t.cutlery_mut().take(&needed);
                let me = t.philosopher_mut(id);
                me.life_state = LifeState::Eating;
                me.held = needed;
                true
            } else {
                if !stock_ok {
                    missing[0] = Some(food.resource());
                }
                if !cutlery_ok {
                    missing[1] = Some(Resource::Cutlery);
                }
                false
            }
        };
        if served {
            return;
        }

        for need in missing.into_iter().flatten() {
            let _ = bell.send(need).await;
        }

        // Wait for a restock of something we are missing; give up after a
        // think-time beat and re-check anyway, as informal back-off.
        let backoff = Duration::from_millis(params.think_time_ms.max(1));
        let _ = timeout(backoff, async {
            loop {
                match restock_rx.recv().await {
                    Ok(resource) if missing.contains(&Some(resource)) => break,
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        })
        .await;
    }
}

async fn random_delay(rng: &mut StdRng, max_ms: u64) {
    if max_ms == 0 {
        return;
    }
    sleep(Duration::from_millis(rng.random_range(0..=max_ms))).await;
}
