use std::ops::BitOr;

use tokio::sync::{Mutex, MutexGuard};

use crate::params::Parameters;
use crate::philosopher::{Food, Held, Philosopher};
use crate::waiter::WaiterState;

/// Selection of table partitions to lock in one request. Compound
/// requests are granted in the fixed order philosophers, pizza,
/// spaghetti, cutlery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockSet(u8);

impl LockSet {
    pub const PHILOSOPHERS: LockSet = LockSet(0b0001);
    pub const PIZZA: LockSet = LockSet(0b0010);
    pub const SPAGHETTI: LockSet = LockSet(0b0100);
    pub const CUTLERY: LockSet = LockSet(0b1000);
    pub const ALL: LockSet = LockSet(0b1111);

    pub fn contains(self, other: LockSet) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for LockSet {
    type Output = LockSet;

    fn bitor(self, rhs: LockSet) -> LockSet {
        LockSet(self.0 | rhs.0)
    }
}

/// The three things a philosopher can run out of; the vocabulary of the
/// bell and restock channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Pizza,
    Spaghetti,
    Cutlery,
}

/// One food type's stock; `initial + replenished == portions + consumed`.
#[derive(Debug, Clone)]
pub struct FoodStock {
    pub portions: u32,
    pub consumed: u32,
    pub replenished: u32,
}

impl FoodStock {
    pub fn new(initial: u32) -> FoodStock {
        FoodStock {
            portions: initial,
            consumed: 0,
            replenished: 0,
        }
    }

    pub fn serve_one(&mut self) {
        assert!(self.portions > 0, "served a portion that was not in stock");
        self.portions -= 1;
        self.consumed += 1;
    }

    pub fn replenish(&mut self, batch: u32) {
        self.portions += batch;
        self.replenished += batch;
    }
}

/// Every fork and knife is in exactly one place: clean, held, dirty in
/// the sink, or being washed.
#[derive(Debug, Clone)]
pub struct CutleryRack {
    pub clean_forks: u32,
    pub clean_knives: u32,
    pub dirty_forks: u32,
    pub dirty_knives: u32,
    pub washing_forks: u32,
    pub washing_knives: u32,
    pub total_forks: u32,
    pub total_knives: u32,
}

impl CutleryRack {
    pub fn new(forks: u32, knives: u32) -> CutleryRack {
        CutleryRack {
            clean_forks: forks,
            clean_knives: knives,
            dirty_forks: 0,
            dirty_knives: 0,
            washing_forks: 0,
            washing_knives: 0,
            total_forks: forks,
            total_knives: knives,
        }
    }

    fn count_needed(pieces: &[Held; 2]) -> (u32, u32) {
        let mut forks = 0;
        let mut knives = 0;
        for piece in pieces {
            match piece {
                Held::Fork => forks += 1,
                Held::Knife => knives += 1,
                Held::Nothing => {}
            }
        }
        (forks, knives)
    }

    pub fn can_serve(&self, pieces: &[Held; 2]) -> bool {
        let (forks, knives) = Self::count_needed(pieces);
        self.clean_forks >= forks && self.clean_knives >= knives
    }

    pub fn take(&mut self, pieces: &[Held; 2]) {
        let (forks, knives) = Self::count_needed(pieces);
        assert!(
            self.clean_forks >= forks && self.clean_knives >= knives,
            "took cutlery that was not clean"
        );
        self.clean_forks -= forks;
        self.clean_knives -= knives;
    }

    pub fn drop_dirty(&mut self, pieces: &[Held; 2]) {
        let (forks, knives) = Self::count_needed(pieces);
        self.dirty_forks += forks;
        self.dirty_knives += knives;
    }

    pub fn start_washing(&mut self) -> (u32, u32) {
        let forks = self.dirty_forks;
        let knives = self.dirty_knives;
        self.dirty_forks = 0;
        self.dirty_knives = 0;
        self.washing_forks += forks;
        self.washing_knives += knives;
        (forks, knives)
    }

    pub fn finish_washing(&mut self, forks: u32, knives: u32) {
        assert!(
            self.washing_forks >= forks && self.washing_knives >= knives,
            "finished washing cutlery that was never picked up"
        );
        self.washing_forks -= forks;
        self.washing_knives -= knives;
        self.clean_forks += forks;
        self.clean_knives += knives;
    }

    pub fn held_forks(&self) -> u32 {
        self.total_forks - self.clean_forks - self.dirty_forks - self.washing_forks
    }

    pub fn held_knives(&self) -> u32 {
        self.total_knives - self.clean_knives - self.dirty_knives - self.washing_knives
    }
}

/// The shared dining room; each field is an independently lockable
/// partition.
pub struct Table {
    philosophers: Mutex<Vec<Philosopher>>,
    pizza: Mutex<FoodStock>,
    spaghetti: Mutex<FoodStock>,
    cutlery: Mutex<CutleryRack>,
    // Written only by the waiter task, read by snapshots.
    waiter: Mutex<WaiterState>,
}

/// Access to the partitions named in the `lock()` request; unrequested
/// slots stay `None`. Dropping the guard unlocks everything it holds.
pub struct TableGuard<'a> {
    pub philosophers: Option<MutexGuard<'a, Vec<Philosopher>>>,
    pub pizza: Option<MutexGuard<'a, FoodStock>>,
    pub spaghetti: Option<MutexGuard<'a, FoodStock>>,
    pub cutlery: Option<MutexGuard<'a, CutleryRack>>,
}

impl<'a> TableGuard<'a> {
    pub fn philosopher_mut(&mut self, id: usize) -> &mut Philosopher {
        &mut self
            .philosophers
            .as_mut()
            .expect("philosopher partition was not locked")[id]
    }

    pub fn stock_mut(&mut self, food: Food) -> &mut FoodStock {
        let slot = match food {
            Food::Pizza => &mut self.pizza,
            Food::Spaghetti => &mut self.spaghetti,
        };
        slot.as_mut().expect("food stock partition was not locked")
    }

    pub fn cutlery_mut(&mut self) -> &mut CutleryRack {
        self.cutlery
            .as_mut()
            .expect("cutlery partition was not locked")
    }
}

impl Table {
    pub fn new(params: &Parameters) -> Table {
        let philosophers = (0..params.num_philosophers)
            .map(|_| Philosopher::new())
            .collect();
        Table {
            philosophers: Mutex::new(philosophers),
            pizza: Mutex::new(FoodStock::new(params.pizza_batch)),
            spaghetti: Mutex::new(FoodStock::new(params.spaghetti_batch)),
            cutlery: Mutex::new(CutleryRack::new(params.num_forks, params.num_knives)),
            waiter: Mutex::new(WaiterState::new()),
        }
    }

    /// Locks the requested partitions in the fixed global order. Callers
    /// must not hold the guard across a think/eat/wash delay.
    pub async fn lock(&self, classes: LockSet) -> TableGuard<'_> {
        TableGuard {
            philosophers: if classes.contains(LockSet::PHILOSOPHERS) {
                Some(self.philosophers.lock().await)
            } else {
                None
            },
            pizza: if classes.contains(LockSet::PIZZA) {
                Some(self.pizza.lock().await)
            } else {
                None
            },
            spaghetti: if classes.contains(LockSet::SPAGHETTI) {
                Some(self.spaghetti.lock().await)
            } else {
                None
            },
            cutlery: if classes.contains(LockSet::CUTLERY) {
                Some(self.cutlery.lock().await)
            } else {
                None
            },
        }
    }

    pub async fn waiter_state(&self) -> MutexGuard<'_, WaiterState> {
        self.waiter.lock().await
    }

    /// Copy for display. Partitions are locked one at a time, so the copy
    /// may be mutually stale but can never join a lock cycle.
    pub async fn snapshot(&self) -> Snapshot {
        Snapshot {
            philosophers: self.philosophers.lock().await.clone(),
            pizza: self.pizza.lock().await.clone(),
            spaghetti: self.spaghetti.lock().await.clone(),
            cutlery: self.cutlery.lock().await.clone(),
            waiter: self.waiter.lock().await.clone(),
        }
    }

    /// Consistent copy of all partitions, taken under the full lock set so
    /// it observes one single instant. Follows the global lock order.
    pub async fn audit(&self) -> Snapshot {
        let guard = self.lock(LockSet::ALL).await;
        Snapshot {
            philosophers: guard
                .philosophers
                .as_deref()
                .expect("all partitions locked")
                .clone(),
            pizza: guard.pizza.as_deref().expect("all partitions locked").clone(),
            spaghetti: guard
                .spaghetti
                .as_deref()
                .expect("all partitions locked")
                .clone(),
            cutlery: guard.cutlery.as_deref().expect("all partitions locked").clone(),
            waiter: self.waiter.lock().await.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub philosophers: Vec<Philosopher>,
    pub pizza: FoodStock,
    pub spaghetti: FoodStock,
    pub cutlery: CutleryRack,
    pub waiter: WaiterState,
}
