use std::fmt::Write;
use std::sync::Arc;

use buffet::params::Parameters;
use buffet::philosopher::{Food, Held, LifeState, Philosopher};
use buffet::table::{Snapshot, Table};
use buffet::waiter::Activity;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

pub fn show_params(params: &Parameters) {
    println!();
    println!("Simulation parameters:");
    println!("  --num-philosophers: {}", params.num_philosophers);
    println!("  --min-life: {}", params.min_life);
    println!("  --max-life: {}", params.max_life);
    println!("  --num-forks: {}", params.num_forks);
    println!("  --num-knives: {}", params.num_knives);
    println!("  --pizza: {}", params.pizza_batch);
    println!("  --spaghetti: {}", params.spaghetti_batch);
    println!("  --think-time: {}", params.think_time_ms);
    println!("  --choose-pizza-prob: {}", params.choose_pizza_prob);
    println!("  --eat-time: {}", params.eat_time_ms);
    println!("  --wash-time: {}", params.wash_time_ms);
    println!();
}

fn life_glyph(state: LifeState) -> char {
    match state {
        LifeState::Born => 'B',
        LifeState::Thinking => 'T',
        LifeState::Hungry => 'H',
        LifeState::Eating => 'E',
        LifeState::Washing => 'W',
        LifeState::Dead => 'D',
    }
}

fn food_glyph(food: Option<Food>) -> char {
    match food {
        Some(Food::Pizza) => 'P',
        Some(Food::Spaghetti) => 'S',
        None => '-',
    }
}

fn held_glyph(held: Held) -> char {
    match held {
        Held::Fork => 'f',
        Held::Knife => 'k',
        Held::Nothing => '.',
    }
}

fn philosopher_cell(p: &Philosopher) -> String {
    format!(
        "{}{}{}{} {}/{}",
        life_glyph(p.life_state),
        food_glyph(p.chosen_food),
        held_glyph(p.held[0]),
        held_glyph(p.held[1]),
        p.meals_eaten,
        p.lifetime,
    )
}

fn activity_label(activity: Activity) -> &'static str {
    match activity {
        Activity::Idle => "idle",
        Activity::ServingPizza => "serving pizza",
        Activity::ServingSpaghetti => "serving spaghetti",
        Activity::WashingCutlery => "washing cutlery",
    }
}

/// One status line per snapshot: stocks, cutlery whereabouts, waiter
/// activity and a cell per philosopher (state, chosen food, held cutlery,
/// meals eaten over lifetime).
pub fn render(snap: &Snapshot) -> String {
    let mut line = String::new();
    let now = chrono::Local::now().format("%H:%M:%S%.3f");
    write!(
        line,
        "[{now}] pizza {:>3}  spaghetti {:>3}  forks {}c/{}d/{}w  knives {}c/{}d/{}w  waiter: {:<17}",
        snap.pizza.portions,
        snap.spaghetti.portions,
        snap.cutlery.clean_forks,
        snap.cutlery.dirty_forks,
        snap.cutlery.washing_forks,
        snap.cutlery.clean_knives,
        snap.cutlery.dirty_knives,
        snap.cutlery.washing_knives,
        activity_label(snap.waiter.activity),
    )
    .expect("writing to a string cannot fail");
    for p in &snap.philosophers {
        write!(line, " | {}", philosopher_cell(p)).expect("writing to a string cannot fail");
    }
    line
}

pub fn final_summary(snap: &Snapshot) -> String {
    let mut out = String::new();
    out.push_str("\nSimulation finished:\n");
    for (id, p) in snap.philosophers.iter().enumerate() {
        let _ = writeln!(
            out,
            "  philosopher {id}: {} meals in {} cycles",
            p.meals_eaten, p.lifetime
        );
    }
    let _ = writeln!(
        out,
        "  pizza: {} left, {} served, {} replenished",
        snap.pizza.portions, snap.pizza.consumed, snap.pizza.replenished
    );
    let _ = writeln!(
        out,
        "  spaghetti: {} left, {} served, {} replenished",
        snap.spaghetti.portions, snap.spaghetti.consumed, snap.spaghetti.replenished
    );
    out
}

/// Passive observer: periodically copies the shared state and prints it.
/// Uses the staleness-tolerant snapshot so it can never hold up or
/// deadlock the simulation.
pub fn spawn_display(table: Arc<Table>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            let snap = table.snapshot().await;
            println!("{}", render(&snap));
        }
    })
}
