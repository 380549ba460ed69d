use std::env;
use std::process::exit;

use buffet::simulation::Simulation;
use rand::Rng;
use tokio::time::Duration;

use crate::args::Cli;
use crate::console_input::console_input_thread;

mod args;
mod console_input;
mod display;

const DISPLAY_PERIOD: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() {
    let argv: Vec<String> = env::args().collect();
    let config = match args::parse(&argv[1..]) {
        Ok(Cli::Help) => {
            println!("{}", args::usage(&argv[0]));
            return;
        }
        Ok(Cli::Run(config)) => config,
        Err(e) => {
            eprintln!("ERROR: {e}");
            println!("{}", args::usage(&argv[0]));
            exit(1);
        }
    };

    display::show_params(&config.params);

    let mut sim = match Simulation::new(config.params) {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("ERROR: {e}");
            exit(1);
        }
    };

    println!("<press RETURN>");
    let mut console = console_input_thread();
    let _ = console.recv().await;

    let seed = config.seed.unwrap_or_else(|| rand::rng().random());
    println!("running with seed {seed}");

    let observer = display::spawn_display(sim.table(), DISPLAY_PERIOD);
    let result = sim.run(seed).await;
    observer.abort();

    let snap = sim.snapshot().await;
    println!("{}", display::render(&snap));
    print!("{}", display::final_summary(&snap));

    if let Err(e) = result {
        eprintln!("ERROR: {e}");
        exit(1);
    }
}
