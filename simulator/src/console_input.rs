use std::io::stdin;
use std::thread;

use tokio::sync::mpsc::{self, Receiver};

/// Blocking stdin reads happen on their own OS thread so the simulation's
/// runtime is never stalled by the console.
pub fn console_input_thread() -> Receiver<String> {
    let (sender, receiver) = mpsc::channel(100);
    thread::spawn(move || pollster::block_on(console_input_loop(sender)));
    receiver
}

pub async fn console_input_loop(sender: mpsc::Sender<String>) {
    loop {
        let mut input = String::new();
        if stdin().read_line(&mut input).is_err() {
            break;
        }
        if sender.send(input).await.is_err() {
            break;
        }
    }
}
