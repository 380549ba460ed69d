pub mod params;
pub mod philosopher;
pub mod simulation;
pub mod table;
pub mod waiter;
