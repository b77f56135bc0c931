pub mod timers;

pub use timers::{TimerQueue, TimerToken};
