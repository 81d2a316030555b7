pub mod handlers;
pub mod sessions;
pub mod store;
pub mod timer;


pub use sessions::{create_manual, edit_session, start_pending, start_timer, stop_timer};
pub use timer::{spawn_ticker, TimerEngine};
