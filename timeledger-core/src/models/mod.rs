pub mod client;
pub mod invoice;
pub mod lead;
pub mod session;

pub use client::Client;
pub use invoice::Invoice;
pub use lead::{Funnel, Lead};
pub use session::Session;
