pub mod derive;
pub mod document;
pub mod handlers;
pub mod store;

#[cfg(test)]
mod tests;

pub use derive::{derive_invoice, InvoiceDetails};
pub use document::render_document;
