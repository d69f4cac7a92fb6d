/// Clipdrop shared crate.
///
/// Data model, error taxonomy, locator classification, variant catalog
/// reduction and selection, and the client-local history ledger.
pub mod catalog;
pub mod db;
pub mod errors;
pub mod history;
pub mod locator;
pub mod models;
pub mod selector;
