//! Procurement and sales reporting over published spreadsheet exports.
//!
//! Data flows one way: [`loader`] fetches CSV text (direct, then relays),
//! [`parser`] turns it into header-keyed rows, [`clean`] and [`sales`]
//! normalize those rows, and the view modules ([`reports`], [`trends`],
//! [`inventory`]) aggregate and sort them for [`output`].
pub mod aggregate;
pub mod clean;
pub mod config;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod inventory;
pub mod loader;
pub mod output;
pub mod parser;
pub mod reports;
pub mod sales;
pub mod session;
pub mod sort;
pub mod trends;
pub mod types;
pub mod util;
