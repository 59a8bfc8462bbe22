//! Local server for searching scientific papers and saving them with PDFs
//! and citations.
//!
//! The crate splits into the provider adapters ([`apis`]), the HTTP surface
//! ([`server`]), on-disk persistence for saved articles ([`store`]), runtime
//! configuration ([`config`]), and the PDF viewer state machine that frontends
//! drive ([`viewer`]).

pub mod apis;
pub mod config;
pub mod server;
pub mod store;
pub mod viewer;
