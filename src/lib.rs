// Library root
// -----------
// This crate exposes a small library surface for the CLI. The binary
// (`main.rs`) parses flags, logs in and hands the client to the menu loop.
//
// Module responsibilities:
// - `api`: blocking HTTP client for the Venmo REST API (login with SMS
//   two-factor, users, friends, payment methods, payments, logout).
// - `config`: command-line flags and environment fallbacks.
// - `credentials`: the saved login file.
// - `device`: random device identifiers.
// - `error`: typed errors for the API and credential layers.
// - `menu`: numbered option menus.
// - `models`: request/response data shapes.
// - `ui`: the interactive flows that drive `api`.
pub mod api;
pub mod config;
pub mod credentials;
pub mod device;
pub mod error;
pub mod menu;
pub mod models;
pub mod ui;
