//! Interactive terminal browser

mod app;
mod card_worker;
mod events;
mod screens;
mod ui;

pub use app::run_tui;
