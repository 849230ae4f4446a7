//! The booking, cancel, and inventory-update consumers (C6, C7, C8).
//!
//! Each consumer is a thin [`MessageHandler`] implementation — the state
//! machine logic in [`booking`], [`cancel`], and [`inventory`] — driven by a
//! shared [`runner::ConsumerRunner`] that owns the subscribe/process/commit
//! loop and graceful shutdown, the same split the teacher draws between its
//! `EventHandler` trait and its generic `EventConsumer`.

pub mod booking;
pub mod cancel;
pub mod config;
pub mod inventory;
pub mod outcome;
pub mod resilience;
pub mod runner;

pub use booking::BookingConsumer;
pub use cancel::CancelConsumer;
pub use config::Config;
pub use inventory::InventoryUpdateConsumer;
pub use outcome::ProcessingOutcome;
pub use runner::{ConsumerRunner, MessageHandler};
