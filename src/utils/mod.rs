//! Utility functions and helpers

pub mod data_loader;
pub mod timer;

pub use data_loader::{credit_card_columns, DataLoader, PreparationSummary, PreparedDataset};
pub use timer::Timer;
