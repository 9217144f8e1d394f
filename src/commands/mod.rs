// Reconciliation commands
pub mod declarative;

// API helpers
pub mod webhook;
pub mod workflows;
