//! Domain models for the chat service.

pub mod exchange;

pub use exchange::ChatExchange;
