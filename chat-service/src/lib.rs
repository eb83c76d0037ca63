//! chat-service: relays chat prompts to Gemini and optionally records each
//! prompt/reply exchange in MongoDB.

pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
