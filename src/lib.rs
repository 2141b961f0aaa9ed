//! Portfolio site backend — lead-capture chat, intake forms and site content.

pub mod auth;
pub mod chat;
pub mod config;
pub mod content;
pub mod error;
pub mod leads;
pub mod notify;
pub mod server;
pub mod store;
