pub mod chat;
pub mod common;
pub mod config;
pub mod error;
pub mod gateway;
pub mod session;
pub mod storage;
pub mod ui;
