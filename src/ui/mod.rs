pub mod app;
pub mod components;
pub mod forms;
pub mod format;
pub mod state;

pub use app::ChatApp;
