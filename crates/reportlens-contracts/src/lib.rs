pub mod chat;
pub mod errors;
pub mod events;
pub mod identity;
pub mod prefs;
pub mod report;
pub mod session;
pub mod view;
