pub mod app;
pub mod catalog;
pub mod library;
pub mod storage;
pub mod store;
pub mod user_state;
