pub mod api;
pub mod auth;
pub mod calendar;
pub mod cli;
pub mod composio;
pub mod core;
pub mod google;
pub mod jobs;
pub mod summary;
