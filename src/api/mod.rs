mod extract;
pub mod routes;
mod server;
pub use server::{app, serve};
pub mod public;
mod state;
pub use extract::{CurrentUser, current_session};
pub use state::AppState;
