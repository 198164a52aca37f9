//! Client for the third-party connector service that brokers Google
//! Calendar access

mod client;
pub mod shapes;

pub use client::{ComposioClient, LIST_EVENTS_ACTION};
pub use shapes::ConnectedAccount;
