pub mod cache;
pub mod models;
pub mod service;
pub mod sources;
pub mod transform;

pub use models::{Attendee, CalendarData, Meeting, Organizer, ResponseStatus};
pub use service::CalendarService;
