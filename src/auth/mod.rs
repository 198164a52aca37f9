pub mod session;
pub mod tokens;

pub use session::{Session, SessionUser};
pub use tokens::StoredToken;
