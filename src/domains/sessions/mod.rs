pub mod entity;
pub mod lifecycle;
pub mod repository;
pub mod service;
pub mod utils;

pub use entity::{EnrichedSession, Session, SessionState};
pub use lifecycle::bootstrapper::WorkingCopy;
pub use repository::{FileSessionStore, SessionStore};
pub use service::{SessionCreationParams, SessionManager};
