pub mod connection;
pub mod migrations;
pub mod sessions;

pub use connection::{connect_with_settings, DbPool};
pub use sessions::{
    InMemorySessionRepository, RepositoryError, SessionRepository, SqlSessionRepository,
};
