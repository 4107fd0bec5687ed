//! Application core for a recipe-sharing app: typed entities over a
//! loosely-typed remote document store, the feed/favourites
//! synchronization logic, and the post/profile mutation workflows.
//! Screens render on top of this crate; they own the state objects
//! (`Feed`, `PostComposer`, `AvatarCache`) and drive them from UI events.

pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod posts;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod users;

pub use error::Error;
pub use state::AppState;
