mod model;

pub mod avatars;
pub mod services;

pub use model::User;
