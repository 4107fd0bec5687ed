mod model;

pub mod feed;
pub mod services;

pub use model::Post;
