//! Application services: routing, dispatch, resolution and the mutation pipeline.

pub mod articles;
pub mod auth;
pub mod comments;
pub mod dispatch;
pub mod error;
pub mod markup;
pub mod properties;
pub mod repos;
pub mod resolver;
pub mod routing;
pub mod syndication;
