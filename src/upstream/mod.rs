pub mod client;
pub mod model;

pub use client::UpstreamClient;
pub use model::UpstreamResponse;
