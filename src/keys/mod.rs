pub mod model;
pub mod registry;

pub use model::{ApiConsumer, ApiKeyRecord, NewApiKey};
pub use registry::KeyRegistry;
