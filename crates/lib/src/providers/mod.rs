pub mod ai;
pub mod factory;

pub use factory::{create_ai_provider, create_image_provider, ProviderKind, ProviderSettings};
