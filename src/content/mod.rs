pub mod classifier;
pub mod templates;

pub use classifier::{classify, ContentInfo, ContentType};
