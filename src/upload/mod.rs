pub mod pipeline;
pub mod preview;

pub use pipeline::{
    validate, FilePipeline, IncomingFile, StagedFile, ACCEPTED_TYPES, MAX_UPLOAD_BYTES,
};
pub use preview::render_preview;
