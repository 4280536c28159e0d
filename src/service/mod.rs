pub mod client;
pub mod history;
pub mod http;
pub mod types;

pub use client::{RecognitionClient, Recognizer};
pub use history::HistoryClient;
pub use http::ServiceHttp;
pub use types::{
    ErrorCorrection, GenerateOptions, GeneratedCode, ImagePayload, RecognitionRequest,
};
