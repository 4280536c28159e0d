use async_trait::async_trait;
use log::{debug, info};
use reqwest::multipart::{Form, Part};

use super::http::ServiceHttp;
use super::types::{
    data_url, GenerateBody, GenerateOptions, GenerateReply, GeneratedCode, ImagePayload,
    InfoReply, RecognitionRequest, ScanReply,
};
use crate::content::ContentInfo;
use crate::error::{ScanError, ScanResult};
use crate::models::DecodedPayload;

/// Anything that can turn an image into decoded payloads.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, request: &RecognitionRequest) -> ScanResult<Vec<DecodedPayload>>;
}

/// Adapter over the remote recognition and generation service.
#[derive(Clone)]
pub struct RecognitionClient {
    http: ServiceHttp,
}

impl RecognitionClient {
    pub fn new(http: ServiceHttp) -> Self {
        Self { http }
    }

    pub async fn recognize(
        &self,
        request: &RecognitionRequest,
    ) -> ScanResult<Vec<DecodedPayload>> {
        debug!("submitting {} byte image", request.image.len());
        let reply: ScanReply = match &request.image {
            ImagePayload::Frame { png } => {
                let body = serde_json::json!({ "image": data_url("image/png", png) });
                self.http.post_json("scan/data", &body).await?
            }
            ImagePayload::File {
                file_name,
                media_type,
                bytes,
            } => {
                let part = Part::bytes(bytes.as_ref().clone())
                    .file_name(file_name.clone())
                    .mime_str(media_type)
                    .map_err(|err| ScanError::InvalidType(format!("{media_type}: {err}")))?;
                self.http
                    .post_form("scan/file", Form::new().part("file", part))
                    .await?
            }
        };

        if request.interactive {
            info!("recognition returned {} payload(s)", reply.results.len());
        } else {
            debug!("background recognition returned {} payload(s)", reply.results.len());
        }
        Ok(reply.results)
    }

    /// Encoding happens remotely; options are passed through unchecked.
    pub async fn generate(&self, text: &str, options: &GenerateOptions) -> ScanResult<GeneratedCode> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ScanError::EmptyText);
        }

        let reply: GenerateReply = self
            .http
            .post_json("generate", &GenerateBody { text, options })
            .await?;
        info!(
            "generated {}x{} code for {} chars",
            reply.qr_code.size[0],
            reply.qr_code.size[1],
            text.len()
        );
        Ok(reply.qr_code)
    }

    /// Server-side classification, the counterpart of
    /// [`crate::content::classify`].
    pub async fn describe(&self, text: &str) -> ScanResult<ContentInfo> {
        let reply: InfoReply = self
            .http
            .post_json("info", &serde_json::json!({ "text": text }))
            .await?;
        Ok(reply.info)
    }
}

#[async_trait]
impl Recognizer for RecognitionClient {
    async fn recognize(&self, request: &RecognitionRequest) -> ScanResult<Vec<DecodedPayload>> {
        RecognitionClient::recognize(self, request).await
    }
}
