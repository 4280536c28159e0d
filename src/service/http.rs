use std::time::Duration;

use reqwest::{multipart, Method, Response};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::{ScanError, ScanResult};
use crate::settings::ServiceSettings;

/// Shared HTTP plumbing for the recognition and history endpoints.
///
/// Every call is attempted exactly once; the caller decides whether a failure
/// is worth retrying.
#[derive(Clone)]
pub struct ServiceHttp {
    client: reqwest::Client,
    base_url: String,
}

impl ServiceHttp {
    pub fn new(settings: &ServiceSettings) -> ScanResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|err| ScanError::service(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> ScanResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self.client.post(self.url(path)).json(body).send().await?;
        read_envelope(resp).await
    }

    pub async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: multipart::Form,
    ) -> ScanResult<T> {
        let resp = self
            .client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await?;
        read_envelope(resp).await
    }

    pub async fn call<T: DeserializeOwned>(&self, method: Method, path: &str) -> ScanResult<T> {
        let resp = self.client.request(method, self.url(path)).send().await?;
        read_envelope(resp).await
    }
}

/// Folds non-2xx statuses and `{success: false}` bodies into one error path.
pub(crate) async fn read_envelope<T: DeserializeOwned>(resp: Response) -> ScanResult<T> {
    let status = resp.status();
    let body = resp.text().await?;
    let value: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    let service_message = value
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string);

    if !status.is_success() {
        return Err(ScanError::RecognitionService(service_message.unwrap_or_else(
            || format!("HTTP error! status: {}", status.as_u16()),
        )));
    }

    if value.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(ScanError::RecognitionService(
            service_message.unwrap_or_else(|| "request was not successful".into()),
        ));
    }

    serde_json::from_value(value)
        .map_err(|err| ScanError::service(format!("malformed service response: {err}")))
}
