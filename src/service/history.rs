use log::info;
use reqwest::Method;

use super::http::ServiceHttp;
use super::types::{HistoryReply, MessageReply, StatsReply};
use crate::error::ScanResult;
use crate::models::{HistoryRecord, HistoryStats};

pub const DEFAULT_HISTORY_LIMIT: u32 = 50;
const MAX_HISTORY_LIMIT: u32 = 200;

/// Read/write access to the remote scan/generate history.
#[derive(Clone)]
pub struct HistoryClient {
    http: ServiceHttp,
}

impl HistoryClient {
    pub fn new(http: ServiceHttp) -> Self {
        Self { http }
    }

    pub async fn list(&self, limit: u32) -> ScanResult<Vec<HistoryRecord>> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        let reply: HistoryReply = self
            .http
            .call(Method::GET, &format!("history?limit={limit}"))
            .await?;
        Ok(reply.history)
    }

    pub async fn delete(&self, id: i64) -> ScanResult<()> {
        let _: MessageReply = self
            .http
            .call(Method::DELETE, &format!("history/{id}"))
            .await?;
        info!("deleted history record {id}");
        Ok(())
    }

    /// Returns the service's confirmation message.
    pub async fn clear(&self) -> ScanResult<String> {
        let reply: MessageReply = self.http.call(Method::DELETE, "history/clear").await?;
        let message = reply.message.unwrap_or_else(|| "History cleared".into());
        info!("{message}");
        Ok(message)
    }

    pub async fn stats(&self) -> ScanResult<HistoryStats> {
        let reply: StatsReply = self.http.call(Method::GET, "history/stats").await?;
        Ok(reply.stats)
    }
}
