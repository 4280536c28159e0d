use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::scan::ScanMethod;
use crate::content::ContentInfo;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Scan,
    Generate,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RecordData {
    #[serde(default)]
    pub qr_info: Option<ContentInfo>,
    #[serde(default)]
    pub method: Option<ScanMethod>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub content: String,
    pub timestamp: String,
    #[serde(default)]
    pub data: Option<RecordData>,
}

impl HistoryRecord {
    /// Accepts RFC 3339 as well as the bare `YYYY-MM-DD HH:MM:SS` UTC form
    /// some history backends emit.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(&self.timestamp) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn method(&self) -> ScanMethod {
        self.data
            .as_ref()
            .and_then(|d| d.method)
            .unwrap_or(ScanMethod::Unknown)
    }

    pub fn content_info(&self) -> Option<&ContentInfo> {
        self.data.as_ref().and_then(|d| d.qr_info.as_ref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryFilter {
    #[default]
    All,
    Only(RecordKind),
}

impl HistoryFilter {
    pub fn matches(&self, record: &HistoryRecord) -> bool {
        match self {
            HistoryFilter::All => true,
            HistoryFilter::Only(kind) => record.kind == *kind,
        }
    }

    pub fn apply<'a>(&self, records: &'a [HistoryRecord]) -> Vec<&'a HistoryRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct HistoryStats {
    pub total_records: u64,
    pub scans: u64,
    pub generations: u64,
    #[serde(default)]
    pub methods: HashMap<String, u64>,
    #[serde(default)]
    pub content_types: HashMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: serde_json::Value) -> HistoryRecord {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn parses_backend_record() {
        let rec = record(serde_json::json!({
            "id": 7,
            "type": "scan",
            "content": "https://example.com",
            "timestamp": "2026-01-02 03:04:05",
            "data": {
                "method": "camera_capture",
                "qr_info": {"type": "url", "description": "Website URL"},
                "position": {"width": 10, "height": 10}
            }
        }));
        assert_eq!(rec.kind, RecordKind::Scan);
        assert_eq!(rec.method(), ScanMethod::CameraCapture);
        assert_eq!(
            rec.content_info().map(|i| i.content_type),
            Some(crate::content::ContentType::Url)
        );
        assert!(rec.data.unwrap().extra.contains_key("position"));
    }

    #[test]
    fn timestamp_accepts_both_layouts() {
        let mut rec = record(serde_json::json!({
            "id": 1, "type": "generate", "content": "x",
            "timestamp": "2026-01-02T03:04:05Z"
        }));
        let iso = rec.timestamp().unwrap();
        rec.timestamp = "2026-01-02 03:04:05".into();
        assert_eq!(rec.timestamp(), Some(iso));
        rec.timestamp = "yesterday".into();
        assert!(rec.timestamp().is_none());
    }

    #[test]
    fn unknown_method_and_missing_data() {
        let rec = record(serde_json::json!({
            "id": 2, "type": "scan", "content": "x",
            "timestamp": "2026-01-02 03:04:05",
            "data": {"method": "carrier_pigeon"}
        }));
        assert_eq!(rec.method(), ScanMethod::Unknown);

        let bare = record(serde_json::json!({
            "id": 3, "type": "scan", "content": "x", "timestamp": "t"
        }));
        assert_eq!(bare.method(), ScanMethod::Unknown);
        assert!(bare.content_info().is_none());
    }

    #[test]
    fn filter_by_kind() {
        let records = vec![
            record(serde_json::json!({"id": 1, "type": "scan", "content": "a", "timestamp": "t"})),
            record(serde_json::json!({"id": 2, "type": "generate", "content": "b", "timestamp": "t"})),
            record(serde_json::json!({"id": 3, "type": "scan", "content": "c", "timestamp": "t"})),
        ];
        assert_eq!(HistoryFilter::All.apply(&records).len(), 3);
        let scans = HistoryFilter::Only(RecordKind::Scan).apply(&records);
        assert_eq!(scans.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3]);
    }
}
