pub mod history;
pub mod scan;

pub use history::{HistoryFilter, HistoryRecord, HistoryStats, RecordData, RecordKind};
pub use scan::{ClassifiedContent, DecodedPayload, Position, ResultSet, ScanMethod};
