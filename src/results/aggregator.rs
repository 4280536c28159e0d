use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use crate::content::classify;
use crate::models::{ClassifiedContent, DecodedPayload, Position, ResultSet, ScanMethod};

/// Classifies every payload of one submission, keeping the service order.
///
/// A payload that repeats both the content and the position of an earlier one
/// is the same symbol reported twice and is dropped.
pub fn aggregate(payloads: Vec<DecodedPayload>, method: ScanMethod) -> ResultSet {
    let mut seen: HashSet<(String, Position)> = HashSet::with_capacity(payloads.len());
    let mut items = Vec::with_capacity(payloads.len());

    for payload in payloads {
        if !seen.insert((payload.data.clone(), payload.position)) {
            log::debug!("dropping duplicate payload at {:?}", payload.position);
            continue;
        }
        let info = classify(&payload.data);
        items.push(ClassifiedContent {
            data: payload.data,
            position: payload.position,
            content_type: info.content_type,
            description: info.description,
        });
    }

    ResultSet {
        id: Uuid::new_v4().to_string(),
        method,
        produced_at: Utc::now(),
        items,
    }
}
