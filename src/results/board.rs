use std::sync::Arc;

use tokio::sync::Mutex;

use super::aggregate;
use crate::error::ScanResult;
use crate::events::{AppEvent, EventBus};
use crate::models::{ResultSet, ScanMethod};
use crate::service::{RecognitionRequest, Recognizer};

/// Ticket handed out when an interactive request is issued. Only the newest
/// ticket may publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

struct BoardState {
    issued: u64,
    current: Option<ResultSet>,
}

/// Presentation-side holder of the current result set.
#[derive(Clone)]
pub struct ResultBoard {
    inner: Arc<Mutex<BoardState>>,
    events: EventBus,
}

impl ResultBoard {
    pub fn new(events: EventBus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BoardState {
                issued: 0,
                current: None,
            })),
            events,
        }
    }

    /// Starts an interactive request: hides whatever is shown and makes every
    /// older ticket stale.
    pub async fn begin_interactive(&self) -> Ticket {
        let ticket = {
            let mut state = self.inner.lock().await;
            state.issued += 1;
            state.current = None;
            Ticket(state.issued)
        };
        self.events.emit(AppEvent::ResultsCleared);
        ticket
    }

    /// Returns false when a newer interactive request superseded this one.
    pub async fn publish(&self, ticket: Ticket, results: ResultSet) -> bool {
        {
            let mut state = self.inner.lock().await;
            if ticket.0 != state.issued {
                log::debug!(
                    "discarding stale result set {} (ticket {}, newest {})",
                    results.id,
                    ticket.0,
                    state.issued
                );
                return false;
            }
            state.current = Some(results.clone());
        }
        self.events.emit(AppEvent::ResultsUpdated { results });
        true
    }

    /// Whether no newer interactive request has been issued since `ticket`.
    pub async fn is_current(&self, ticket: Ticket) -> bool {
        self.inner.lock().await.issued == ticket.0
    }

    /// Background detections are first-wins at the sampler and always shown.
    pub async fn publish_detection(&self, results: ResultSet) {
        self.inner.lock().await.current = Some(results.clone());
        self.events.emit(AppEvent::ResultsUpdated { results });
    }

    /// Interactive round trip shared by manual capture and file submission:
    /// clear, recognize, then publish if still the newest request.
    ///
    /// An empty result is reported through `no-codes-found` and leaves the
    /// board cleared; a failure is reported through `scan-failed` and returned.
    /// Neither is reported once a newer request has been issued.
    pub async fn submit(
        &self,
        recognizer: &dyn Recognizer,
        request: RecognitionRequest,
        method: ScanMethod,
    ) -> ScanResult<ResultSet> {
        let ticket = self.begin_interactive().await;

        let payloads = match recognizer.recognize(&request).await {
            Ok(payloads) => payloads,
            Err(err) => {
                if self.is_current(ticket).await {
                    log::warn!("{} failed: {err}", method.label());
                    self.events.emit(AppEvent::ScanFailed {
                        message: err.to_string(),
                    });
                } else {
                    log::debug!("superseded {} failed: {err}", method.label());
                }
                return Err(err);
            }
        };

        let results = aggregate(payloads, method);
        if results.is_empty() {
            if self.is_current(ticket).await {
                self.events.emit(AppEvent::NoCodesFound);
            } else {
                log::debug!("superseded {} found no codes", method.label());
            }
        } else if self.publish(ticket, results.clone()).await {
            self.events.emit(AppEvent::CodeDetected {
                count: results.len(),
            });
        }
        Ok(results)
    }

    pub async fn clear(&self) {
        let had_results = self.inner.lock().await.current.take().is_some();
        if had_results {
            self.events.emit(AppEvent::ResultsCleared);
        }
    }

    pub async fn current(&self) -> Option<ResultSet> {
        self.inner.lock().await.current.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::error::ScanError;
    use crate::models::{DecodedPayload, Position};
    use crate::service::ImagePayload;
    use crate::test_support::{DelayedRecognizer, ScriptedRecognizer};

    fn file_request() -> RecognitionRequest {
        RecognitionRequest::interactive(ImagePayload::File {
            file_name: "codes.png".into(),
            media_type: "image/png".into(),
            bytes: Arc::new(vec![1, 2, 3]),
        })
    }

    fn set(data: &str) -> ResultSet {
        aggregate(
            vec![DecodedPayload::new(data, Position::sized(10, 10))],
            ScanMethod::FileUpload,
        )
    }

    #[tokio::test]
    async fn newest_ticket_publishes() {
        let board = ResultBoard::new(EventBus::new());
        let ticket = board.begin_interactive().await;
        assert!(board.publish(ticket, set("a")).await);
        assert_eq!(board.current().await.unwrap().items[0].data, "a");
    }

    #[tokio::test]
    async fn stale_ticket_is_rejected() {
        let board = ResultBoard::new(EventBus::new());
        let older = board.begin_interactive().await;
        let newer = board.begin_interactive().await;
        assert!(board.publish(newer, set("new")).await);
        assert!(!board.publish(older, set("old")).await);
        assert_eq!(board.current().await.unwrap().items[0].data, "new");
    }

    #[tokio::test]
    async fn begin_hides_previous_results() {
        let events = EventBus::new();
        let board = ResultBoard::new(events.clone());
        board.publish_detection(set("bg")).await;
        let mut rx = events.subscribe();
        let _ticket = board.begin_interactive().await;
        assert!(board.current().await.is_none());
        assert_eq!(rx.recv().await.unwrap().name(), "results-cleared");
    }

    #[tokio::test]
    async fn submit_reports_empty_result() {
        let events = EventBus::new();
        let board = ResultBoard::new(events.clone());
        let recognizer = ScriptedRecognizer::new();
        let mut rx = events.subscribe();

        let results = board
            .submit(&recognizer, file_request(), ScanMethod::FileUpload)
            .await
            .unwrap();

        assert!(results.is_empty());
        assert!(board.current().await.is_none());
        assert_eq!(rx.recv().await.unwrap().name(), "results-cleared");
        assert_eq!(rx.recv().await.unwrap().name(), "no-codes-found");
    }

    #[tokio::test]
    async fn submit_failure_is_surfaced() {
        let events = EventBus::new();
        let board = ResultBoard::new(events.clone());
        let recognizer = ScriptedRecognizer::new();
        recognizer.push_err(ScanError::service("No QR codes found in image"));
        let mut rx = events.subscribe();

        let err = board
            .submit(&recognizer, file_request(), ScanMethod::FileUpload)
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::RecognitionService(_)));
        let _cleared = rx.recv().await.unwrap();
        match rx.recv().await.unwrap() {
            AppEvent::ScanFailed { message } => {
                assert!(message.ends_with("No QR codes found in image"))
            }
            other => panic!("unexpected event {}", other.name()),
        }
    }

    #[tokio::test]
    async fn submit_publishes_classified_items() {
        let board = ResultBoard::new(EventBus::new());
        let recognizer = ScriptedRecognizer::new();
        recognizer.push_ok(vec![
            DecodedPayload::new("WIFI:T:WPA;S:Home;P:pw;;", Position::sized(50, 50)),
            DecodedPayload::new("hello", Position::sized(20, 20)),
        ]);

        let results = board
            .submit(&recognizer, file_request(), ScanMethod::FileUpload)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        let shown = board.current().await.unwrap();
        assert_eq!(shown.items[0].description, "WiFi Network");
        assert_eq!(shown.items[1].description, "Plain Text");
        assert!(recognizer.interactive_flags().iter().all(|flag| *flag));
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_outcomes_are_not_reported() {
        let events = EventBus::new();
        let board = ResultBoard::new(events.clone());
        let slow = Arc::new(DelayedRecognizer::new(Duration::from_millis(500)));
        slow.push_ok(Vec::new());
        slow.push_err(ScanError::service("upstream unavailable"));
        let fast = ScriptedRecognizer::new();
        fast.push_ok(vec![DecodedPayload::new(
            "https://example.com",
            Position::sized(40, 40),
        )]);
        let mut rx = events.subscribe();

        let first = tokio::spawn({
            let (board, slow) = (board.clone(), slow.clone());
            async move {
                board
                    .submit(slow.as_ref(), file_request(), ScanMethod::FileUpload)
                    .await
            }
        });
        let second = tokio::spawn({
            let (board, slow) = (board.clone(), slow.clone());
            async move {
                board
                    .submit(slow.as_ref(), file_request(), ScanMethod::FileUpload)
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        board
            .submit(&fast, file_request(), ScanMethod::FileUpload)
            .await
            .unwrap();

        // One superseded request came back empty, the other failed.
        let outcomes = [first.await.unwrap(), second.await.unwrap()];
        assert_eq!(outcomes.iter().filter(|outcome| outcome.is_err()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|outcome| matches!(outcome, Ok(results) if results.is_empty())));

        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(event.name());
        }
        assert_eq!(
            names,
            vec![
                "results-cleared",
                "results-cleared",
                "results-cleared",
                "results-updated",
                "code-detected"
            ]
        );
        assert_eq!(
            board.current().await.unwrap().items[0].data,
            "https://example.com"
        );
    }

    #[tokio::test]
    async fn detection_replaces_wholesale() {
        let board = ResultBoard::new(EventBus::new());
        board.publish_detection(set("first")).await;
        board.publish_detection(set("second")).await;
        let current = board.current().await.unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current.items[0].data, "second");
    }
}
