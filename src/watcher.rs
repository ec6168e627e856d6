use std::io::{BufReader, Read};
use std::process::Child;
use std::thread;

use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::error::WatchDiffError;
use crate::events::WatchEvent;

/// Channel depth between the decoding thread and the dispatch loop.
const EVENT_BUFFER: usize = 256;

pub type EventResult = Result<WatchEvent, WatchDiffError>;

/// An ordered stream of watch events.
///
/// Events are decoded on a background thread and handed over a bounded
/// channel, so the consumer only ever waits on `next()`.
pub struct EventStream {
    event_rx: Receiver<EventResult>,
    child: Option<Child>,
}

impl EventStream {
    /// A stream fed by the returned sender; it ends when every sender is dropped.
    pub fn channel(capacity: usize) -> (Sender<EventResult>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { event_rx: rx, child: None })
    }

    /// A finite stream that yields `events` in order, then ends.
    pub fn from_events(events: Vec<WatchEvent>) -> Self {
        let (tx, stream) = Self::channel(events.len());
        for event in events {
            // Capacity covers every event, so this never fails.
            let _ = tx.try_send(Ok(event));
        }
        stream
    }

    /// Decode concatenated JSON watch events from `reader`.
    ///
    /// Input does not need to be newline delimited: pretty-printed objects
    /// back to back (what `kubectl get -w -o json` prints) decode too. A decode
    /// failure is delivered in order and ends the stream.
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        let (tx, stream) = Self::channel(EVENT_BUFFER);

        thread::spawn(move || {
            let events = serde_json::Deserializer::from_reader(BufReader::new(reader)).into_iter::<WatchEvent>();
            for item in events {
                let item = item.map_err(|e| WatchDiffError::malformed(format!("cannot decode watch event: {e}")));
                let failed = item.is_err();
                if tx.blocking_send(item).is_err() || failed {
                    break; // Receiver dropped or stream poisoned
                }
            }
            tracing::debug!("watch event reader finished");
        });

        stream
    }

    /// Tie a child process to the stream; it is killed when the stream drops.
    pub fn with_child(mut self, child: Child) -> Self {
        self.child = Some(child);
        self
    }

    /// Wait for the next event. `None` means the subscription is exhausted.
    pub async fn next(&mut self) -> Option<EventResult> {
        self.event_rx.recv().await
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.kill() {
                tracing::debug!("watch process already exited: {}", err);
            }
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::WatchEventType;
    use serde_json::json;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_from_events_in_order() {
        let mut stream = EventStream::from_events(vec![
            WatchEvent::added(json!({"n": 1})),
            WatchEvent::modified(json!({"n": 2})),
        ]);

        let first = stream.next().await.unwrap().unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(first.kind, WatchEventType::Added);
        assert_eq!(second.object["n"], 2);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_decodes_pretty_printed_concatenated_json() {
        let input = r#"{
    "type": "ADDED",
    "object": {"kind": "Pod"}
}
{"type":"DELETED","object":{"kind":"Pod"}}"#;

        let mut stream = EventStream::from_reader(Cursor::new(input.as_bytes().to_vec()));
        let kinds = [
            stream.next().await.unwrap().unwrap().kind,
            stream.next().await.unwrap().unwrap().kind,
        ];
        assert_eq!(kinds, [WatchEventType::Added, WatchEventType::Deleted]);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_decode_error_ends_stream() {
        let input = r#"{"type":"ADDED","object":{}} not-json {"type":"ADDED","object":{}}"#;
        let mut stream = EventStream::from_reader(Cursor::new(input.as_bytes().to_vec()));

        assert!(stream.next().await.unwrap().is_ok());
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, WatchDiffError::MalformedPayload { .. }));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_channel_stream_ends_when_sender_dropped() {
        let (tx, mut stream) = EventStream::channel(4);
        tx.send(Ok(WatchEvent::added(json!({})))).await.unwrap();
        drop(tx);

        assert!(stream.next().await.is_some());
        assert!(stream.next().await.is_none());
    }
}
