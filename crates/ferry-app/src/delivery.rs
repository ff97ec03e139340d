//! The single ordered delivery context.
//!
//! Responses, command results and session events are all posted into one
//! bounded channel. One writer task drains it, so the host never sees two
//! frames interleaved.

use ferry_pty::SessionEvent;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::ipc::Outbound;

pub type Outbox = mpsc::Sender<Outbound>;

/// Write every frame as one JSON line until all senders are gone.
pub async fn write_frames<W>(mut frames: mpsc::Receiver<Outbound>, out: &mut W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = frames.recv().await {
        let mut line = match serde_json::to_vec(&frame) {
            Ok(line) => line,
            Err(e) => {
                log::error!("failed to encode frame: {e}");
                continue;
            }
        };
        line.push(b'\n');
        out.write_all(&line).await?;
        out.flush().await?;
    }
    Ok(())
}

/// Move session events into the outbox, preserving per-session order.
pub fn spawn_event_forwarder(mut events: mpsc::Receiver<SessionEvent>, outbox: Outbox) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if outbox.send(event.into()).await.is_err() {
                log::debug!("outbox closed, stopping event forwarder");
                return;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::ErrorCode;
    use ferry_pty::SessionEventKind;
    use serde_json::{json, Value};

    fn lines(buf: &[u8]) -> Vec<Value> {
        String::from_utf8_lossy(buf)
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_write_frames_one_per_line() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(Outbound::response(1, true)).await.unwrap();
        tx.send(Outbound::error(Some(2), ErrorCode::NotImplemented, "nope"))
            .await
            .unwrap();
        drop(tx);

        let mut buf = Vec::new();
        write_frames(rx, &mut buf).await.unwrap();

        let frames = lines(&buf);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], json!({"type": "response", "id": 1, "result": true}));
        assert_eq!(frames[1]["code"], "NOT_IMPLEMENTED");
    }

    #[tokio::test]
    async fn test_forwarder_preserves_order() {
        let (event_tx, event_rx) = mpsc::channel(8);
        let (outbox, mut frames) = mpsc::channel(8);
        let forwarder = spawn_event_forwarder(event_rx, outbox);

        for kind in [
            SessionEventKind::TitleChanged("vim".to_string()),
            SessionEventKind::TextChanged("hello".to_string()),
            SessionEventKind::Finished(0),
        ] {
            event_tx
                .send(SessionEvent {
                    session_id: "s1".to_string(),
                    kind,
                })
                .await
                .unwrap();
        }
        drop(event_tx);
        forwarder.await.unwrap();

        let mut names = Vec::new();
        while let Ok(frame) = frames.try_recv() {
            let value = serde_json::to_value(&frame).unwrap();
            assert_eq!(value["sessionId"], "s1");
            names.push(value["event"].as_str().unwrap().to_string());
        }
        assert_eq!(names, ["onTitleChanged", "onTerminalOutput", "onSessionFinished"]);
    }
}
