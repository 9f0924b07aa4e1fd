// THEORY:
// Decoding a large picture can take a while, and the host that asked for it
// usually has other things to do (render, stay responsive). This module moves a
// `DecodeSession` onto a `tokio` task and drives it cooperatively:
//
// - after every `advance` chunk it publishes a `DecodeProgress` on a `watch`
//   channel and yields back to the runtime,
// - between chunks it checks a cancellation flag; a cancelled decode ends with
//   `DecodeError::Cancelled` and its scratch buffers are simply dropped,
// - the finished `WireGraph` is only handed out through a `oneshot` once the
//   whole decode succeeded. Nothing partial is ever published.
//
// `DecodeWorker` keeps a single long-lived task that decodes submitted frames in
// order; `spawn_decode` is the one-off variant. Both return a `DecodeHandle`,
// which is a `Future` of the result and the caller's window onto progress and
// cancellation.

use crate::pipeline::{DecodeError, DecodeProgress, DecodeSession, DecodeStatus, DecoderConfig, FrameBuffer, WireGraph};
use futures::{FutureExt, Stream};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot, watch};

pub type DecodeResult = Result<WireGraph, DecodeError>;

pub struct DecodeTask {
    pub frame_buffer: FrameBuffer,
    pub wire_hint: Option<usize>,
    pub result_sender: oneshot::Sender<DecodeResult>,
    pub progress_sender: watch::Sender<DecodeProgress>,
    pub cancel: Arc<AtomicBool>,
}

/// The caller's side of a background decode.
pub struct DecodeHandle {
    result_receiver: oneshot::Receiver<DecodeResult>,
    progress_receiver: watch::Receiver<DecodeProgress>,
    cancel: Arc<AtomicBool>,
}

impl DecodeHandle {
    /// Asks the decode to stop at its next yield point.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Latest published progress.
    pub fn progress(&self) -> DecodeProgress {
        *self.progress_receiver.borrow()
    }

    /// Progress updates until the decode ends. Updates may be coalesced, but the
    /// sequence is strictly increasing.
    pub fn progress_stream(&self) -> impl Stream<Item = DecodeProgress> + Send + 'static {
        futures::stream::unfold(self.progress_receiver.clone(), |mut receiver| async move {
            receiver.changed().await.ok()?;
            let progress = *receiver.borrow_and_update();
            Some((progress, receiver))
        })
    }
}

impl Future for DecodeHandle {
    type Output = DecodeResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.result_receiver.poll_unpin(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(DecodeError::Worker("decode task ended without a result".to_string()))
            })
        })
    }
}

fn new_task(frame_buffer: FrameBuffer, wire_hint: Option<usize>) -> (DecodeTask, DecodeHandle) {
    let (result_sender, result_receiver) = oneshot::channel();
    let (progress_sender, progress_receiver) = watch::channel(DecodeProgress::default());
    let cancel = Arc::new(AtomicBool::new(false));

    let task = DecodeTask {
        frame_buffer,
        wire_hint,
        result_sender,
        progress_sender,
        cancel: cancel.clone(),
    };
    let handle = DecodeHandle {
        result_receiver,
        progress_receiver,
        cancel,
    };
    (task, handle)
}

/// Drives a session to completion, yielding to the runtime after every chunk.
pub async fn run_session(
    mut session: DecodeSession,
    progress_sender: &watch::Sender<DecodeProgress>,
    cancel: &AtomicBool,
) -> DecodeResult {
    loop {
        if cancel.load(Ordering::Relaxed) {
            let progress = session.progress();
            clilog::warn!(
                "decode cancelled after {}/{} rows",
                progress.rows_processed,
                progress.total_rows
            );
            return Err(DecodeError::Cancelled);
        }
        match session.advance()? {
            DecodeStatus::InProgress(progress) => {
                progress_sender.send_replace(progress);
                tokio::task::yield_now().await;
            }
            DecodeStatus::Traced => break,
        }
    }

    let done = session.progress();
    let graph = session.finish()?;
    progress_sender.send_replace(done);
    Ok(graph)
}

async fn process_task(task: DecodeTask, config: DecoderConfig) {
    let DecodeTask {
        frame_buffer,
        wire_hint,
        result_sender,
        progress_sender,
        cancel,
    } = task;

    let result = match frame_buffer.session(wire_hint, config) {
        Ok(session) => run_session(session, &progress_sender, &cancel).await,
        Err(error) => Err(error),
    };
    if let Err(error) = &result {
        clilog::debug!("background decode failed: {}", error);
    }
    let _ = result_sender.send(result);
}

/// Decodes one frame on a fresh `tokio` task.
pub fn spawn_decode(frame_buffer: FrameBuffer, config: DecoderConfig) -> DecodeHandle {
    let (task, handle) = new_task(frame_buffer, None);
    tokio::spawn(process_task(task, config));
    handle
}

/// A long-lived task that decodes submitted frames one after another.
pub struct DecodeWorker {
    task_sender: mpsc::UnboundedSender<DecodeTask>,
    worker: tokio::task::JoinHandle<()>,
}

impl DecodeWorker {
    /// Must be called from within a `tokio` runtime.
    pub fn new(config: DecoderConfig) -> Self {
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<DecodeTask>();

        let worker = tokio::spawn(async move {
            while let Some(task) = task_receiver.recv().await {
                process_task(task, config.clone()).await;
            }
        });

        Self { task_sender, worker }
    }

    pub fn submit(
        &self,
        frame_buffer: FrameBuffer,
        wire_hint: Option<usize>,
    ) -> Result<DecodeHandle, DecodeError> {
        let (task, handle) = new_task(frame_buffer, wire_hint);
        self.task_sender
            .send(task)
            .map_err(|_| DecodeError::Worker("decode worker has shut down".to_string()))?;
        Ok(handle)
    }

    /// Finishes every queued decode, then stops the worker.
    pub async fn shutdown(self) -> Result<(), DecodeError> {
        drop(self.task_sender);
        self.worker
            .await
            .map_err(|error| DecodeError::Worker(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::bordered_grid::fixtures;
    use crate::pipeline::decode;
    use futures::StreamExt;

    fn frame(rows: &[&str]) -> FrameBuffer {
        FrameBuffer {
            data: fixtures::rgba(rows),
            width: rows[0].len() as u32,
            height: rows.len() as u32,
            channels: 4,
        }
    }

    fn small_chunks() -> DecoderConfig {
        DecoderConfig { yield_every_rows: 1, ..Default::default() }
    }

    const PICTURE: [&str; 6] = ["..#...", "######", "..#..#", "..####", "*.....", "**.#.#"];

    #[tokio::test]
    async fn background_decode_matches_blocking_decode() {
        let frame = frame(&PICTURE);
        let expected = decode(&frame.data, 6, 6, 4, DecoderConfig::default()).unwrap();

        let graph = spawn_decode(frame, small_chunks()).await.unwrap();
        assert_eq!(graph, expected);
    }

    #[tokio::test]
    async fn progress_is_published_in_order() {
        let handle = spawn_decode(frame(&PICTURE), small_chunks());
        let collector = tokio::spawn(handle.progress_stream().collect::<Vec<_>>());

        handle.await.unwrap();
        let seen = collector.await.unwrap();

        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|pair| pair[0].rows_processed < pair[1].rows_processed));
        let last = seen.last().unwrap();
        assert!(last.is_complete());
        assert_eq!(last.total_rows, 12);
    }

    #[tokio::test]
    async fn cancelled_decode_publishes_nothing() {
        let handle = spawn_decode(frame(&PICTURE), small_chunks());
        handle.cancel();
        assert!(matches!(handle.await, Err(DecodeError::Cancelled)));
    }

    #[tokio::test]
    async fn worker_decodes_frames_in_order() {
        let worker = DecodeWorker::new(DecoderConfig::default());
        let first = worker.submit(frame(&["*.#"]), None).unwrap();
        let second = worker.submit(frame(&["###", "..."]), Some(1)).unwrap();
        let broken = worker
            .submit(FrameBuffer { data: vec![0; 5], width: 2, height: 1, channels: 4 }, None)
            .unwrap();

        assert_eq!(first.await.unwrap().wire_count(), 2);
        assert_eq!(second.await.unwrap().wire_count(), 1);
        assert!(matches!(broken.await, Err(DecodeError::UnsupportedInput(_))));
        worker.shutdown().await.unwrap();
    }
}
