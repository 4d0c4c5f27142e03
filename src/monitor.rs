use crate::classify::ClipboardSnapshot;
use crate::clipboard::ClipboardSource;
use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::thread;
use std::time::Duration;

#[derive(Debug)]
pub enum MonitorEvent {
    Changed(ClipboardSnapshot),
    ReadFailed(String),
}

/// Remembers what the clipboard last looked like and reports each new
/// state exactly once.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last_marker: Option<i64>,
    last_fingerprint: Option<String>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll<S: ClipboardSource>(&mut self, source: &mut S) -> Result<Option<ClipboardSnapshot>> {
        let marker = source.change_marker();
        if marker.is_some() && marker == self.last_marker {
            return Ok(None);
        }
        let snapshot = source.read()?;
        self.last_marker = marker;
        let fingerprint = snapshot.fingerprint();
        if self.last_fingerprint.as_deref() == Some(fingerprint.as_str()) {
            return Ok(None);
        }
        self.last_fingerprint = Some(fingerprint);
        if snapshot.is_empty() {
            return Ok(None);
        }
        Ok(Some(snapshot))
    }
}

pub struct MonitorHandle {
    stop_tx: Sender<()>,
    join: thread::JoinHandle<()>,
}

impl MonitorHandle {
    pub fn stop(self) {
        let _ = self.stop_tx.send(());
        if self.join.join().is_err() {
            tracing::error!("clipboard monitor thread panicked");
        }
    }
}

/// Polls `source` every `interval` on a background thread. Nothing here
/// touches the history; changes go out over `events`.
pub fn spawn<S>(mut source: S, interval: Duration, events: Sender<MonitorEvent>) -> MonitorHandle
where
    S: ClipboardSource + Send + 'static,
{
    let (stop_tx, stop_rx) = bounded(1);
    let join = thread::spawn(move || {
        tracing::info!(interval_ms = interval.as_millis() as u64, "clipboard monitor started");
        run(&mut source, interval, &events, &stop_rx);
        tracing::info!("clipboard monitor stopped");
    });
    MonitorHandle { stop_tx, join }
}

fn run<S: ClipboardSource>(
    source: &mut S,
    interval: Duration,
    events: &Sender<MonitorEvent>,
    stop_rx: &Receiver<()>,
) {
    let mut detector = ChangeDetector::new();
    let mut consecutive_errors = 0u32;
    loop {
        let event = match detector.poll(source) {
            Ok(Some(snapshot)) => {
                consecutive_errors = 0;
                Some(MonitorEvent::Changed(snapshot))
            }
            Ok(None) => {
                consecutive_errors = 0;
                None
            }
            Err(err) => {
                consecutive_errors += 1;
                // Report the first failure and then every tenth, not every tick.
                (consecutive_errors % 10 == 1).then(|| MonitorEvent::ReadFailed(format!("{err:#}")))
            }
        };
        if let Some(event) = event {
            if events.send(event).is_err() {
                return;
            }
        }
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}
