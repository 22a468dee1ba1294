//! Async front end serializing all capture traffic through one task

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use crate::config::Config;
use crate::har::Har;
use crate::recording::{HarRecorder, RecorderStats};
use crate::{HarError, Result};

use super::{CaptureEvent, HookEvent};

enum Command {
    Event(CaptureEvent),
    ExportLive(oneshot::Sender<Har>),
    ExportRecorded(oneshot::Sender<Har>),
    Stats(oneshot::Sender<RecorderStats>),
}

/// Task owning a [`HarRecorder`]
///
/// Commands are executed one at a time in arrival order, so every mutation
/// completes before the next begins and no locking is needed.
pub struct RecorderService {
    recorder: HarRecorder,
    commands: mpsc::Receiver<Command>,
    shutdown_rx: broadcast::Receiver<()>,
}

/// Cloneable client for a running [`RecorderService`]
#[derive(Clone)]
pub struct RecorderHandle {
    commands: mpsc::Sender<Command>,
    shutdown_tx: broadcast::Sender<()>,
}

impl RecorderService {
    /// Wrap a recorder; `capacity` bounds the command queue
    #[must_use]
    pub fn new(recorder: HarRecorder, capacity: usize) -> (Self, RecorderHandle) {
        let (commands_tx, commands) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let service = Self {
            recorder,
            commands,
            shutdown_rx,
        };
        let handle = RecorderHandle {
            commands: commands_tx,
            shutdown_tx,
        };
        (service, handle)
    }

    /// Service around a wall-clock recorder built from `config`
    #[must_use]
    pub fn from_config(config: &Config) -> (Self, RecorderHandle) {
        Self::new(HarRecorder::new(config), config.channel_capacity)
    }

    /// Process commands until shutdown or until every handle is dropped
    ///
    /// Commands queued before a shutdown request are still executed. The
    /// recorder is handed back so its final state can be inspected.
    pub async fn run(mut self) -> HarRecorder {
        info!("Recorder service started");

        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.execute(command),
                        None => {
                            info!("All recorder handles dropped");
                            break;
                        }
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        info!("Recorder service stopped");
        self.recorder
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Event(event) => self.recorder.apply(event),
            Command::ExportLive(reply) => {
                if reply.send(self.recorder.export_live()).is_err() {
                    debug!("Live export requester went away");
                }
            }
            Command::ExportRecorded(reply) => {
                if reply.send(self.recorder.export_recorded()).is_err() {
                    debug!("Recorded export requester went away");
                }
            }
            Command::Stats(reply) => {
                reply.send(self.recorder.stats()).ok();
            }
        }
    }
}

impl RecorderHandle {
    /// Queue a capture event
    ///
    /// # Errors
    ///
    /// Returns error if the service has stopped
    pub async fn send(&self, event: CaptureEvent) -> Result<()> {
        self.commands
            .send(Command::Event(event))
            .await
            .map_err(|_| HarError::ServiceClosed)
    }

    /// Queue a networking hook event
    ///
    /// # Errors
    ///
    /// Returns error if the service has stopped
    pub async fn hook(&self, event: HookEvent) -> Result<()> {
        self.send(CaptureEvent::Network(event)).await
    }

    /// Queue a navigation
    ///
    /// # Errors
    ///
    /// Returns error if the service has stopped
    pub async fn navigate(&self, url: &str, title: &str) -> Result<()> {
        self.send(CaptureEvent::Navigate {
            url: url.to_string(),
            title: title.to_string(),
        })
        .await
    }

    /// Start or resume recording
    ///
    /// # Errors
    ///
    /// Returns error if the service has stopped
    pub async fn start_recording(&self) -> Result<()> {
        self.send(CaptureEvent::StartRecording).await
    }

    /// Pause recording
    ///
    /// # Errors
    ///
    /// Returns error if the service has stopped
    pub async fn stop_recording(&self) -> Result<()> {
        self.send(CaptureEvent::StopRecording).await
    }

    /// Discard the recorded buffer and start recording
    ///
    /// # Errors
    ///
    /// Returns error if the service has stopped
    pub async fn start_new_recording(&self) -> Result<()> {
        self.send(CaptureEvent::StartNewRecording).await
    }

    /// Export the live window
    ///
    /// # Errors
    ///
    /// Returns error if the service has stopped
    pub async fn export_live(&self) -> Result<Har> {
        self.request(Command::ExportLive).await
    }

    /// Export the recorded buffer
    ///
    /// # Errors
    ///
    /// Returns error if the service has stopped
    pub async fn export_recorded(&self) -> Result<Har> {
        self.request(Command::ExportRecorded).await
    }

    /// Current counters
    ///
    /// # Errors
    ///
    /// Returns error if the service has stopped
    pub async fn stats(&self) -> Result<RecorderStats> {
        self.request(Command::Stats).await
    }

    /// Ask the service to stop after draining queued commands
    pub fn shutdown(&self) {
        self.shutdown_tx.send(()).ok();
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| HarError::ServiceClosed)?;
        rx.await.map_err(|_| HarError::ServiceClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{RawResponse, TimingEntry, XHR_INITIATOR};
    use crate::clock::{ManualClock, SequentialIdGenerator};
    use std::sync::Arc;
    use std::time::Duration;

    fn service() -> (RecorderService, RecorderHandle) {
        let recorder = HarRecorder::with_sources(
            &Config::default(),
            Arc::new(ManualClock::at_millis(1_700_000_000_000)),
            Arc::new(SequentialIdGenerator::new()),
        );
        RecorderService::new(recorder, 16)
    }

    #[tokio::test]
    async fn test_service_captures_and_exports() {
        let (service, handle) = service();
        let task = tokio::spawn(service.run());

        handle.start_new_recording().await.unwrap();
        handle.navigate("https://app.test/", "App").await.unwrap();
        handle
            .hook(HookEvent::RequestStart {
                call_id: 1,
                method: "GET".to_string(),
                url: "https://api.test/x".to_string(),
            })
            .await
            .unwrap();
        handle
            .hook(HookEvent::Send {
                call_id: 1,
                body: None,
            })
            .await
            .unwrap();
        handle
            .hook(HookEvent::Timing(TimingEntry {
                name: "https://api.test/x".to_string(),
                initiator_type: XHR_INITIATOR.to_string(),
                duration: 4.0,
                ..Default::default()
            }))
            .await
            .unwrap();
        handle
            .hook(HookEvent::Complete {
                call_id: 1,
                response: RawResponse {
                    status: 200,
                    status_text: "OK".to_string(),
                    response_url: None,
                    response_text: None,
                    all_response_headers: String::new(),
                },
            })
            .await
            .unwrap();

        let live = handle.export_live().await.unwrap();
        assert_eq!(live.log.entries.len(), 1);
        let recorded = handle.export_recorded().await.unwrap();
        assert_eq!(recorded.log.entries.len(), 1);

        let stats = handle.stats().await.unwrap();
        assert!(stats.recording);
        assert_eq!(stats.pending_halves, 0);

        handle.shutdown();
        let recorder = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(recorder.session().resources().len(), 1);
    }

    #[tokio::test]
    async fn test_queued_commands_run_before_shutdown() {
        let (service, handle) = service();

        handle.start_recording().await.unwrap();
        handle.navigate("https://app.test/", "App").await.unwrap();
        handle.shutdown();

        let recorder = service.run().await;
        assert!(recorder.is_recording());
        assert_eq!(recorder.session().pages().len(), 1);
    }

    #[tokio::test]
    async fn test_service_stops_when_handles_dropped() {
        let (service, handle) = service();
        let task = tokio::spawn(service.run());

        let clone = handle.clone();
        drop(handle);
        clone.stop_recording().await.unwrap();
        drop(clone);

        let result = tokio::time::timeout(Duration::from_secs(2), task).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_handle_errors_after_stop() {
        let (service, handle) = service();
        handle.shutdown();
        drop(service.run().await);

        assert!(matches!(
            handle.start_recording().await,
            Err(HarError::ServiceClosed)
        ));
        assert!(matches!(
            handle.export_live().await,
            Err(HarError::ServiceClosed)
        ));
    }
}
