use crate::error::RecordingError;
use crate::render::RenderThrottle;
use crate::traits::CaptureStream;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

struct Captured {
    mime_type: String,
    chunks: Vec<Vec<u8>>,
}

struct ActiveRecording {
    stop: CancellationToken,
    task: JoinHandle<Captured>,
}

pub struct RecordingController {
    output_dir: PathBuf,
    throttle: Arc<RenderThrottle>,
    active: Mutex<Option<ActiveRecording>>,
}

/// File extension for a media type such as `video/webm;codecs=vp9`.
pub fn extension_for(mime_type: &str) -> Option<String> {
    let essence = mime_type.split(';').next()?.trim();
    let (_, subtype) = essence.split_once('/')?;
    let subtype = subtype.trim_start_matches("x-");
    if subtype.is_empty() {
        return None;
    }
    Some(subtype.to_ascii_lowercase())
}

pub fn recording_file_name(at: DateTime<Utc>, extension: &str) -> String {
    format!("tour-{}.{}", at.format("%Y%m%d-%H%M%S"), extension)
}

impl RecordingController {
    pub fn new(output_dir: impl Into<PathBuf>, throttle: Arc<RenderThrottle>) -> Self {
        Self {
            output_dir: output_dir.into(),
            throttle,
            active: Mutex::new(None),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<ActiveRecording>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn is_recording(&self) -> bool {
        self.lock().is_some()
    }

    /// Start buffering `stream`. Returns false (and drops the stream) when a
    /// recording is already running.
    pub fn start_recording(&self, mut stream: Box<dyn CaptureStream>) -> bool {
        let mut active = self.lock();
        if active.is_some() {
            return false;
        }

        let stop = CancellationToken::new();
        let token = stop.clone();
        let task = tokio::spawn(async move {
            let mut chunks = Vec::new();
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    chunk = stream.next_chunk() => match chunk {
                        Some(chunk) if !chunk.is_empty() => chunks.push(chunk),
                        Some(_) => {}
                        None => {
                            // stream ended on its own, wait for the stop request
                            token.cancelled().await;
                            break;
                        }
                    },
                }
            }
            chunks.extend(stream.finish().await.into_iter().filter(|c| !c.is_empty()));
            Captured {
                mime_type: stream.mime_type().to_string(),
                chunks,
            }
        });

        self.throttle.pin();
        *active = Some(ActiveRecording { stop, task });
        info!("recording started");
        true
    }

    /// Stop and write the buffered chunks. `Ok(None)` when idle.
    pub async fn stop_recording(&self) -> Result<Option<PathBuf>, RecordingError> {
        let Some(active) = self.lock().take() else {
            return Ok(None);
        };
        self.throttle.unpin();
        active.stop.cancel();

        let captured = active
            .task
            .await
            .map_err(|e| RecordingError::Interrupted(e.to_string()))?;
        let extension = extension_for(&captured.mime_type)
            .ok_or_else(|| RecordingError::Unsupported(captured.mime_type.clone()))?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self
            .output_dir
            .join(recording_file_name(Utc::now(), &extension));
        let bytes: Vec<u8> = captured.chunks.concat();
        if bytes.is_empty() {
            warn!("recording captured no data");
        }
        tokio::fs::write(&path, &bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), "recording saved");
        Ok(Some(path))
    }
}
