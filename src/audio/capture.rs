use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// One opaque audio fragment as delivered by a capture device.
///
/// Fragments are slices of a single encoded stream; concatenating them in
/// delivery order reproduces the recording.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub bytes: Vec<u8>,
}

/// Errors raised while acquiring or releasing a capture device
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    /// The user (or platform) refused microphone access
    #[error("microphone access denied: {0}")]
    AccessDenied(String),

    /// No usable capture device, or the device failed mid-acquisition
    #[error("microphone unavailable: {0}")]
    Unavailable(String),
}

/// Microphone capture backend trait
///
/// Implementations:
/// - `ScriptedMicrophone`: fragment delivery driven by the caller (tests, demos)
/// - `WavFileMicrophone`: replays a WAV file as paced fragments
#[async_trait]
pub trait Microphone: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio fragments.
    /// The channel closes when capture stops.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>, CaptureError>;

    /// Stop capturing and release the device
    async fn stop(&mut self) -> Result<(), CaptureError>;

    /// Check if the device is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// How a `ScriptedMicrophone` responds to an access request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicrophoneAccess {
    Granted,
    Denied,
    Unavailable,
}

/// A microphone whose fragment deliveries are driven by the test or demo
/// through a [`ScriptedMicrophoneHandle`].
pub struct ScriptedMicrophone {
    access: MicrophoneAccess,
    sender: Arc<Mutex<Option<mpsc::Sender<AudioChunk>>>>,
    start_calls: Arc<AtomicUsize>,
    stop_calls: Arc<AtomicUsize>,
}

impl ScriptedMicrophone {
    pub fn granted() -> Self {
        Self::with_access(MicrophoneAccess::Granted)
    }

    pub fn with_access(access: MicrophoneAccess) -> Self {
        Self {
            access,
            sender: Arc::new(Mutex::new(None)),
            start_calls: Arc::new(AtomicUsize::new(0)),
            stop_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handle for delivering fragments and inspecting device usage
    pub fn handle(&self) -> ScriptedMicrophoneHandle {
        ScriptedMicrophoneHandle {
            sender: Arc::clone(&self.sender),
            start_calls: Arc::clone(&self.start_calls),
            stop_calls: Arc::clone(&self.stop_calls),
        }
    }
}

/// Caller-side handle to a [`ScriptedMicrophone`]
#[derive(Clone)]
pub struct ScriptedMicrophoneHandle {
    sender: Arc<Mutex<Option<mpsc::Sender<AudioChunk>>>>,
    start_calls: Arc<AtomicUsize>,
    stop_calls: Arc<AtomicUsize>,
}

impl ScriptedMicrophoneHandle {
    /// Deliver one fragment to the active capture, if any.
    ///
    /// Returns false when no capture is active (the fragment is lost, as it
    /// would be on real hardware).
    pub async fn deliver(&self, bytes: Vec<u8>) -> bool {
        let sender = match self.sender.lock() {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        };
        match sender {
            Some(tx) => tx.send(AudioChunk { bytes }).await.is_ok(),
            None => false,
        }
    }

    /// Number of times the device was acquired
    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    /// Number of times the device was released
    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    /// Whether a capture is currently live
    pub fn is_live(&self) -> bool {
        self.sender.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }
}

#[async_trait]
impl Microphone for ScriptedMicrophone {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>, CaptureError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);

        match self.access {
            MicrophoneAccess::Denied => {
                Err(CaptureError::AccessDenied("toegang geweigerd".to_string()))
            }
            MicrophoneAccess::Unavailable => {
                Err(CaptureError::Unavailable("geen opnameapparaat".to_string()))
            }
            MicrophoneAccess::Granted => {
                let (tx, rx) = mpsc::channel(64);
                if let Ok(mut slot) = self.sender.lock() {
                    *slot = Some(tx);
                }
                info!("scripted microphone capture started");
                Ok(rx)
            }
        }
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);

        // Dropping the sender closes the fragment channel
        if let Ok(mut slot) = self.sender.lock() {
            slot.take();
        }
        info!("scripted microphone capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.sender.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A microphone that replays a WAV file as a stream of paced fragments.
///
/// The file is validated with `hound`, then its raw bytes are emitted in
/// fragments sized to `fragment_interval` worth of audio, mirroring how a
/// real recorder timeslices one encoded stream.
pub struct WavFileMicrophone {
    path: PathBuf,
    fragment_interval: Duration,
    capturing: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl WavFileMicrophone {
    pub fn new(path: impl AsRef<Path>, fragment_interval: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            fragment_interval,
            capturing: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }
}

#[async_trait]
impl Microphone for WavFileMicrophone {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>, CaptureError> {
        let reader = hound::WavReader::open(&self.path)
            .map_err(|e| CaptureError::Unavailable(format!("{}: {e}", self.path.display())))?;
        let spec = reader.spec();
        drop(reader);

        let bytes = std::fs::read(&self.path)
            .map_err(|e| CaptureError::Unavailable(format!("{}: {e}", self.path.display())))?;

        let byte_rate =
            spec.sample_rate as u64 * spec.channels as u64 * (spec.bits_per_sample as u64 / 8);
        let fragment_bytes =
            (byte_rate * self.fragment_interval.as_millis() as u64 / 1000).max(1) as usize;

        info!(
            "replaying {} as fragments of ~{} bytes ({}Hz, {} channels)",
            self.path.display(),
            fragment_bytes,
            spec.sample_rate,
            spec.channels
        );

        let (tx, rx) = mpsc::channel(64);
        let capturing = Arc::clone(&self.capturing);
        capturing.store(true, Ordering::SeqCst);
        let interval = self.fragment_interval;

        self.task = Some(tokio::spawn(async move {
            for fragment in bytes.chunks(fragment_bytes) {
                if !capturing.load(Ordering::SeqCst) {
                    break;
                }
                if tx
                    .send(AudioChunk {
                        bytes: fragment.to_vec(),
                    })
                    .await
                    .is_err()
                {
                    warn!("fragment receiver dropped before replay finished");
                    break;
                }
                tokio::time::sleep(interval).await;
            }
            capturing.store(false, Ordering::SeqCst);
        }));

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        self.capturing.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}
