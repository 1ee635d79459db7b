use std::fmt;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::error::{Result, VeinError};
use crate::stream::MjpegSource;
use crate::types::RgbFrame;

/// Where frames come from. Parsed from the `--source` string: a bare
/// integer is a device index, `http(s)://` is a network stream, anything
/// else is an image file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceId {
    Device(u32),
    Url(String),
    File(PathBuf),
}

impl SourceId {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if let Ok(index) = s.parse::<u32>() {
            SourceId::Device(index)
        } else if s.contains("://") {
            SourceId::Url(s.to_string())
        } else {
            SourceId::File(PathBuf::from(s))
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Device(i) => write!(f, "device {}", i),
            SourceId::Url(u) => write!(f, "{}", u),
            SourceId::File(p) => write!(f, "{}", p.display()),
        }
    }
}

/// A readable video source. Dropping it releases the underlying handle.
pub trait FrameSource {
    fn name(&self) -> String;
    /// One frame, or `TransientReadFailure` when this read came up empty.
    fn read_frame(&mut self) -> Result<RgbFrame>;
}

/// Opens `id`, failing fast with `SourceUnavailable`.
pub fn open_source(id: &SourceId) -> Result<Box<dyn FrameSource>> {
    let source: Box<dyn FrameSource> = match id {
        SourceId::Device(index) => Box::new(CameraSource::new(*index)?),
        SourceId::Url(url) => {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(VeinError::unavailable(id, "only http(s) MJPEG streams are supported"));
            }
            Box::new(MjpegSource::connect(url)?)
        }
        SourceId::File(path) => Box::new(StillImageSource::open(path.clone())?),
    };
    info!(source = %source.name(), "opened video source");
    Ok(source)
}

#[cfg(feature = "camera")]
pub struct CameraSource {
    camera: nokhwa::Camera,
}

#[cfg(feature = "camera")]
impl CameraSource {
    pub fn new(index: u32) -> Result<Self> {
        use nokhwa::pixel_format::RgbFormat;
        use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};

        let id = SourceId::Device(index);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = nokhwa::Camera::new(CameraIndex::Index(index), requested)
            .map_err(|e| VeinError::unavailable(&id, e))?;
        camera
            .open_stream()
            .map_err(|e| VeinError::unavailable(&id, e))?;
        info!(camera = %camera.info().human_name(), format = %camera.camera_format(), "camera stream open");
        Ok(Self { camera })
    }
}

#[cfg(feature = "camera")]
impl FrameSource for CameraSource {
    fn name(&self) -> String {
        self.camera.info().human_name()
    }

    fn read_frame(&mut self) -> Result<RgbFrame> {
        use nokhwa::pixel_format::RgbFormat;

        let frame = self.camera.frame().map_err(VeinError::transient)?;
        frame.decode_image::<RgbFormat>().map_err(VeinError::transient)
    }
}

#[cfg(feature = "camera")]
impl Drop for CameraSource {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            debug!(error = %e, "failed to stop camera stream");
        }
    }
}

#[cfg(not(feature = "camera"))]
pub struct CameraSource;

#[cfg(not(feature = "camera"))]
impl CameraSource {
    pub fn new(index: u32) -> Result<Self> {
        Err(VeinError::unavailable(
            SourceId::Device(index),
            "built without the `camera` feature",
        ))
    }
}

#[cfg(not(feature = "camera"))]
impl FrameSource for CameraSource {
    fn name(&self) -> String {
        "camera (unavailable)".to_string()
    }

    fn read_frame(&mut self) -> Result<RgbFrame> {
        Err(VeinError::transient("camera support not compiled in"))
    }
}

/// Index and human name of every capture device the platform reports.
#[cfg(feature = "camera")]
pub fn list_devices() -> anyhow::Result<Vec<(String, String)>> {
    let cameras = nokhwa::query(nokhwa::utils::ApiBackend::Auto)?;
    Ok(cameras
        .into_iter()
        .map(|cam| (cam.index().to_string(), cam.human_name()))
        .collect())
}

#[cfg(not(feature = "camera"))]
pub fn list_devices() -> anyhow::Result<Vec<(String, String)>> {
    anyhow::bail!("built without the `camera` feature")
}

/// Serves one decoded image for every read.
pub struct StillImageSource {
    path: PathBuf,
    frame: RgbFrame,
}

impl StillImageSource {
    pub fn open(path: PathBuf) -> Result<Self> {
        let id = SourceId::File(path.clone());
        let frame = image::open(&path)
            .map_err(|e| VeinError::unavailable(&id, e))?
            .to_rgb8();
        Ok(Self { path, frame })
    }

    pub fn from_frame(path: PathBuf, frame: RgbFrame) -> Self {
        Self { path, frame }
    }
}

impl FrameSource for StillImageSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn read_frame(&mut self) -> Result<RgbFrame> {
        Ok(self.frame.clone())
    }
}

/// How long to wait between failed reads and when to give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retry_delay: Duration,
    pub max_consecutive_failures: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(10),
            max_consecutive_failures: 100,
        }
    }
}

/// Reads frames with bounded retry: transient failures are retried after
/// `retry_delay` until `max_consecutive_failures` in a row, which becomes
/// `SourceLost`. Any successful read resets the count.
pub struct Acquisition {
    policy: RetryPolicy,
    consecutive_failures: u32,
}

impl Acquisition {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            consecutive_failures: 0,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn next_frame(&mut self, source: &mut dyn FrameSource) -> Result<RgbFrame> {
        loop {
            match source.read_frame() {
                Ok(frame) => {
                    self.consecutive_failures = 0;
                    return Ok(frame);
                }
                Err(VeinError::TransientReadFailure(reason)) => {
                    self.consecutive_failures += 1;
                    if self.consecutive_failures >= self.policy.max_consecutive_failures {
                        error!(attempts = self.consecutive_failures, %reason, "giving up on video source");
                        return Err(VeinError::SourceLost {
                            attempts: self.consecutive_failures,
                        });
                    }
                    debug!(attempt = self.consecutive_failures, %reason, "frame read failed, retrying");
                    thread::sleep(self.policy.retry_delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
