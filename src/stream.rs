//! MJPEG-over-HTTP sources, such as phone camera apps.

use std::io::Read;
use std::time::Duration;

use image::ImageFormat;
use tracing::{debug, info, warn};

use crate::camera::{FrameSource, SourceId};
use crate::error::{Result, VeinError};
use crate::types::RgbFrame;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];
const READ_CHUNK: usize = 16 * 1024;

/// Cuts complete JPEG images out of a multipart byte stream by scanning
/// for start/end-of-image markers. Boundary headers between parts are
/// skipped implicitly.
pub struct JpegSplitter {
    buffer: Vec<u8>,
    max_buffer: usize,
}

impl JpegSplitter {
    pub fn new(max_buffer: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_buffer,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        if self.buffer.len() > self.max_buffer {
            // Keep only from the last SOI; anything before it can't complete.
            let keep_from = rfind(&self.buffer, &SOI).unwrap_or(self.buffer.len());
            warn!(dropped = keep_from, "MJPEG buffer overflow, discarding bytes");
            self.buffer.drain(..keep_from);
            if self.buffer.len() > self.max_buffer {
                self.buffer.clear();
            }
        }
    }

    /// Next complete JPEG, if one is buffered.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let start = find(&self.buffer, &SOI, 0)?;
        let end = find(&self.buffer, &EOI, start + 2)? + 2;
        let jpeg = self.buffer[start..end].to_vec();
        self.buffer.drain(..end);
        Some(jpeg)
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

fn find(haystack: &[u8], needle: &[u8; 2], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(2)
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn rfind(haystack: &[u8], needle: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).rposition(|w| w == needle)
}

pub struct MjpegSource {
    url: String,
    client: reqwest::blocking::Client,
    response: Option<reqwest::blocking::Response>,
    splitter: JpegSplitter,
}

impl MjpegSource {
    /// Connects and checks the first response status. Later disconnects are
    /// treated as transient and reconnected on the next read.
    pub fn connect(url: &str) -> Result<Self> {
        let id = SourceId::Url(url.to_string());
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| VeinError::unavailable(&id, e))?;
        let response = Self::request(&client, url).map_err(|e| VeinError::unavailable(&id, e))?;
        info!(url, "connected to MJPEG stream");
        Ok(Self {
            url: url.to_string(),
            client,
            response: Some(response),
            splitter: JpegSplitter::new(8 * 1024 * 1024),
        })
    }

    fn request(client: &reqwest::blocking::Client, url: &str) -> anyhow::Result<reqwest::blocking::Response> {
        let response = client.get(url).send()?.error_for_status()?;
        Ok(response)
    }
}

impl FrameSource for MjpegSource {
    fn name(&self) -> String {
        self.url.clone()
    }

    fn read_frame(&mut self) -> Result<RgbFrame> {
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            if let Some(jpeg) = self.splitter.next_frame() {
                return image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)
                    .map(|img| img.to_rgb8())
                    .map_err(VeinError::transient);
            }

            let mut response = match self.response.take() {
                Some(r) => r,
                None => {
                    debug!(url = %self.url, "reconnecting to MJPEG stream");
                    Self::request(&self.client, &self.url).map_err(VeinError::transient)?
                }
            };

            // A dropped response is reconnected on the next read.
            match response.read(&mut chunk) {
                Ok(0) => return Err(VeinError::transient("MJPEG stream closed")),
                Ok(n) => {
                    self.splitter.push(&chunk[..n]);
                    self.response = Some(response);
                }
                Err(e) => return Err(VeinError::transient(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn tiny_jpeg() -> Vec<u8> {
        let img = RgbFrame::from_pixel(8, 8, image::Rgb([90, 120, 150]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Jpeg).unwrap();
        out.into_inner()
    }

    #[test]
    fn splits_multipart_parts() {
        let jpeg = tiny_jpeg();
        let mut stream = Vec::new();
        for _ in 0..2 {
            stream.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
            stream.extend_from_slice(&jpeg);
            stream.extend_from_slice(b"\r\n");
        }

        let mut splitter = JpegSplitter::new(1 << 20);
        // Feed in small pieces so markers straddle pushes.
        let mut frames = Vec::new();
        for piece in stream.chunks(7) {
            splitter.push(piece);
            while let Some(f) = splitter.next_frame() {
                frames.push(f);
            }
        }
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], jpeg);
        let decoded = image::load_from_memory_with_format(&frames[1], ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 8));
    }

    #[test]
    fn incomplete_frame_waits_for_more() {
        let jpeg = tiny_jpeg();
        let mut splitter = JpegSplitter::new(1 << 20);
        splitter.push(&jpeg[..jpeg.len() - 1]);
        assert!(splitter.next_frame().is_none());
        splitter.push(&jpeg[jpeg.len() - 1..]);
        assert!(splitter.next_frame().is_some());
        assert_eq!(splitter.buffered(), 0);
    }

    #[test]
    fn overflow_discards_garbage() {
        let mut splitter = JpegSplitter::new(64);
        splitter.push(&[0u8; 100]);
        assert_eq!(splitter.buffered(), 0);
    }
}
