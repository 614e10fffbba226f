// SPDX-License-Identifier: MPL-2.0

//! Story photos: validation, the durable data-URL form used by the pending
//! queue, and exclusive ownership of the camera stream.

use crate::config::MAX_PHOTO_BYTES;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use image::ImageFormat;
use image::codecs::jpeg::JpegEncoder;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// JPEG quality used for camera captures
const CAPTURE_QUALITY: u8 = 95;
const CAPTURE_FILE_NAME: &str = "camera-photo.jpg";

#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("photo is {size} bytes, the limit is {MAX_PHOTO_BYTES}")]
    TooLarge { size: usize },
    #[error("file is not a supported image")]
    Unsupported,
    #[error("failed to read photo: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed photo encoding: {0}")]
    Encoding(String),
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    #[error("camera is not running")]
    NotRunning,
    #[error("failed to encode capture: {0}")]
    Encode(#[from] image::ImageError),
    #[error(transparent)]
    Photo(#[from] PhotoError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl PhotoFile {
    /// Validate size and format
    pub fn from_bytes(file_name: &str, bytes: Vec<u8>) -> Result<Self, PhotoError> {
        if bytes.len() > MAX_PHOTO_BYTES {
            return Err(PhotoError::TooLarge { size: bytes.len() });
        }

        let format = image::guess_format(&bytes).map_err(|_| PhotoError::Unsupported)?;
        let mime_type = mime_for(format).ok_or(PhotoError::Unsupported)?;

        Ok(Self {
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            bytes: Bytes::from(bytes),
        })
    }

    pub fn read(path: &Path) -> Result<Self, PhotoError> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo".to_string());
        Self::from_bytes(&file_name, bytes)
    }

    /// `data:<mime>;base64,<payload>`
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }

    /// Inverse of [`PhotoFile::to_data_url`]; the file name is synthesized
    pub fn from_data_url(data_url: &str) -> Result<Self, PhotoError> {
        let rest = data_url
            .strip_prefix("data:")
            .ok_or_else(|| PhotoError::Encoding("missing data: prefix".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| PhotoError::Encoding("missing payload separator".to_string()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| PhotoError::Encoding("payload is not base64".to_string()))?;

        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| PhotoError::Encoding(e.to_string()))?;

        let mime_type = if mime_type.is_empty() {
            "image/jpeg"
        } else {
            mime_type
        };

        Ok(Self {
            file_name: upload_name(mime_type).to_string(),
            mime_type: mime_type.to_string(),
            bytes: Bytes::from(bytes),
        })
    }
}

fn mime_for(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        _ => None,
    }
}

fn upload_name(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "upload.png",
        "image/gif" => "upload.gif",
        "image/webp" => "upload.webp",
        _ => "upload.jpg",
    }
}

/// A running camera feed
pub trait MediaStream: Send {
    fn grab_frame(&mut self) -> Result<image::RgbImage, CaptureError>;
    /// Release the hardware
    fn stop(&mut self);
}

pub trait CaptureDevice {
    type Stream: MediaStream;

    fn open(&self) -> Result<Self::Stream, CaptureError>;
}

/// Exclusive owner of the camera stream. Dropping it stops the stream.
pub struct CameraSession<S: MediaStream> {
    stream: Option<S>,
}

impl<S: MediaStream> CameraSession<S> {
    pub fn start<D: CaptureDevice<Stream = S>>(device: &D) -> Result<Self, CaptureError> {
        let stream = device.open()?;
        info!("camera started");
        Ok(Self {
            stream: Some(stream),
        })
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    /// Grab the current frame as a JPEG photo
    pub fn capture(&mut self) -> Result<PhotoFile, CaptureError> {
        let stream = self.stream.as_mut().ok_or(CaptureError::NotRunning)?;
        let frame = stream.grab_frame()?;

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, CAPTURE_QUALITY).encode_image(&frame)?;
        debug!(bytes = jpeg.len(), "frame captured");

        Ok(PhotoFile::from_bytes(CAPTURE_FILE_NAME, jpeg)?)
    }

    pub fn stop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            info!("camera stopped");
        }
    }
}

impl<S: MediaStream> Drop for CameraSession<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCamera, tiny_jpeg};

    #[test]
    fn test_data_url_round_trip_is_byte_exact() {
        let photo = PhotoFile::from_bytes("holiday.jpg", tiny_jpeg()).unwrap();
        let encoded = photo.to_data_url();
        assert!(encoded.starts_with("data:image/jpeg;base64,"));

        let decoded = PhotoFile::from_data_url(&encoded).unwrap();
        assert_eq!(decoded.bytes, photo.bytes);
        assert_eq!(decoded.mime_type, "image/jpeg");
        assert_eq!(decoded.file_name, "upload.jpg");
    }

    #[test]
    fn test_oversized_photo_rejected() {
        let mut bytes = tiny_jpeg();
        bytes.resize(MAX_PHOTO_BYTES + 1, 0);
        assert!(matches!(
            PhotoFile::from_bytes("big.jpg", bytes),
            Err(PhotoError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_non_image_rejected() {
        assert!(matches!(
            PhotoFile::from_bytes("notes.txt", b"just some text".to_vec()),
            Err(PhotoError::Unsupported)
        ));
    }

    #[test]
    fn test_malformed_data_url() {
        assert!(PhotoFile::from_data_url("image/jpeg;base64,AAAA").is_err());
        assert!(PhotoFile::from_data_url("data:image/jpeg;base64").is_err());
        assert!(PhotoFile::from_data_url("data:image/jpeg;base64,***").is_err());
    }

    #[test]
    fn test_capture_encodes_jpeg_and_drop_stops_stream() {
        let camera = FakeCamera::new();
        {
            let mut session = CameraSession::start(&camera).unwrap();
            let photo = session.capture().unwrap();
            assert_eq!(photo.mime_type, "image/jpeg");
            assert_eq!(photo.file_name, CAPTURE_FILE_NAME);
        }
        assert_eq!(camera.stops(), 1);
    }

    #[test]
    fn test_capture_after_stop_fails() {
        let camera = FakeCamera::new();
        let mut session = CameraSession::start(&camera).unwrap();
        session.stop();
        session.stop();

        assert!(matches!(session.capture(), Err(CaptureError::NotRunning)));
        drop(session);
        assert_eq!(camera.stops(), 1);
    }

    #[test]
    fn test_denied_camera() {
        let camera = FakeCamera::denied();
        assert!(matches!(
            CameraSession::start(&camera),
            Err(CaptureError::PermissionDenied)
        ));
    }
}
