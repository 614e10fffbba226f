// SPDX-License-Identifier: MPL-2.0

//! Add-story form state for an interactive front end.
//!
//! The camera comes from the host through [`CaptureDevice`]; this crate
//! ships no device of its own, and the CLI builds [`NewStory`] directly from
//! a photo file.

use crate::api::{Coordinates, NewStory};
use crate::photo::{CameraSession, CaptureDevice, CaptureError, MediaStream, PhotoFile};
use crate::validate::{FormErrors, validate_story};

/// The add-story form.
///
/// Owns the camera while it is open. Every way out (capture, close,
/// `into_new_story`, or dropping the draft) releases it.
pub struct StoryDraft<S: MediaStream> {
    pub description: String,
    pub location: Option<Coordinates>,
    photo: Option<PhotoFile>,
    camera: Option<CameraSession<S>>,
}

impl<S: MediaStream> Default for StoryDraft<S> {
    fn default() -> Self {
        Self {
            description: String::new(),
            location: None,
            photo: None,
            camera: None,
        }
    }
}

impl<S: MediaStream> StoryDraft<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_camera<D: CaptureDevice<Stream = S>>(
        &mut self,
        device: &D,
    ) -> Result<(), CaptureError> {
        if self.camera.is_none() {
            self.camera = Some(CameraSession::start(device)?);
        }
        Ok(())
    }

    pub fn camera_active(&self) -> bool {
        self.camera.as_ref().is_some_and(CameraSession::is_running)
    }

    /// Take a picture, use it as the story photo and shut the camera
    pub fn capture(&mut self) -> Result<(), CaptureError> {
        let camera = self.camera.as_mut().ok_or(CaptureError::NotRunning)?;
        let photo = camera.capture()?;
        self.photo = Some(photo);
        self.close_camera();
        Ok(())
    }

    pub fn close_camera(&mut self) {
        // CameraSession stops the stream on drop
        self.camera = None;
    }

    pub fn attach_photo(&mut self, photo: PhotoFile) {
        self.photo = Some(photo);
    }

    pub fn photo(&self) -> Option<&PhotoFile> {
        self.photo.as_ref()
    }

    /// Finish the form. The camera is released whether or not this succeeds.
    pub fn into_new_story(mut self) -> Result<NewStory, FormErrors> {
        self.close_camera();
        validate_story(&self.description, self.photo.is_some())?;

        let photo = self.photo.ok_or_else(FormErrors::missing_photo)?;
        Ok(NewStory {
            description: self.description.trim().to_string(),
            photo,
            location: self.location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCamera, FakeStream, photo};

    #[test]
    fn test_capture_sets_photo_and_releases_camera() {
        let camera = FakeCamera::new();
        let mut draft: StoryDraft<FakeStream> = StoryDraft::new();

        draft.start_camera(&camera).unwrap();
        assert!(draft.camera_active());
        draft.capture().unwrap();

        assert!(!draft.camera_active());
        assert_eq!(camera.stops(), 1);
        assert_eq!(draft.photo().unwrap().mime_type, "image/jpeg");
    }

    #[test]
    fn test_submit_releases_open_camera() {
        let camera = FakeCamera::new();
        let mut draft = StoryDraft::new();
        draft.start_camera(&camera).unwrap();
        draft.description = "  beach day ".into();
        draft.attach_photo(photo());

        let story = draft.into_new_story().unwrap();

        assert_eq!(story.description, "beach day");
        assert_eq!(camera.stops(), 1);
    }

    #[test]
    fn test_failed_validation_still_releases_camera() {
        let camera = FakeCamera::new();
        let mut draft = StoryDraft::new();
        draft.start_camera(&camera).unwrap();

        let errors = draft.into_new_story().unwrap_err();

        assert!(errors.get("photo").is_some());
        assert!(errors.get("description").is_some());
        assert_eq!(camera.stops(), 1);
    }

    #[test]
    fn test_abandoned_draft_releases_camera() {
        let camera = FakeCamera::new();
        {
            let mut draft = StoryDraft::new();
            draft.start_camera(&camera).unwrap();
            // Starting twice keeps the one stream
            draft.start_camera(&camera).unwrap();
        }
        assert_eq!(camera.opens(), 1);
        assert_eq!(camera.stops(), 1);
    }
}
