// SPDX-License-Identifier: MPL-2.0

//! Scripted collaborators shared by the unit tests.

use crate::api::{NewStory, Story};
use crate::net::{Fetch, FetchError, Method, Request, Response, StatusCode};
use crate::photo::{CaptureDevice, CaptureError, MediaStream, PhotoFile};
use crate::push::{
    Clients, Permission, PlatformSubscription, PushError, PushPlatform, WindowClient,
};
use crate::router::{Notice, Route, View, ViewRenderer};
use crate::store::{MirrorDb, NewPendingUpload};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tempfile::TempDir;
use tokio::sync::Notify;
use url::Url;

pub fn temp_mirror() -> (TempDir, MirrorDb) {
    let dir = tempfile::tempdir().unwrap();
    let db = MirrorDb::open(dir.path()).unwrap();
    (dir, db)
}

pub fn story(id: &str) -> Story {
    Story {
        id: id.to_string(),
        name: "Tester".to_string(),
        description: format!("story {id}"),
        photo_url: format!("https://cdn.example.com/{id}.jpg"),
        created_at: "2024-05-01T10:00:00.000Z".to_string(),
        location: None,
    }
}

pub fn story_json(id: &str) -> Value {
    serde_json::to_value(story(id)).unwrap()
}

/// A real, decodable 2x2 JPEG
pub fn tiny_jpeg() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(2, 2, image::Rgb([200, 120, 40]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Jpeg).unwrap();
    out.into_inner()
}

pub fn photo() -> PhotoFile {
    PhotoFile::from_bytes("photo.jpg", tiny_jpeg()).unwrap()
}

pub fn new_story(description: &str) -> NewStory {
    NewStory {
        description: description.to_string(),
        photo: photo(),
        location: None,
    }
}

pub fn pending_upload(description: &str) -> NewPendingUpload {
    NewPendingUpload {
        description: description.to_string(),
        photo: photo().to_data_url(),
        location: None,
        timestamp: 1_700_000_000_000,
    }
}

#[derive(Clone)]
enum Reply {
    Respond {
        status: StatusCode,
        content_type: &'static str,
        body: Vec<u8>,
    },
    Fail,
}

/// A network whose replies are scripted per `(method, path)`.
///
/// Each key holds a queue; the last reply repeats once the queue is down to
/// one entry. Unscripted requests get a 404.
#[derive(Default)]
pub struct ScriptedNetwork {
    replies: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    requests: Mutex<Vec<Request>>,
    offline: AtomicBool,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, method: Method, path: &str, reply: Reply) {
        self.replies
            .lock()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    pub fn reply_json(&self, method: Method, path: &str, status: StatusCode, body: Value) {
        self.push(
            method,
            path,
            Reply::Respond {
                status,
                content_type: "application/json",
                body: body.to_string().into_bytes(),
            },
        );
    }

    pub fn reply_bytes(&self, path: &str, status: StatusCode, body: &[u8]) {
        self.push(
            Method::GET,
            path,
            Reply::Respond {
                status,
                content_type: "text/plain",
                body: body.to_vec(),
            },
        );
    }

    pub fn fail(&self, method: Method, path: &str) {
        self.push(method, path, Reply::Fail);
    }

    pub fn ok_stories(&self, ids: &[&str]) {
        let list: Vec<Value> = ids.iter().map(|id| story_json(id)).collect();
        self.reply_json(
            Method::GET,
            "/v1/stories",
            StatusCode::OK,
            json!({"error": false, "message": "Stories fetched successfully", "listStory": list}),
        );
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Requests to `path` wait until the returned handle is notified
    pub fn hold(&self, path: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().insert(path.to_string(), gate.clone());
        gate
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    pub fn requests_to(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method && r.url.path() == path)
            .count()
    }

    fn next_reply(&self, method: &Method, path: &str) -> Option<Reply> {
        let mut replies = self.replies.lock();
        let queue = replies.get_mut(&(method.clone(), path.to_string()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl Fetch for ScriptedNetwork {
    async fn fetch(&self, request: Request) -> Result<Response, FetchError> {
        let path = request.url.path().to_string();
        let method = request.method.clone();
        self.requests.lock().push(request);

        let gate = self.gates.lock().get(&path).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Network("connection refused".into()));
        }

        match self.next_reply(&method, &path) {
            Some(Reply::Respond {
                status,
                content_type,
                body,
            }) => Ok(Response::new(status, body).with_header("content-type", content_type)),
            Some(Reply::Fail) => Err(FetchError::Network("connection reset".into())),
            None => Ok(Response::new(
                StatusCode::NOT_FOUND,
                json!({"error": true, "message": "not found"}).to_string(),
            )),
        }
    }
}

#[derive(Default)]
pub struct RecordingRenderer {
    renders: Mutex<Vec<(Route, View)>>,
    notices: Mutex<Vec<Notice>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn renders(&self) -> Vec<(Route, View)> {
        self.renders.lock().clone()
    }

    pub fn last_route(&self) -> Option<Route> {
        self.renders.lock().last().map(|(route, _)| route.clone())
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }
}

impl ViewRenderer for RecordingRenderer {
    fn render(&self, route: &Route, view: View) {
        self.renders.lock().push((route.clone(), view));
    }

    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}

/// Camera that counts how often it was opened and stopped
#[derive(Default)]
pub struct FakeCamera {
    denied: bool,
    opens: AtomicUsize,
    stops: Arc<AtomicUsize>,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn denied() -> Self {
        Self {
            denied: true,
            ..Self::default()
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

pub struct FakeStream {
    stops: Arc<AtomicUsize>,
}

impl MediaStream for FakeStream {
    fn grab_frame(&mut self) -> Result<image::RgbImage, CaptureError> {
        Ok(image::RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30])))
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

impl CaptureDevice for FakeCamera {
    type Stream = FakeStream;

    fn open(&self) -> Result<FakeStream, CaptureError> {
        if self.denied {
            return Err(CaptureError::PermissionDenied);
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(FakeStream {
            stops: self.stops.clone(),
        })
    }
}

/// In-memory push service
pub struct FakePushPlatform {
    permission: Mutex<Permission>,
    current: Mutex<Option<PlatformSubscription>>,
    created: AtomicUsize,
}

impl FakePushPlatform {
    pub fn new(permission: Permission) -> Self {
        Self {
            permission: Mutex::new(permission),
            current: Mutex::new(None),
            created: AtomicUsize::new(0),
        }
    }

    fn make(endpoint: &str) -> PlatformSubscription {
        PlatformSubscription {
            endpoint: endpoint.to_string(),
            p256dh: vec![4; 65],
            auth: b"auth-secret".to_vec(),
        }
    }

    pub fn preload(&self, endpoint: &str) {
        *self.current.lock() = Some(Self::make(endpoint));
    }

    pub fn current(&self) -> Option<PlatformSubscription> {
        self.current.lock().clone()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl PushPlatform for FakePushPlatform {
    fn permission(&self) -> Permission {
        *self.permission.lock()
    }

    async fn request_permission(&self) -> Permission {
        let mut permission = self.permission.lock();
        if *permission == Permission::Default {
            *permission = Permission::Granted;
        }
        *permission
    }

    async fn subscription(&self) -> Result<Option<PlatformSubscription>, PushError> {
        Ok(self.current())
    }

    async fn subscribe(
        &self,
        application_server_key: &[u8],
    ) -> Result<PlatformSubscription, PushError> {
        if application_server_key.is_empty() {
            return Err(PushError::InvalidKey("empty".into()));
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let subscription = Self::make(&format!("https://push.example/sub-{n}"));
        *self.current.lock() = Some(subscription.clone());
        Ok(subscription)
    }

    async fn unsubscribe(&self, subscription: &PlatformSubscription) -> Result<(), PushError> {
        let mut current = self.current.lock();
        if current.as_ref() == Some(subscription) {
            *current = None;
        }
        Ok(())
    }
}

pub struct FakeClients {
    windows: Vec<WindowClient>,
    focused: Mutex<Vec<u64>>,
    opened: Mutex<Vec<Url>>,
}

impl FakeClients {
    pub fn with_windows(windows: Vec<WindowClient>) -> Self {
        Self {
            windows,
            focused: Mutex::new(Vec::new()),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn focused(&self) -> Vec<u64> {
        self.focused.lock().clone()
    }

    pub fn opened(&self) -> Vec<Url> {
        self.opened.lock().clone()
    }
}

impl Clients for FakeClients {
    fn windows(&self) -> Vec<WindowClient> {
        self.windows.clone()
    }

    fn focus(&self, id: u64) -> Result<(), PushError> {
        self.focused.lock().push(id);
        Ok(())
    }

    fn open_window(&self, url: &Url) -> Result<(), PushError> {
        self.opened.lock().push(url.clone());
        Ok(())
    }
}
