// SPDX-License-Identifier: MPL-2.0

use std::time::Duration;
use url::Url;

pub const APP_ID: &str = "io.github.storyline.Storyline";
pub const APP_NAME: &str = "Story App";

pub const DEFAULT_API_BASE: &str = "https://story-api.dicoding.dev/v1";
/// Where the application shell (static assets) is served from
pub const DEFAULT_SHELL_URL: &str = "http://localhost:8080/story-app/";

/// Any first-party request whose path contains this segment is an API call
pub const API_PATH_SEGMENT: &str = "/v1/";

/// Durable asset cache holding the application shell
pub const CACHE_NAME: &str = "story-app-v1";
/// Responses picked up at runtime (API mirrors, late static assets)
pub const RUNTIME_CACHE: &str = "story-app-runtime-v1";

/// Application shell files, relative to the shell URL
pub const STATIC_ASSETS: &[&str] = &[
    "",
    "index.html",
    "src/css/styles.css",
    "src/scripts/app.js",
    "src/scripts/pages.js",
    "src/assets/icon-192x192.png",
    "manifest.json",
];

/// Application server key used when creating platform push subscriptions
pub const VAPID_PUBLIC_KEY: &str =
    "BCCs2eonMI-6H2ctvFaWg-UYdDv387Vno_bzUzALpB442r2lCnsHmtrx8biyPi_E-1fSGABK_Qs_GlvPoJJqxbk";

pub const NOTIFICATION_ICON: &str = "/src/assets/icon-192x192.png";
pub const NOTIFICATION_TAG: &str = "story-notification";

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Upper bound on a story photo, checked before any upload or queueing
pub const MAX_PHOTO_BYTES: usize = 1024 * 1024;

/// How long `wait_for_online` waits before reporting not-online
pub const ONLINE_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolve the static manifest against the shell URL
pub fn static_manifest(shell: &Url) -> Result<Vec<Url>, url::ParseError> {
    STATIC_ASSETS.iter().map(|asset| shell.join(asset)).collect()
}
