// SPDX-License-Identifier: MPL-2.0

//! Routes, the view contract handed to the presentation layer, and the
//! navigation generations that keep stale loads from rendering.

use crate::api::{Coordinates, Story};
use crate::validate::{PREVIEW_LEN, truncate_text};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login,
    Register,
    AddStory,
    StoryDetail(String),
    Favorites,
}

impl Route {
    /// Accepts `#/story/abc`, `/favorites?x=1`, `` (home), ...
    pub fn parse(path: &str) -> Option<Route> {
        let path = path.trim_start_matches('#');
        let path = path.split('?').next().unwrap_or_default();

        match path {
            "" | "/" => Some(Route::Home),
            "/login" => Some(Route::Login),
            "/register" => Some(Route::Register),
            "/add" => Some(Route::AddStory),
            "/favorites" => Some(Route::Favorites),
            other => other
                .strip_prefix("/story/")
                .filter(|id| !id.is_empty() && !id.contains('/'))
                .map(|id| Route::StoryDetail(id.to_string())),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Login => "/login".to_string(),
            Route::Register => "/register".to_string(),
            Route::AddStory => "/add".to_string(),
            Route::StoryDetail(id) => format!("/story/{id}"),
            Route::Favorites => "/favorites".to_string(),
        }
    }

    /// Needs a session
    pub fn is_protected(&self) -> bool {
        !self.is_guest_only()
    }

    /// Pointless with a session (login, register)
    pub fn is_guest_only(&self) -> bool {
        matches!(self, Route::Login | Route::Register)
    }

    /// Shows the story collection, so it refreshes after a sync
    pub fn depends_on_stories(&self) -> bool {
        matches!(self, Route::Home)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Where the data behind a view came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Live,
    /// Local mirror, the network was unreachable
    Mirror,
}

/// A story as shown in a list
#[derive(Debug, Clone, PartialEq)]
pub struct StoryCard {
    pub id: String,
    pub name: String,
    pub preview: String,
    pub photo_url: String,
    pub created_at: String,
    pub location: Option<Coordinates>,
    pub favorite: bool,
}

impl StoryCard {
    pub fn from_story(story: &Story, favorite: bool) -> Self {
        Self {
            id: story.id.clone(),
            name: story.name.clone(),
            preview: truncate_text(&story.description, PREVIEW_LEN),
            photo_url: story.photo_url.clone(),
            created_at: story.created_at.clone(),
            location: story.location,
            favorite,
        }
    }
}

/// Data handed to the presentation layer for one route
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Stories {
        cards: Vec<StoryCard>,
        freshness: Freshness,
    },
    StoryDetail {
        story: Story,
        favorite: bool,
        freshness: Freshness,
    },
    Favorites(Vec<StoryCard>),
    AddStory {
        pending: usize,
    },
    Login,
    Register,
}

/// Transient toast-style message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

/// Implemented by whatever draws views
pub trait ViewRenderer: Send + Sync {
    fn render(&self, route: &Route, view: View);
    fn notify(&self, notice: Notice);
}

impl<R: ViewRenderer> ViewRenderer for Arc<R> {
    fn render(&self, route: &Route, view: View) {
        (**self).render(route, view)
    }

    fn notify(&self, notice: Notice) {
        (**self).notify(notice)
    }
}

/// Issued when a navigation starts; only the latest ticket may render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewTicket {
    generation: u64,
    route: Route,
}

impl ViewTicket {
    pub fn route(&self) -> &Route {
        &self.route
    }
}

#[derive(Default)]
pub struct Navigator {
    generation: AtomicU64,
    current: Mutex<Option<Route>>,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a navigation, invalidating every earlier ticket
    pub fn begin(&self, route: Route) -> ViewTicket {
        let mut current = self.current.lock();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *current = Some(route.clone());
        ViewTicket { generation, route }
    }

    pub fn is_current(&self, ticket: &ViewTicket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.generation
    }

    pub fn current_route(&self) -> Option<Route> {
        self.current.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::story;

    #[test]
    fn test_parse_routes() {
        assert_eq!(Route::parse("#/"), Some(Route::Home));
        assert_eq!(Route::parse(""), Some(Route::Home));
        assert_eq!(Route::parse("/favorites?tab=1"), Some(Route::Favorites));
        assert_eq!(
            Route::parse("#/story/story-abc"),
            Some(Route::StoryDetail("story-abc".into()))
        );
        assert_eq!(Route::parse("/story/"), None);
        assert_eq!(Route::parse("/nowhere"), None);
    }

    #[test]
    fn test_path_parses_back() {
        for route in [
            Route::Home,
            Route::Login,
            Route::Register,
            Route::AddStory,
            Route::StoryDetail("x".into()),
            Route::Favorites,
        ] {
            assert_eq!(Route::parse(&route.path()), Some(route));
        }
    }

    #[test]
    fn test_protection() {
        assert!(Route::Home.is_protected());
        assert!(Route::AddStory.is_protected());
        assert!(!Route::Login.is_protected());
        assert!(Route::Register.is_guest_only());
    }

    #[test]
    fn test_newer_navigation_invalidates_older_ticket() {
        let navigator = Navigator::new();
        let first = navigator.begin(Route::Home);
        let second = navigator.begin(Route::Favorites);

        assert!(!navigator.is_current(&first));
        assert!(navigator.is_current(&second));
        assert_eq!(navigator.current_route(), Some(Route::Favorites));
    }

    #[test]
    fn test_story_card_preview_is_truncated() {
        let mut long = story("a");
        long.description = "x".repeat(150);

        let card = StoryCard::from_story(&long, true);
        assert_eq!(card.preview.len(), PREVIEW_LEN + 3);
        assert!(card.favorite);
    }
}
