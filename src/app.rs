// SPDX-License-Identifier: MPL-2.0

//! The application context: every component, wired once and passed around
//! explicitly. This is what the presentation layer drives.

use crate::api::{ClientError, ListQuery, NewStory, Story, StoryClient};
use crate::config::DEFAULT_PAGE_SIZE;
use crate::net::{Connectivity, Fetch, ResponseSource};
use crate::photo::PhotoError;
use crate::push::PushError;
use crate::router::{Freshness, Navigator, Notice, Route, StoryCard, View, ViewRenderer};
use crate::state::{Session, SessionError, SessionGate};
use crate::store::{
    FavoriteStore, MirrorDb, NewPendingUpload, PendingStore, PendingUpload, StoreError,
    StoryStore,
};
use crate::sync::{SyncError, SyncReconciler, SyncReport};
use crate::validate::{FormErrors, validate_login, validate_registration};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Push(#[from] PushError),
    #[error(transparent)]
    Photo(#[from] PhotoError),
    #[error("{0}")]
    Validation(#[from] FormErrors),
    #[error("story {0} not found")]
    StoryNotFound(String),
    #[error("please sign in first")]
    NotAuthenticated,
}

/// What happened to a submitted story
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Accepted by the server, carries its message
    Published(String),
    /// Offline; queued under this local id
    Queued(i64),
}

pub struct StoryApp<F, R> {
    db: MirrorDb,
    client: Arc<StoryClient<F>>,
    session: Arc<SessionGate>,
    reconciler: SyncReconciler<F>,
    connectivity: Connectivity,
    navigator: Navigator,
    renderer: R,
    page_size: u32,
}

impl<F: Fetch, R: ViewRenderer> StoryApp<F, R> {
    pub fn new(
        db: MirrorDb,
        client: Arc<StoryClient<F>>,
        session: Arc<SessionGate>,
        connectivity: Connectivity,
        renderer: R,
    ) -> Self {
        let reconciler = SyncReconciler::new(db.clone(), client.clone(), session.clone());
        Self {
            db,
            client,
            session,
            reconciler,
            connectivity,
            navigator: Navigator::new(),
            renderer,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn session(&self) -> &SessionGate {
        &self.session
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn current_route(&self) -> Option<Route> {
        self.navigator.current_route()
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<String, AppError> {
        validate_registration(name, email, password)?;
        let message = self
            .client
            .register(name.trim(), email.trim(), password.trim())
            .await?;
        info!(email = email.trim(), "registered");
        Ok(message)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AppError> {
        validate_login(email, password)?;
        let result = self.client.login(email.trim(), password.trim()).await?;
        Ok(self.session.sign_in(&result, email.trim())?)
    }

    pub fn logout(&self) -> Result<(), AppError> {
        self.session.sign_out()?;
        Ok(())
    }

    /// Show `route`, or wherever the session gate sends us instead.
    ///
    /// If another navigation starts while this one is loading, the result is
    /// dropped rather than rendered.
    pub async fn navigate(&self, route: Route) -> Result<Route, AppError> {
        let target = self.session.authorize(&route);
        if target != route {
            info!(from = %route, to = %target, "redirected");
        }

        let ticket = self.navigator.begin(target.clone());
        let loaded = self.load_view(&target).await;

        if !self.navigator.is_current(&ticket) {
            debug!(route = %ticket.route(), "discarding stale view");
            return Ok(target);
        }

        match loaded {
            Ok(view) => {
                if matches!(
                    view,
                    View::Stories {
                        freshness: Freshness::Mirror,
                        ..
                    }
                ) {
                    self.renderer.notify(Notice::Success(
                        "Showing cached stories (offline mode)".to_string(),
                    ));
                }
                self.renderer.render(&target, view);
                Ok(target)
            }
            Err(e) => {
                self.renderer.notify(Notice::Error(e.to_string()));
                Err(e)
            }
        }
    }

    async fn load_view(&self, route: &Route) -> Result<View, AppError> {
        match route {
            Route::Home => {
                let (stories, freshness) = self.load_stories().await?;
                let favorites = self.favorite_ids();
                let cards = stories
                    .iter()
                    .map(|s| StoryCard::from_story(s, favorites.contains(&s.id)))
                    .collect();
                Ok(View::Stories { cards, freshness })
            }
            Route::StoryDetail(id) => {
                let (story, freshness) = self.story_detail(id).await?;
                let favorite = self.favorite_ids().contains(&story.id);
                Ok(View::StoryDetail {
                    story,
                    favorite,
                    freshness,
                })
            }
            Route::Favorites => {
                let cards = self
                    .favorites()?
                    .iter()
                    .map(|s| StoryCard::from_story(s, true))
                    .collect();
                Ok(View::Favorites(cards))
            }
            Route::AddStory => Ok(View::AddStory {
                pending: self.db.run(|db| PendingStore::new(db).count()).await?,
            }),
            Route::Login => Ok(View::Login),
            Route::Register => Ok(View::Register),
        }
    }

    /// First page of stories, live when possible.
    ///
    /// A live list replaces the whole story mirror. When the network is
    /// unreachable the mirror is served as-is.
    pub async fn load_stories(&self) -> Result<(Vec<Story>, Freshness), AppError> {
        let token = self.session.token().ok_or(AppError::NotAuthenticated)?;
        let query = ListQuery {
            size: self.page_size,
            ..ListQuery::default()
        };

        match self.client.list_stories(&token, &query).await {
            Ok(fetched) if fetched.source == ResponseSource::Network => {
                let stories = fetched.value.clone();
                let mirrored = self
                    .db
                    .run(move |db| StoryStore::new(db).replace_all(&stories))
                    .await;
                if let Err(e) = mirrored {
                    warn!("failed to mirror stories: {}", e);
                }
                Ok((fetched.value, Freshness::Live))
            }
            Ok(fetched) => Ok((fetched.value, Freshness::Mirror)),
            Err(e) if e.is_network() => {
                warn!("story list unreachable, reading mirror: {}", e);
                let stories = self.db.run(|db| StoryStore::new(db).all()).await?;
                Ok((stories, Freshness::Mirror))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// One story, falling back to the mirror and then favorites when offline.
    ///
    /// A live fetch is written into the mirror so the story stays readable
    /// offline even when it was never on a list page.
    pub async fn story_detail(&self, id: &str) -> Result<(Story, Freshness), AppError> {
        let token = self.session.token().ok_or(AppError::NotAuthenticated)?;

        match self.client.get_story(&token, id).await {
            Ok(fetched) if fetched.source == ResponseSource::Network => {
                let story = fetched.value.clone();
                let mirrored = self.db.run(move |db| StoryStore::new(db).put(&story)).await;
                if let Err(e) = mirrored {
                    warn!(id, "failed to mirror story: {}", e);
                }
                Ok((fetched.value, Freshness::Live))
            }
            Ok(fetched) => Ok((fetched.value, Freshness::Mirror)),
            Err(e) if e.is_network() => {
                warn!(id, "story unreachable, reading mirror: {}", e);
                let story = self.mirrored_story(id).await?;
                Ok((story, Freshness::Mirror))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn mirrored_story(&self, id: &str) -> Result<Story, AppError> {
        let key = id.to_string();
        let found = self
            .db
            .run(move |db| {
                match StoryStore::new(db).get(&key) {
                    Ok(story) => return Ok(Some(story)),
                    Err(StoreError::NotFound) => {}
                    Err(e) => return Err(e),
                }
                match FavoriteStore::new(db).get(&key) {
                    Ok(story) => Ok(Some(story)),
                    Err(StoreError::NotFound) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .await?;

        found.ok_or_else(|| AppError::StoryNotFound(id.to_string()))
    }

    fn favorite_ids(&self) -> HashSet<String> {
        match FavoriteStore::new(&self.db).all() {
            Ok(stories) => stories.into_iter().map(|s| s.id).collect(),
            Err(e) => {
                warn!("failed to read favorites: {}", e);
                HashSet::new()
            }
        }
    }

    pub fn is_favorite(&self, id: &str) -> Result<bool, AppError> {
        Ok(FavoriteStore::new(&self.db).contains(id)?)
    }

    /// Add if absent, remove if present. Returns whether it is now a favorite.
    pub fn toggle_favorite(&self, story: &Story) -> Result<bool, AppError> {
        let favorites = FavoriteStore::new(&self.db);
        if favorites.contains(&story.id)? {
            favorites.remove(&story.id)?;
            info!(id = %story.id, "favorite removed");
            Ok(false)
        } else {
            favorites.put(story)?;
            info!(id = %story.id, "favorite added");
            Ok(true)
        }
    }

    pub async fn toggle_favorite_by_id(&self, id: &str) -> Result<bool, AppError> {
        if self.is_favorite(id)? {
            FavoriteStore::new(&self.db).remove(id)?;
            info!(id, "favorite removed");
            return Ok(false);
        }

        let (story, _) = self.story_detail(id).await?;
        self.toggle_favorite(&story)
    }

    pub fn favorites(&self) -> Result<Vec<Story>, AppError> {
        Ok(FavoriteStore::new(&self.db).all()?)
    }

    /// Post a story.
    ///
    /// Signed in and offline, the story is queued for the reconciler. Guests
    /// post through the guest endpoint and are never queued.
    pub async fn submit_story(&self, story: NewStory) -> Result<SubmitOutcome, AppError> {
        let Some(token) = self.session.token() else {
            let message = self.client.create_story_guest(&story).await?;
            info!("guest story published");
            self.renderer.notify(Notice::Success(message.clone()));
            return Ok(SubmitOutcome::Published(message));
        };

        if !self.connectivity.is_online() {
            return self.enqueue(story).await;
        }

        match self.client.create_story(&token, &story).await {
            Ok(message) => {
                // Next list fetch repopulates it
                if let Err(e) = self.db.run(|db| StoryStore::new(db).clear()).await {
                    warn!("failed to clear story mirror: {}", e);
                }
                info!("story published");
                self.renderer.notify(Notice::Success(message.clone()));
                Ok(SubmitOutcome::Published(message))
            }
            Err(e) if e.is_network() => {
                warn!("submit failed offline, queueing: {}", e);
                self.connectivity.set_online(false);
                self.enqueue(story).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn enqueue(&self, story: NewStory) -> Result<SubmitOutcome, AppError> {
        let upload = NewPendingUpload {
            photo: story.photo.to_data_url(),
            description: story.description,
            location: story.location,
            timestamp: MirrorDb::now_millis(),
        };
        let id = self
            .db
            .run(move |db| PendingStore::new(db).add(&upload))
            .await?;

        info!(id, "story queued for upload");
        self.renderer.notify(Notice::Success(
            "You are offline. The story will be uploaded when you are back online".to_string(),
        ));
        Ok(SubmitOutcome::Queued(id))
    }

    pub fn pending_uploads(&self) -> Result<Vec<PendingUpload>, AppError> {
        Ok(PendingStore::new(&self.db).all()?)
    }

    /// Drain the pending queue, then refresh a story-backed view
    pub async fn sync_now(&self) -> Result<SyncReport, AppError> {
        let report = self.reconciler.drain().await?;

        if report.synced > 0 {
            self.renderer.notify(Notice::Success(format!(
                "Synced {} offline upload(s)",
                report.synced
            )));
        }

        if let Some(route) = self.navigator.current_route()
            && route.depends_on_stories()
            && let Err(e) = self.navigate(route).await
        {
            warn!("refresh after sync failed: {}", e);
        }

        Ok(report)
    }

    pub async fn handle_back_online(&self) -> Result<SyncReport, AppError> {
        self.renderer
            .notify(Notice::Success("You are back online".to_string()));
        self.sync_now().await
    }

    /// React to connectivity transitions until the state channel closes
    pub async fn watch_connectivity(&self) {
        let mut rx = self.connectivity.subscribe();
        let mut was_online = *rx.borrow_and_update();

        while rx.changed().await.is_ok() {
            let online = *rx.borrow_and_update();
            if online == was_online {
                continue;
            }
            was_online = online;

            if online {
                if let Err(e) = self.handle_back_online().await {
                    warn!("sync after reconnect failed: {}", e);
                    self.renderer.notify(Notice::Error(e.to_string()));
                }
            } else {
                self.renderer.notify(Notice::Success(
                    "You are offline - some features are limited".to_string(),
                ));
            }
        }
    }
}
