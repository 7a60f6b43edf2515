//! In-process session state with change notification.
//!
//! [`Session`] owns everything the UI layer reads: the signed-in user,
//! selected music ids and style tags, gender, the accumulated cloth
//! results, the music catalog, and transient flags. It is shared as an
//! `Arc<Session>` and handed to every service explicitly.
//!
//! Every mutation is applied synchronously under a lock and then announced
//! on a broadcast channel. Observers call [`Session::subscribe`] and drop
//! the receiver to unsubscribe.
//!
//! Interleaved calls from two tasks are not serialized beyond the single
//! mutation: two concurrent samplings both append their batch, in whatever
//! order they finish.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::broadcast;

use crate::error::{Error, Result};
use crate::models::{MirroredSample, MusicTrack, GENDER_NONE};

const EVENT_CAPACITY: usize = 64;

/// Notification sent after a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    UserChanged(Option<String>),
    MusicIdsChanged,
    StyleTagsChanged,
    GenderChanged(String),
    ClothChanged { batches: usize },
    MusicCatalogChanged { tracks: usize },
    LoadingChanged(bool),
    NewUserChanged(bool),
}

/// Plain snapshot of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub user: Option<String>,
    pub music_ids: Vec<u32>,
    pub style_tags: Vec<String>,
    pub gender: String,
    /// One inner list per sampling call, in completion order.
    pub cloth_batches: Vec<Vec<MirroredSample>>,
    pub music_catalog: Vec<MusicTrack>,
    pub loading: bool,
    pub new_user: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            music_ids: Vec::new(),
            style_tags: Vec::new(),
            gender: GENDER_NONE.to_string(),
            cloth_batches: Vec::new(),
            music_catalog: Vec::new(),
            loading: false,
            new_user: false,
        }
    }
}

pub struct Session {
    state: RwLock<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: RwLock::new(SessionState::default()),
            events,
        }
    }

    /// Receive every [`SessionEvent`] emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.read().clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut SessionState) -> (T, Option<SessionEvent>)) -> T {
        let (out, event) = {
            let mut guard: RwLockWriteGuard<'_, SessionState> =
                self.state.write().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        };
        if let Some(event) = event {
            // No receivers is fine.
            let _ = self.events.send(event);
        }
        out
    }

    // ── user ──────────────────────────────────────────────────────────

    pub fn user_id(&self) -> Option<String> {
        self.read().user.clone()
    }

    /// The signed-in user id, or [`Error::AuthenticationRequired`].
    pub fn require_user(&self) -> Result<String> {
        self.user_id().ok_or(Error::AuthenticationRequired)
    }

    pub fn set_user(&self, id: impl Into<String>) {
        let id = id.into();
        self.mutate(|s| {
            s.user = Some(id.clone());
            ((), Some(SessionEvent::UserChanged(Some(id))))
        })
    }

    /// Forget the user and reset selections and gender to their defaults.
    pub fn sign_out(&self) {
        self.mutate(|s| {
            s.user = None;
            s.music_ids.clear();
            s.style_tags.clear();
            s.gender = GENDER_NONE.to_string();
            ((), Some(SessionEvent::UserChanged(None)))
        })
    }

    // ── selections ────────────────────────────────────────────────────

    pub fn music_ids(&self) -> Vec<u32> {
        self.read().music_ids.clone()
    }

    /// Append a music id. Duplicates are kept; callers dedupe if needed.
    pub fn add_music(&self, id: u32) {
        self.mutate(|s| {
            s.music_ids.push(id);
            ((), Some(SessionEvent::MusicIdsChanged))
        })
    }

    /// Remove every occurrence of `id`.
    pub fn remove_music(&self, id: u32) {
        self.mutate(|s| {
            s.music_ids.retain(|m| *m != id);
            ((), Some(SessionEvent::MusicIdsChanged))
        })
    }

    pub fn set_music_ids(&self, ids: Vec<u32>) {
        self.mutate(|s| {
            s.music_ids = ids;
            ((), Some(SessionEvent::MusicIdsChanged))
        })
    }

    pub fn style_tags(&self) -> Vec<String> {
        self.read().style_tags.clone()
    }

    pub fn add_style_tag(&self, tag: impl Into<String>) {
        let tag = tag.into();
        self.mutate(|s| {
            s.style_tags.push(tag);
            ((), Some(SessionEvent::StyleTagsChanged))
        })
    }

    pub fn set_style_tags(&self, tags: Vec<String>) {
        self.mutate(|s| {
            s.style_tags = tags;
            ((), Some(SessionEvent::StyleTagsChanged))
        })
    }

    pub fn gender(&self) -> String {
        self.read().gender.clone()
    }

    pub fn set_gender(&self, gender: impl Into<String>) {
        let gender = gender.into();
        self.mutate(|s| {
            s.gender = gender.clone();
            ((), Some(SessionEvent::GenderChanged(gender)))
        })
    }

    // ── results ───────────────────────────────────────────────────────

    pub fn cloth_batches(&self) -> Vec<Vec<MirroredSample>> {
        self.read().cloth_batches.clone()
    }

    /// Append one sampling call's results as a single entry.
    pub fn push_cloth_batch(&self, batch: Vec<MirroredSample>) {
        self.mutate(|s| {
            s.cloth_batches.push(batch);
            let n = s.cloth_batches.len();
            ((), Some(SessionEvent::ClothChanged { batches: n }))
        })
    }

    /// Remove every batch equal to `batch`.
    pub fn remove_cloth_batch(&self, batch: &[MirroredSample]) {
        self.mutate(|s| {
            s.cloth_batches.retain(|b| b.as_slice() != batch);
            let n = s.cloth_batches.len();
            ((), Some(SessionEvent::ClothChanged { batches: n }))
        })
    }

    pub fn music_catalog(&self) -> Vec<MusicTrack> {
        self.read().music_catalog.clone()
    }

    pub fn set_music_catalog(&self, tracks: Vec<MusicTrack>) {
        self.mutate(|s| {
            s.music_catalog = tracks;
            let n = s.music_catalog.len();
            ((), Some(SessionEvent::MusicCatalogChanged { tracks: n }))
        })
    }

    // ── flags ─────────────────────────────────────────────────────────

    pub fn is_loading(&self) -> bool {
        self.read().loading
    }

    /// Raise the loading flag until the returned guard is dropped.
    pub fn begin_loading(&self) -> LoadingGuard<'_> {
        self.set_loading(true);
        LoadingGuard { session: self }
    }

    fn set_loading(&self, loading: bool) {
        self.mutate(|s| {
            let changed = s.loading != loading;
            s.loading = loading;
            ((), changed.then_some(SessionEvent::LoadingChanged(loading)))
        })
    }

    pub fn is_new_user(&self) -> bool {
        self.read().new_user
    }

    pub fn set_new_user(&self, new_user: bool) {
        self.mutate(|s| {
            s.new_user = new_user;
            ((), Some(SessionEvent::NewUserChanged(new_user)))
        })
    }
}

/// Clears the session's loading flag on drop, on every exit path.
#[must_use = "the loading flag is cleared as soon as the guard is dropped"]
pub struct LoadingGuard<'a> {
    session: &'a Session,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.session.set_loading(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str) -> MirroredSample {
        MirroredSample {
            img_id: id.to_string(),
            img_url: format!("https://cdn/{}.jpg", id),
            web_url: String::new(),
        }
    }

    #[test]
    fn defaults() {
        let s = Session::new();
        let snap = s.snapshot();
        assert_eq!(snap.user, None);
        assert_eq!(snap.gender, "none");
        assert!(!snap.loading);
        assert!(matches!(s.require_user(), Err(Error::AuthenticationRequired)));
    }

    #[test]
    fn sign_out_resets_selections() {
        let s = Session::new();
        s.set_user("u1");
        s.add_music(4);
        s.add_style_tag("casual");
        s.set_gender("f");
        s.push_cloth_batch(vec![sample("1")]);

        s.sign_out();
        let snap = s.snapshot();
        assert_eq!(snap.user, None);
        assert!(snap.music_ids.is_empty());
        assert!(snap.style_tags.is_empty());
        assert_eq!(snap.gender, "none");
        // Results are not part of the user's selections.
        assert_eq!(snap.cloth_batches.len(), 1);
    }

    #[test]
    fn music_ids_keep_duplicates_and_remove_all() {
        let s = Session::new();
        s.add_music(3);
        s.add_music(5);
        s.add_music(3);
        assert_eq!(s.music_ids(), vec![3, 5, 3]);
        s.remove_music(3);
        assert_eq!(s.music_ids(), vec![5]);
    }

    #[test]
    fn cloth_batches_stay_nested() {
        let s = Session::new();
        s.push_cloth_batch(vec![sample("1"), sample("2")]);
        s.push_cloth_batch(vec![sample("9")]);
        assert_eq!(s.cloth_batches().len(), 2);

        s.remove_cloth_batch(&[sample("9")]);
        assert_eq!(s.cloth_batches(), vec![vec![sample("1"), sample("2")]]);
    }

    #[test]
    fn loading_guard_resets_on_drop() {
        let s = Session::new();
        {
            let _guard = s.begin_loading();
            assert!(s.is_loading());
        }
        assert!(!s.is_loading());
    }

    #[tokio::test]
    async fn subscribers_see_mutations_in_order() {
        let s = Session::new();
        let mut rx = s.subscribe();

        s.set_user("u1");
        s.set_gender("m");
        {
            let _g = s.begin_loading();
        }

        assert_eq!(rx.recv().await.unwrap(), SessionEvent::UserChanged(Some("u1".into())));
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::GenderChanged("m".into()));
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::LoadingChanged(true));
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::LoadingChanged(false));
    }
}
