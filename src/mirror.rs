//! Per-user state persistence.
//!
//! [`UserStateMirror`] moves the user's selections between the session and
//! the `prototype-data/{user}` document, and republishes previously
//! mirrored samples and the music catalog into the session.
//!
//! | Operation | Store effect |
//! |-----------|--------------|
//! | [`load`](UserStateMirror::load) | read `prototype-data/{user}` (+ sub-collections, `music-data`) |
//! | [`save`](UserStateMirror::save) | overwrite `prototype-data/{user}` |
//! | [`add_garment`](UserStateMirror::add_garment) | array-union into `cloth` |

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{error, info};

use crate::error::{Error, Result};
use crate::models::{MirroredSample, MusicTrack, StoredSelection, UserSelection};
use crate::session::Session;
use crate::store::{get_as, paths, DocumentStore};

/// What [`UserStateMirror::load`] should pull in besides the user document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Republish mirrored samples for each style tag and load the music
    /// catalog.
    pub with_catalog: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Whether the user document existed.
    pub found: bool,
    /// Styles whose mirrored samples were republished.
    pub styles_restored: Vec<String>,
    pub tracks_loaded: usize,
}

pub struct UserStateMirror {
    store: Arc<dyn DocumentStore>,
    session: Arc<Session>,
}

impl UserStateMirror {
    pub fn new(store: Arc<dyn DocumentStore>, session: Arc<Session>) -> Self {
        Self { store, session }
    }

    /// Copy the stored selection into the session.
    ///
    /// Fields absent from the document leave the session untouched; a
    /// field of the wrong type fails the load. A missing document is not
    /// an error.
    pub async fn load(&self, options: LoadOptions) -> Result<LoadReport> {
        let _loading = self.session.begin_loading();
        self.load_inner(options).await.map_err(|e| {
            error!(error = %e, "loading user state failed");
            e
        })
    }

    async fn load_inner(&self, options: LoadOptions) -> Result<LoadReport> {
        let user = self.session.require_user()?;
        let mut report = LoadReport::default();

        match get_as::<StoredSelection>(self.store.as_ref(), &paths::user_doc(&user)?).await? {
            Some(stored) => {
                report.found = true;
                if let Some(ids) = stored.music_ids {
                    self.session.set_music_ids(ids);
                }
                if let Some(tags) = stored.style_tags {
                    self.session.set_style_tags(tags);
                }
                if let Some(gender) = stored.gender {
                    self.session.set_gender(gender);
                }
            }
            None => info!(user = %user, "no stored selection for user"),
        }

        if options.with_catalog {
            let mut seen = HashSet::new();
            for style in self.session.style_tags() {
                if style.is_empty() || !seen.insert(style.clone()) {
                    continue;
                }
                let batch = self.mirrored_samples(&user, &style).await?;
                if !batch.is_empty() {
                    self.session.push_cloth_batch(batch);
                    report.styles_restored.push(style);
                }
            }
            report.tracks_loaded = self.load_music_catalog().await?.len();
        }

        info!(
            user = %user,
            found = report.found,
            styles = report.styles_restored.len(),
            tracks = report.tracks_loaded,
            "user state loaded"
        );
        Ok(report)
    }

    /// Overwrite the user document with the session's current selections.
    /// The garment list is reset to empty.
    pub async fn save(&self) -> Result<()> {
        let _loading = self.session.begin_loading();
        let result = async {
            let user = self.session.require_user()?;
            let snap = self.session.snapshot();
            let selection = UserSelection {
                music_ids: snap.music_ids,
                style_tags: snap.style_tags,
                gender: snap.gender,
                cloth: Vec::new(),
            };
            self.store
                .set(&paths::user_doc(&user)?, serde_json::to_value(&selection)?)
                .await?;
            info!(user = %user, "user state saved");
            Ok::<(), Error>(())
        }
        .await;
        if let Err(ref e) = result {
            error!(error = %e, "saving user state failed");
        }
        result
    }

    /// Append `item` to the user's garment list unless an identical entry
    /// is already there. The user document must exist.
    pub async fn add_garment(&self, item: &MirroredSample) -> Result<()> {
        let _loading = self.session.begin_loading();
        let result = async {
            let user = self.session.require_user()?;
            self.store
                .array_union(&paths::user_doc(&user)?, "cloth", serde_json::to_value(item)?)
                .await?;
            info!(user = %user, img_id = %item.img_id, "garment added");
            Ok::<(), Error>(())
        }
        .await;
        if let Err(ref e) = result {
            error!(error = %e, "adding garment failed");
        }
        result
    }

    /// Read `prototype-data/{user}/{style}` in index order.
    pub async fn mirrored_samples(&self, user: &str, style: &str) -> Result<Vec<MirroredSample>> {
        let coll = paths::user_style_collection(user, style)?;
        self.store
            .list(&coll)
            .await?
            .into_iter()
            .map(|(id, body)| {
                serde_json::from_value(body)
                    .map_err(|e| Error::InvalidData(format!("{}/{}: {}", coll, id, e)))
            })
            .collect()
    }

    /// Read the whole `music-data` collection into the session.
    pub async fn load_music_catalog(&self) -> Result<Vec<MusicTrack>> {
        let coll = paths::music_collection()?;
        let tracks = self
            .store
            .list(&coll)
            .await?
            .into_iter()
            .map(|(id, body)| {
                let mut track: MusicTrack = serde_json::from_value(body)
                    .map_err(|e| Error::InvalidData(format!("{}/{}: {}", coll, id, e)))?;
                track.index = id.parse().map_err(|_| {
                    Error::InvalidData(format!("{}/{}: non-numeric track id", coll, id))
                })?;
                Ok(track)
            })
            .collect::<Result<Vec<_>>>()?;
        self.session.set_music_catalog(tracks.clone());
        Ok(tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::store::memory::InMemoryStore;

    fn setup() -> (Arc<InMemoryStore>, Arc<Session>, UserStateMirror) {
        let store = Arc::new(InMemoryStore::new());
        let session = Arc::new(Session::new());
        session.set_user("u1");
        let mirror = UserStateMirror::new(store.clone(), session.clone());
        (store, session, mirror)
    }

    fn garment(id: &str) -> MirroredSample {
        MirroredSample {
            img_id: id.to_string(),
            img_url: format!("https://cdn/{}.jpg", id),
            web_url: format!("https://shop/{}", id),
        }
    }

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let (_store, session, mirror) = setup();
        session.set_music_ids(vec![15, 22, 15]);
        session.set_style_tags(vec!["casual".into(), "street".into()]);
        session.set_gender("f");
        mirror.save().await.unwrap();

        session.set_music_ids(vec![]);
        session.set_style_tags(vec![]);
        session.set_gender("none");

        let report = mirror.load(LoadOptions::default()).await.unwrap();
        assert!(report.found);
        assert_eq!(session.music_ids(), vec![15, 22, 15]);
        assert_eq!(session.style_tags(), vec!["casual", "street"]);
        assert_eq!(session.gender(), "f");
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn save_overwrites_garments() {
        let (store, _session, mirror) = setup();
        mirror.save().await.unwrap();
        mirror.add_garment(&garment("3")).await.unwrap();
        mirror.save().await.unwrap();

        let doc = store.get(&paths::user_doc("u1").unwrap()).await.unwrap().unwrap();
        assert_eq!(doc["cloth"], json!([]));
    }

    #[tokio::test]
    async fn missing_document_is_a_noop() {
        let (_store, session, mirror) = setup();
        session.set_gender("m");
        let report = mirror.load(LoadOptions::default()).await.unwrap();
        assert!(!report.found);
        assert_eq!(session.gender(), "m");
    }

    #[tokio::test]
    async fn wrong_shape_fails_loudly() {
        let (store, _session, mirror) = setup();
        store
            .set(&paths::user_doc("u1").unwrap(), json!({ "styleTag": "casual" }))
            .await
            .unwrap();
        let err = mirror.load(LoadOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[tokio::test]
    async fn load_accepts_string_music_ids() {
        let (store, session, mirror) = setup();
        store
            .set(
                &paths::user_doc("u1").unwrap(),
                json!({ "musicId": ["15", 22, " 7"], "styleTag": [], "gender": "none", "cloth": [] }),
            )
            .await
            .unwrap();
        mirror.load(LoadOptions::default()).await.unwrap();
        assert_eq!(session.music_ids(), vec![15, 22, 7]);

        // The document can be saved again and comes back numeric.
        mirror.save().await.unwrap();
        let doc = store.get(&paths::user_doc("u1").unwrap()).await.unwrap().unwrap();
        assert_eq!(doc["musicId"], json!([15, 22, 7]));
    }

    #[tokio::test]
    async fn load_rejects_non_numeric_music_ids() {
        let (store, _session, mirror) = setup();
        store
            .set(&paths::user_doc("u1").unwrap(), json!({ "musicId": ["abc"] }))
            .await
            .unwrap();
        let err = mirror.load(LoadOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[tokio::test]
    async fn operations_require_user() {
        let (_store, session, mirror) = setup();
        session.sign_out();
        assert!(matches!(mirror.save().await, Err(Error::AuthenticationRequired)));
        assert!(matches!(
            mirror.add_garment(&garment("1")).await,
            Err(Error::AuthenticationRequired)
        ));
        assert!(matches!(
            mirror.load(LoadOptions::default()).await,
            Err(Error::AuthenticationRequired)
        ));
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn add_garment_twice_stores_once() {
        let (store, _session, mirror) = setup();
        mirror.save().await.unwrap();
        mirror.add_garment(&garment("7")).await.unwrap();
        mirror.add_garment(&garment("7")).await.unwrap();
        mirror.add_garment(&garment("8")).await.unwrap();

        let doc = store.get(&paths::user_doc("u1").unwrap()).await.unwrap().unwrap();
        let cloth: Vec<MirroredSample> = serde_json::from_value(doc["cloth"].clone()).unwrap();
        assert_eq!(cloth, vec![garment("7"), garment("8")]);
    }

    #[tokio::test]
    async fn add_garment_without_document_is_not_found() {
        let (_store, _session, mirror) = setup();
        let err = mirror.add_garment(&garment("1")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn load_with_catalog_republishes_samples_and_music() {
        let (store, session, mirror) = setup();
        store
            .set(
                &paths::user_doc("u1").unwrap(),
                json!({ "musicId": [1], "styleTag": ["casual", "formal", "casual"], "gender": "f", "cloth": [] }),
            )
            .await
            .unwrap();
        for (i, id) in ["4", "9"].iter().enumerate() {
            store
                .set(
                    &paths::user_style_sample("u1", "casual", i).unwrap(),
                    json!(garment(id)),
                )
                .await
                .unwrap();
        }
        for i in [1usize, 0] {
            store
                .set(
                    &paths::music_track(i).unwrap(),
                    json!({ "number": i + 1, "title": format!("t{}", i), "singer": "s", "url": "" }),
                )
                .await
                .unwrap();
        }

        let report = mirror.load(LoadOptions { with_catalog: true }).await.unwrap();
        assert_eq!(report.styles_restored, vec!["casual"]);
        assert_eq!(report.tracks_loaded, 2);
        assert_eq!(session.cloth_batches(), vec![vec![garment("4"), garment("9")]]);

        let catalog = session.music_catalog();
        assert_eq!(catalog[0].index, 0);
        assert_eq!(catalog[1].title, "t1");
    }
}
