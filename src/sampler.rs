//! Catalog sampling.
//!
//! Picks clothing items for one style from the shared catalog, resolves
//! their image URLs, mirrors them under the signed-in user, and appends the
//! batch to the session's cloth results.
//!
//! # Modes
//!
//! The style's `count` document gives `max_size`, the largest identifier in
//! the partition:
//!
//! - **Exhaustive** (`max_size < 10`): every id in `1..=max_size` is read;
//!   missing ids are skipped. Item `n` is mirrored at position `n - 1`.
//! - **Random** (`max_size >= 10`): ids are drawn uniformly from
//!   `1..=max_size` until 10 distinct existing items are found or
//!   `2 * max_size` draws have been made. Repeats and missing ids use up a
//!   draw. Items are mirrored at positions `0..` in draw order.
//!
//! Every step is awaited in sequence; nothing is fetched in parallel.
//!
//! # Failure Semantics
//!
//! No user, a missing `count` document, or a bad `max_size` abort the call.
//! A store write failure aborts the call. URL resolution failures degrade
//! to an empty URL. The loading flag is cleared on every path.

use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::models::{CatalogItem, MirroredSample, StyleCount};
use crate::resolver::{cloth_image_path, DownloadUrlResolver};
use crate::session::Session;
use crate::store::{get_as, paths, DocumentStore};

/// Number of items a random sampling aims for; also the size below which
/// a style is read exhaustively.
pub const SAMPLE_SIZE: u32 = 10;

/// Draw budget per unit of `max_size` in random mode.
pub const ATTEMPTS_PER_ID: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleMode {
    Exhaustive,
    Random,
}

/// What one sampling call produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleReport {
    pub style: String,
    pub mode: SampleMode,
    pub max_size: u32,
    /// Store reads of catalog items (exhaustive) or random draws (random).
    pub attempts: u32,
    pub items: Vec<MirroredSample>,
}

impl SampleReport {
    /// True when random mode ran out of draws before reaching
    /// [`SAMPLE_SIZE`].
    pub fn is_short(&self) -> bool {
        self.mode == SampleMode::Random && (self.items.len() as u32) < SAMPLE_SIZE
    }
}

pub struct CatalogSampler {
    store: Arc<dyn DocumentStore>,
    resolver: DownloadUrlResolver,
    session: Arc<Session>,
}

impl CatalogSampler {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        resolver: DownloadUrlResolver,
        session: Arc<Session>,
    ) -> Self {
        Self {
            store,
            resolver,
            session,
        }
    }

    /// Sample `style` with an entropy-seeded generator.
    pub async fn fetch_style_items(&self, style: &str) -> Result<SampleReport> {
        let mut rng = StdRng::from_entropy();
        self.fetch_style_items_with_rng(style, &mut rng).await
    }

    /// Sample `style` drawing random ids from `rng`.
    pub async fn fetch_style_items_with_rng<R>(&self, style: &str, rng: &mut R) -> Result<SampleReport>
    where
        R: Rng + Send,
    {
        let _loading = self.session.begin_loading();
        match self.sample(style, rng).await {
            Ok(report) => {
                self.session.push_cloth_batch(report.items.clone());
                info!(
                    style,
                    mode = ?report.mode,
                    max_size = report.max_size,
                    attempts = report.attempts,
                    items = report.items.len(),
                    "style sampled"
                );
                Ok(report)
            }
            Err(e) => {
                error!(style, error = %e, "style sampling failed");
                Err(e)
            }
        }
    }

    async fn sample<R>(&self, style: &str, rng: &mut R) -> Result<SampleReport>
    where
        R: Rng + Send,
    {
        let user = self.session.require_user()?;

        let count_path = paths::style_count(style)?;
        let count_doc = self
            .store
            .get(&count_path)
            .await?
            .ok_or_else(|| Error::NotFound(format!("count document for style '{}'", style)))?;
        let count = StyleCount::from_document(style, &count_doc)?;

        if count.max_size < SAMPLE_SIZE {
            self.sample_all(&user, style, count.max_size).await
        } else {
            self.sample_random(&user, style, count.max_size, rng).await
        }
    }

    async fn sample_all(&self, user: &str, style: &str, max_size: u32) -> Result<SampleReport> {
        let mut items = Vec::new();
        let mut attempts = 0;

        for id in 1..=max_size {
            attempts += 1;
            let Some(item) = self.read_item(style, id).await? else {
                debug!(style, id, "catalog item missing, skipped");
                continue;
            };
            let sample = self.mirror(user, style, id, &item, (id - 1) as usize).await?;
            items.push(sample);
        }

        Ok(SampleReport {
            style: style.to_string(),
            mode: SampleMode::Exhaustive,
            max_size,
            attempts,
            items,
        })
    }

    async fn sample_random<R>(
        &self,
        user: &str,
        style: &str,
        max_size: u32,
        rng: &mut R,
    ) -> Result<SampleReport>
    where
        R: Rng + Send,
    {
        let max_attempts = max_size.saturating_mul(ATTEMPTS_PER_ID);
        let mut selected: HashSet<u32> = HashSet::new();
        let mut items = Vec::new();
        let mut attempts = 0;

        while (selected.len() as u32) < SAMPLE_SIZE && attempts < max_attempts {
            attempts += 1;
            let id = rng.gen_range(1..=max_size);
            if selected.contains(&id) {
                continue;
            }
            let Some(item) = self.read_item(style, id).await? else {
                debug!(style, id, "catalog item missing, draw discarded");
                continue;
            };
            let sample = self.mirror(user, style, id, &item, selected.len()).await?;
            items.push(sample);
            selected.insert(id);
        }

        if (items.len() as u32) < SAMPLE_SIZE {
            warn!(
                style,
                max_size,
                attempts,
                found = items.len(),
                "only {} of {} items found before the draw budget ran out",
                items.len(),
                SAMPLE_SIZE
            );
        }

        Ok(SampleReport {
            style: style.to_string(),
            mode: SampleMode::Random,
            max_size,
            attempts,
            items,
        })
    }

    async fn read_item(&self, style: &str, id: u32) -> Result<Option<CatalogItem>> {
        get_as::<CatalogItem>(self.store.as_ref(), &paths::catalog_item(style, id)?).await
    }

    /// Resolve the item's URL (best effort) and write the user's copy at
    /// `index`.
    async fn mirror(
        &self,
        user: &str,
        style: &str,
        id: u32,
        item: &CatalogItem,
        index: usize,
    ) -> Result<MirroredSample> {
        let url = if item.img_url.trim().is_empty() {
            warn!(style, id, "catalog item has no image path");
            String::new()
        } else {
            self.resolver
                .resolve_or_empty(&cloth_image_path(style, &item.img_url))
                .await
        };

        let sample = MirroredSample {
            img_id: id.to_string(),
            img_url: url,
            web_url: item.web_url.clone(),
        };

        self.store
            .set(
                &paths::user_style_sample(user, style, index)?,
                serde_json::to_value(&sample)?,
            )
            .await?;
        Ok(sample)
    }
}
