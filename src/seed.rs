//! One-shot catalog seeding.
//!
//! Copies the static garment and song tables into the document store.
//!
//! - **Garment pass**: writes `image-data/cloth/{style}/{number}` for every
//!   row, then a `count` document per style holding the largest numeric
//!   `number` seen. Numeric numbers are stored under their canonical form
//!   (`"01"` and `" 1"` both land at `1`). The first failed write aborts
//!   the pass.
//! - **Music pass**: resolves each song's thumbnail and writes
//!   `music-data/{row index}`. Rows without a thumbnail are skipped; rows
//!   whose URL resolution or write fails are logged and skipped.
//!
//! # Table Format
//!
//! ```json
//! [{ "style": "casual", "number": "1", "img_url": "1.jpg", "web_url": "https://..." }]
//! [{ "number": 1, "title": "...", "singer": "...", "thumbnail_url": "1_zay.jpg" }]
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Deserializer};
use serde_json::json;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::number_or_string;
use crate::resolver::{music_thumbnail_path, DownloadUrlResolver};
use crate::store::{paths, DocumentStore};

/// One row of the garment table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClothRow {
    pub style: String,
    #[serde(deserialize_with = "id_string")]
    pub number: String,
    pub img_url: String,
    #[serde(default)]
    pub web_url: String,
}

/// One row of the song table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SongRow {
    #[serde(deserialize_with = "number_or_string")]
    pub number: u32,
    pub title: String,
    pub singer: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

fn id_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Num(n) => n.to_string(),
        Raw::Str(s) => s,
    })
}

pub fn read_cloth_table(path: &Path) -> anyhow::Result<Vec<ClothRow>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read garment table: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse garment table: {}", path.display()))
}

pub fn read_songs_table(path: &Path) -> anyhow::Result<Vec<SongRow>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read song table: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse song table: {}", path.display()))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub garments_written: usize,
    /// `(style, max_size)` for every count document written.
    pub styles_counted: Vec<(String, u32)>,
    pub songs_written: usize,
    pub songs_skipped: usize,
}

pub struct SeedLoader {
    store: Arc<dyn DocumentStore>,
    resolver: DownloadUrlResolver,
}

impl SeedLoader {
    pub fn new(store: Arc<dyn DocumentStore>, resolver: DownloadUrlResolver) -> Self {
        Self { store, resolver }
    }

    /// Garment pass. Stops at the first failure.
    pub async fn seed_cloth(&self, rows: &[ClothRow], report: &mut SeedReport) -> Result<()> {
        let mut max_per_style: BTreeMap<&str, u32> = BTreeMap::new();

        for row in rows {
            // Numeric rows land at the canonical id the sampler reads back.
            let path = match row.number.trim().parse::<u32>() {
                Ok(n) => {
                    if row.number != n.to_string() {
                        warn!(style = %row.style, number = %row.number, id = n, "garment number normalized");
                    }
                    let max = max_per_style.entry(row.style.as_str()).or_insert(0);
                    *max = (*max).max(n);
                    paths::catalog_item(&row.style, n)?
                }
                Err(_) => {
                    warn!(style = %row.style, number = %row.number, "non-numeric garment number, not counted");
                    paths::catalog_item_named(&row.style, &row.number)?
                }
            };
            self.store
                .set(
                    &path,
                    json!({ "img_url": row.img_url, "web_url": row.web_url }),
                )
                .await?;
            report.garments_written += 1;
        }

        for (style, max_size) in max_per_style {
            if max_size == 0 {
                continue;
            }
            self.store
                .set(&paths::style_count(style)?, json!({ "max_size": max_size }))
                .await?;
            report.styles_counted.push((style.to_string(), max_size));
        }

        info!(
            garments = report.garments_written,
            styles = report.styles_counted.len(),
            "garment table seeded"
        );
        Ok(())
    }

    /// Music pass. Never fails; per-row problems are logged and counted.
    pub async fn seed_music(&self, rows: &[SongRow], report: &mut SeedReport) {
        for (i, song) in rows.iter().enumerate() {
            let Some(thumbnail) = song.thumbnail_url.as_deref().filter(|t| !t.trim().is_empty())
            else {
                report.songs_skipped += 1;
                continue;
            };

            match self.write_song(i, song, thumbnail).await {
                Ok(()) => report.songs_written += 1,
                Err(e) => {
                    warn!(index = i, title = %song.title, error = %e, "song not seeded");
                    report.songs_skipped += 1;
                }
            }
        }

        info!(
            written = report.songs_written,
            skipped = report.songs_skipped,
            "song table seeded"
        );
    }

    async fn write_song(&self, index: usize, song: &SongRow, thumbnail: &str) -> Result<()> {
        let url = self.resolver.resolve(&music_thumbnail_path(thumbnail)).await?;
        self.store
            .set(
                &paths::music_track(index)?,
                json!({
                    "number": song.number,
                    "title": song.title,
                    "singer": song.singer,
                    "url": url,
                }),
            )
            .await
    }

    /// Run both passes. The music pass is skipped if the garment pass fails.
    pub async fn seed_all(&self, cloth: &[ClothRow], songs: &[SongRow]) -> Result<SeedReport> {
        let mut report = SeedReport::default();
        self.seed_cloth(cloth, &mut report).await?;
        self.seed_music(songs, &mut report).await;
        Ok(report)
    }
}
