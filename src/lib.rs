//! # Tunewear
//!
//! A music-to-style recommendation client.
//!
//! Tunewear turns a user's chosen songs into clothing style labels via a
//! remote recommendation service, samples garments for those styles from a
//! document-store catalog, and mirrors the user's selections and sampled
//! garments back into the store.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Recommend   │   │   Sampler    │──▶│   Document   │
//! │  HTTP client │   │ count + ids  │   │    store     │
//! └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!        │                  │                  │
//!        ▼                  ▼                  ▼
//!   ┌─────────────────────────────┐     ┌──────────────┐
//!   │       Session (shared)      │◀───▶│    Mirror    │
//!   └─────────────────────────────┘     └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! tw init                              # create the local store
//! tw seed                              # load garment and song tables
//! tw recommend 15 22 7                 # music ids -> style labels
//! tw sample casual --user alice        # draw ten garments
//! tw save --user alice --style casual  # persist selections
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Library error type |
//! | [`models`] | Document shapes |
//! | [`store`] | Document store trait, paths, backends |
//! | [`db`] | SQLite connection |
//! | [`migrate`] | Schema migrations |
//! | [`objects`] | Object storage download URLs |
//! | [`resolver`] | Storage path to URL resolution |
//! | [`recommend`] | Recommendation service client |
//! | [`session`] | Observable session state |
//! | [`auth`] | Identity provider seam |
//! | [`sampler`] | Catalog sampling per style |
//! | [`mirror`] | Per-user state persistence |
//! | [`seed`] | Bulk catalog seeding |

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod migrate;
pub mod mirror;
pub mod models;
pub mod objects;
pub mod recommend;
pub mod resolver;
pub mod sampler;
pub mod seed;
pub mod session;
pub mod store;
