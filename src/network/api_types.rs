//! Serde-deserializable types matching the playlist endpoint response.
//!
//! Fields are decoded as `Option` so a missing field is reported against the
//! item that lacks it (see `transform`) instead of failing the whole body.
//!
//! ```json
//! { "videos": [ { "title": "...", "description": "...", "url": "...",
//!                 "updated": "...", "thumbnail": "...", "closedCaptions": null } ] }
//! ```

use serde::Deserialize;

/// Top level of the playlist response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkVideoContainer {
  #[serde(default)]
  pub videos: Vec<NetworkVideo>,
}

/// One playable video as sent by the server.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkVideo {
  #[serde(rename = "title")]
  pub video_title: Option<String>,
  pub description: Option<String>,
  pub url: Option<String>,
  pub updated: Option<String>,
  pub thumbnail: Option<String>,
  #[serde(rename = "closedCaptions", default)]
  pub closed_captions: Option<String>,
}
