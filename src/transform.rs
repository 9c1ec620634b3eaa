//! Conversions between the wire, cache and domain shapes.
//!
//! All functions are pure. A batch conversion fails on the first item that
//! lacks a required field so that a refresh either writes everything or
//! nothing.

use crate::cache::CachedVideo;
use crate::domain::Video;
use crate::error::MalformedRecordError;
use crate::network::NetworkVideo;

/// Required fields of a wire video, in declaration order.
struct Fields {
  title: String,
  description: String,
  url: String,
  updated: String,
  thumbnail: String,
}

fn required(
  index: usize,
  field: &'static str,
  value: &Option<String>,
) -> Result<String, MalformedRecordError> {
  value.clone().ok_or(MalformedRecordError { index, field })
}

fn validate(index: usize, video: &NetworkVideo) -> Result<Fields, MalformedRecordError> {
  let url = required(index, "url", &video.url)?;
  // The url is the cache key; an empty one would collapse unrelated videos.
  if url.trim().is_empty() {
    return Err(MalformedRecordError { index, field: "url" });
  }

  Ok(Fields {
    title: required(index, "title", &video.video_title)?,
    description: required(index, "description", &video.description)?,
    url,
    updated: required(index, "updated", &video.updated)?,
    thumbnail: required(index, "thumbnail", &video.thumbnail)?,
  })
}

/// Convert network results to cache rows.
pub fn as_database_model(videos: &[NetworkVideo]) -> Result<Vec<CachedVideo>, MalformedRecordError> {
  videos
    .iter()
    .enumerate()
    .map(|(index, video)| {
      let f = validate(index, video)?;
      Ok(CachedVideo {
        url: f.url,
        title: f.title,
        description: f.description,
        updated: f.updated,
        thumbnail: f.thumbnail,
      })
    })
    .collect()
}

/// Convert network results straight to domain objects, for callers that
/// bypass the cache.
pub fn network_as_domain_model(videos: &[NetworkVideo]) -> Result<Vec<Video>, MalformedRecordError> {
  videos
    .iter()
    .enumerate()
    .map(|(index, video)| {
      let f = validate(index, video)?;
      Ok(Video {
        title: f.title,
        description: f.description,
        url: f.url,
        updated: f.updated,
        thumbnail: f.thumbnail,
      })
    })
    .collect()
}

/// Convert cache rows to domain objects.
///
/// Rows are validated on the way in, so this cannot fail.
pub fn as_domain_model(videos: &[CachedVideo]) -> Vec<Video> {
  videos.iter().cloned().map(Video::from).collect()
}

impl From<CachedVideo> for Video {
  fn from(video: CachedVideo) -> Self {
    Video {
      title: video.title,
      description: video.description,
      url: video.url,
      updated: video.updated,
      thumbnail: video.thumbnail,
    }
  }
}
