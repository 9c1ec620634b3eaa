/// A video as presented to consumers of the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Video {
  pub title: String,
  pub description: String,
  pub url: String,
  pub updated: String,
  pub thumbnail: String,
}

impl Video {
  /// Short description used by list renderers
  pub fn short_description(&self) -> &str {
    self.description.lines().next().unwrap_or_default()
  }
}
