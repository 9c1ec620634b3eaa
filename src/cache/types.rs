/// A video row in the local cache, keyed by `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedVideo {
  pub url: String,
  pub title: String,
  pub description: String,
  pub updated: String,
  pub thumbnail: String,
}
