pub mod api_types;
pub mod client;

pub use api_types::{NetworkVideo, NetworkVideoContainer};
pub use client::{HttpPlaylistSource, PlaylistSource};
