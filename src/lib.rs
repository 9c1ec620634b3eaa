//! Periodic sync of the DevBytes playlist into an observable local cache.
//!
//! A [`work::RefreshDataWorker`] scheduled on a [`work::WorkHost`] calls
//! [`repository::VideosRepository::refresh`], which fetches the playlist,
//! converts it and replaces the cached rows in one transaction. Consumers
//! read only from the cache through
//! [`repository::VideosRepository::observe_videos`].

pub mod app;
pub mod cache;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod logging;
pub mod network;
pub mod repository;
pub mod transform;
pub mod work;
