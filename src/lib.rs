//! Pulse News - a paginated news feed service
//!
//! This crate pulls articles from a JSON news backend page by page, merges
//! them into a deduplicated feed driven by an explicit state machine, and
//! serves the feed, bookmarks, local city news and a swipeable flash view
//! over a small JSON API.

pub mod article;
pub mod config;
pub mod controller;
pub mod db;
pub mod error;
pub mod feed;
pub mod fetcher;
pub mod local;
pub mod navigator;
pub mod opener;
pub mod routes;
