//! Weekly hymn selection for congregational services.
//!
//! A [`service::HymnService`] builds hymn lists from a [`catalog::Catalog`],
//! avoiding hymns a group sang recently according to its history in a
//! [`db::Database`], and lets callers swap single entries without breaking
//! the liturgical constraints enforced by [`engine`].

pub mod catalog;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod history;
pub mod models;
pub mod render;
pub mod service;
