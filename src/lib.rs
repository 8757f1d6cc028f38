//! Client library for the AdGen Studio dashboard: local settings and drafts,
//! the generated-video feed, storage uploads and workflow webhooks.

pub mod backend;
pub mod config;
pub mod create;
pub mod draft;
pub mod error;
pub mod feed;
pub mod model;
pub mod settings;
pub mod store;
pub mod upload;
pub mod webhook;

pub use error::{StudioError, StudioResult};
