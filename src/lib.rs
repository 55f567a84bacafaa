//! Weld seam inspection service
//!
//! Accepts images by URL list, multipart upload or raw body, runs them
//! through an object-detection model in background jobs, and serves per-image
//! boxes, labels and a pass/fail verdict through a polling interface backed
//! by per-job directories on local disk.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
