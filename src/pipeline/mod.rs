//! Pipeline stages for PDF table extraction.
//!
//! ```text
//! input ──▶ extract ──▶ normalize
//! (path/URL/bytes)  (TableSource, blocking)  (pure)
//! ```
//!
//! 1. [`input`]: resolve a path, URL or upload to a local PDF file
//! 2. [`extract`]: find table fragments on the selected pages; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`normalize`]: fold fragments into records with the fixed schema

pub mod extract;
pub mod input;
pub mod normalize;
