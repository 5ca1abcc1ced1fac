//! Pipeline stages for statement extraction.
//!
//! Each submodule implements one step. The four external collaborators
//! (text extraction, entity recognition, rasterisation and the vision
//! model) sit behind traits so the orchestrator in [`crate::extract`] can
//! be driven by fakes in tests.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ text ──▶ entities ──▶ render ──▶ scan ──▶ normalize
//! (URL/path) (pdfium) (PERSON/MONEY) (pdfium) (encode + vision) (JSON)
//! ```
//!
//! 1. [`input`]    — canonicalise the user-supplied path, URL or bytes to a local file
//! 2. [`text`]     — per-page text layer, newlines folded to spaces
//! 3. [`entities`] — PERSON / MONEY relevance lists per page
//! 4. [`render`]   — rasterise every page; runs in `spawn_blocking`
//! 5. [`scan`]     — visit candidate pages in order, [`encode`] each one and
//!    ask the [`vision`] model until the stop rule fires
//! 6. [`normalize`] — turn a structured-list answer into holding records

pub mod encode;
pub mod entities;
pub mod input;
pub mod normalize;
pub mod pdfium;
pub mod render;
pub mod scan;
pub mod text;
pub mod vision;
