//! PDF rasterisation: render every page to a `DynamicImage` via pdfium.
//!
//! pdfium keeps thread-local state and is CPU-bound, so the work runs in
//! `spawn_blocking`. The longest edge is capped by `max_rendered_pixels`.

use super::pdfium::{bind_pdfium, load_document};
use crate::error::ExtractError;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Produces one image per page, in page order.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    async fn rasterize(&self, pdf_path: &Path) -> Result<Vec<DynamicImage>, ExtractError>;
}

/// [`PageRasterizer`] backed by pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    max_pixels: u32,
    password: Option<String>,
}

impl PdfiumRasterizer {
    pub fn new(max_pixels: u32, password: Option<String>) -> Self {
        Self {
            max_pixels,
            password,
        }
    }
}

#[async_trait]
impl PageRasterizer for PdfiumRasterizer {
    async fn rasterize(&self, pdf_path: &Path) -> Result<Vec<DynamicImage>, ExtractError> {
        let path = pdf_path.to_path_buf();
        let max_pixels = self.max_pixels;
        let password = self.password.clone();

        tokio::task::spawn_blocking(move || {
            render_all_blocking(&path, max_pixels, password.as_deref())
        })
        .await
        .map_err(|e| ExtractError::Internal(format!("Render task panicked: {e}")))?
    }
}

fn render_all_blocking(
    pdf_path: &Path,
    max_pixels: u32,
    password: Option<&str>,
) -> Result<Vec<DynamicImage>, ExtractError> {
    let pdfium = bind_pdfium()?;
    let document = load_document(&pdfium, pdf_path, password)?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let pages = document.pages();
    let mut images = Vec::with_capacity(pages.len() as usize);

    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            ExtractError::RasterisationFailed {
                page: idx,
                detail: format!("{e:?}"),
            }
        })?;

        let image = bitmap.as_image();
        debug!("Rendered page {} → {}x{} px", idx, image.width(), image.height());
        images.push(image);
    }

    info!("Converted PDF to {} images", images.len());
    Ok(images)
}
