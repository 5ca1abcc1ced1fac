//! Page scanning: walk candidate pages until the stop rule fires.
//!
//! Candidate pages come from the relevance filter and are trusted as-is;
//! the scanner never re-derives relevance. Pages are visited strictly in
//! list order, one model call at a time, and each image is encoded only
//! when its page is reached.

use super::encode::encode_page;
use super::entities::EntityCategory;
use super::vision::VisionModel;
use crate::error::ExtractError;
use crate::output::ExtractionResult;
use crate::progress::ProgressCallback;
use image::DynamicImage;
use tracing::{debug, info};

/// Page-index ceiling for multi-record scans.
pub const DEFAULT_EARLY_STOP_INDEX: usize = 7;

/// When a scan stops after recording a non-empty answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopPolicy {
    /// Stop after the first recorded answer (single-value targets).
    FirstAnswer,
    /// Keep going, but stop once an answer is recorded on a page whose
    /// index is at or past the ceiling.
    PageCeiling(usize),
}

impl StopPolicy {
    fn should_stop(self, page: usize) -> bool {
        match self {
            StopPolicy::FirstAnswer => true,
            StopPolicy::PageCeiling(ceiling) => page >= ceiling,
        }
    }
}

/// True when a model answer carries nothing: blank, or a literal empty
/// string such as `""` or `''`.
pub fn is_empty_answer(answer: &str) -> bool {
    let t = answer.trim();
    t.is_empty() || t == "\"\"" || t == "''"
}

/// Drives one vision model over a document's rendered pages.
pub struct PageScanner<'a> {
    vision: &'a dyn VisionModel,
    images: &'a [DynamicImage],
    jpeg_quality: u8,
    progress: Option<&'a ProgressCallback>,
}

impl<'a> PageScanner<'a> {
    pub fn new(vision: &'a dyn VisionModel, images: &'a [DynamicImage], jpeg_quality: u8) -> Self {
        Self {
            vision,
            images,
            jpeg_quality,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<&'a ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Ask `prompt` of each page in `candidates` and collect the non-empty
    /// answers until `policy` says stop.
    ///
    /// `target` names the object of interest for logs and progress events.
    /// An empty result list is a normal outcome. Any model failure, or a
    /// candidate index with no rendered image, aborts the scan.
    pub async fn scan(
        &self,
        candidates: &[usize],
        prompt: &str,
        category: EntityCategory,
        policy: StopPolicy,
        target: &str,
    ) -> Result<Vec<ExtractionResult>, ExtractError> {
        info!(
            "Scanning {} {} page(s) for {:?}: {:?}",
            candidates.len(),
            category,
            target,
            candidates
        );
        if let Some(cb) = self.progress {
            cb.on_scan_start(target, candidates.len());
        }

        let mut results = Vec::new();

        for &page in candidates {
            let image = self
                .images
                .get(page)
                .ok_or(ExtractError::PageOutOfRange {
                    page,
                    total: self.images.len(),
                })?;

            let encoded = encode_page(image, self.jpeg_quality).map_err(|e| {
                ExtractError::RasterisationFailed {
                    page,
                    detail: format!("JPEG encoding failed: {e}"),
                }
            })?;

            if let Some(cb) = self.progress {
                cb.on_page_start(target, page);
            }
            let answer = self.vision.answer(page, prompt, encoded).await?;

            if is_empty_answer(&answer) {
                debug!("Page {}: empty answer for {:?}", page, target);
                if let Some(cb) = self.progress {
                    cb.on_page_empty(target, page);
                }
                continue;
            }

            debug!("Page {}: {} byte answer for {:?}", page, answer.len(), target);
            if let Some(cb) = self.progress {
                cb.on_page_answer(target, page, answer.len());
            }
            results.push(ExtractionResult {
                page,
                category,
                answer,
            });

            if policy.should_stop(page) {
                debug!("Stopping {:?} scan at page {} ({:?})", target, page, policy);
                break;
            }
        }

        info!("{:?}: {} answer(s) recorded", target, results.len());
        if let Some(cb) = self.progress {
            cb.on_scan_complete(target, results.len());
        }
        Ok(results)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use edgequake_llm::ImageData;
    use image::{Rgb, RgbImage};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// One solid image per page; the width encodes the page index.
    pub(crate) fn page_images(count: usize) -> Vec<DynamicImage> {
        (0..count)
            .map(|i| DynamicImage::ImageRgb8(RgbImage::from_pixel(i as u32 + 1, 4, Rgb([200, 200, 200]))))
            .collect()
    }

    /// Scripted vision model: answers by page, recovered from the image.
    #[derive(Default)]
    pub(crate) struct ScriptedVision {
        answers: HashMap<usize, String>,
        pub calls: Mutex<Vec<(usize, String)>>,
    }

    impl ScriptedVision {
        pub fn new(answers: &[(usize, &str)]) -> Self {
            Self {
                answers: answers.iter().map(|(p, a)| (*p, a.to_string())).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn pages_called(&self) -> Vec<usize> {
            self.calls.lock().unwrap().iter().map(|(p, _)| *p).collect()
        }
    }

    #[async_trait]
    impl VisionModel for ScriptedVision {
        async fn answer(&self, page: usize, prompt: &str, img: ImageData) -> Result<String, ExtractError> {
            let bytes = STANDARD.decode(&img.data).expect("base64");
            let decoded = image::load_from_memory(&bytes).expect("jpeg");
            assert_eq!(decoded.width() as usize, page + 1, "image does not belong to page {page}");

            self.calls.lock().unwrap().push((page, prompt.to_string()));
            Ok(self.answers.get(&page).cloned().unwrap_or_default())
        }
    }

    struct FailingVision;

    #[async_trait]
    impl VisionModel for FailingVision {
        async fn answer(&self, page: usize, _: &str, _: ImageData) -> Result<String, ExtractError> {
            Err(ExtractError::LlmApiError {
                page,
                message: "rate limited".into(),
            })
        }
    }

    #[test]
    fn empty_answer_rule() {
        assert!(is_empty_answer(""));
        assert!(is_empty_answer("  \n"));
        assert!(is_empty_answer("\"\""));
        assert!(is_empty_answer(" '' "));
        assert!(!is_empty_answer("Jane Doe"));
        assert!(!is_empty_answer("[]"));
    }

    #[tokio::test]
    async fn first_answer_stops_at_first_non_empty() {
        let images = page_images(6);
        let vision = ScriptedVision::new(&[(2, "Jane Doe"), (4, "John Roe")]);
        let scanner = PageScanner::new(&vision, &images, 85);

        let results = scanner
            .scan(&[0, 2, 4], "who?", EntityCategory::Person, StopPolicy::FirstAnswer, "owner")
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].page, 2);
        assert_eq!(results[0].answer, "Jane Doe");
        assert_eq!(results[0].category, EntityCategory::Person);
        assert_eq!(vision.pages_called(), vec![0, 2]);
    }

    #[tokio::test]
    async fn empty_candidates_make_no_calls() {
        let images = page_images(3);
        let vision = ScriptedVision::new(&[(0, "x")]);
        let results = PageScanner::new(&vision, &images, 85)
            .scan(&[], "p", EntityCategory::Money, StopPolicy::FirstAnswer, "value")
            .await
            .unwrap();
        assert!(results.is_empty());
        assert!(vision.pages_called().is_empty());
    }

    #[tokio::test]
    async fn all_empty_answers_visit_every_page() {
        let images = page_images(4);
        let vision = ScriptedVision::new(&[(1, "\"\""), (3, "   ")]);
        let results = PageScanner::new(&vision, &images, 85)
            .scan(&[1, 2, 3], "p", EntityCategory::Money, StopPolicy::FirstAnswer, "value")
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(vision.pages_called(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn ceiling_stops_after_answer_past_index() {
        let images = page_images(12);
        let vision = ScriptedVision::new(&[(1, "[1]"), (3, "[3]"), (9, "[9]")]);
        let results = PageScanner::new(&vision, &images, 85)
            .scan(
                &[1, 3, 9],
                "p",
                EntityCategory::Money,
                StopPolicy::PageCeiling(DEFAULT_EARLY_STOP_INDEX),
                "holdings",
            )
            .await
            .unwrap();
        let pages: Vec<_> = results.iter().map(|r| r.page).collect();
        assert_eq!(pages, vec![1, 3, 9]);
    }

    #[tokio::test]
    async fn ceiling_ignores_empty_answers_past_index() {
        let images = page_images(12);
        let vision = ScriptedVision::new(&[(8, ""), (10, "[10]"), (11, "[11]")]);
        let results = PageScanner::new(&vision, &images, 85)
            .scan(
                &[2, 8, 10, 11],
                "p",
                EntityCategory::Money,
                StopPolicy::PageCeiling(7),
                "holdings",
            )
            .await
            .unwrap();
        let pages: Vec<_> = results.iter().map(|r| r.page).collect();
        assert_eq!(pages, vec![10]);
        assert_eq!(vision.pages_called(), vec![2, 8, 10]);
    }

    #[tokio::test]
    async fn missing_image_is_page_out_of_range() {
        let images = page_images(2);
        let vision = ScriptedVision::new(&[]);
        let err = PageScanner::new(&vision, &images, 85)
            .scan(&[0, 5], "p", EntityCategory::Person, StopPolicy::FirstAnswer, "owner")
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::PageOutOfRange { page: 5, total: 2 }));
    }

    #[tokio::test]
    async fn model_failure_propagates() {
        let images = page_images(2);
        let err = PageScanner::new(&FailingVision, &images, 85)
            .scan(&[1], "p", EntityCategory::Money, StopPolicy::FirstAnswer, "value")
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::LlmApiError { page: 1, .. }));
    }
}
