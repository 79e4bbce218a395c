//! Best-of-N extraction attempt selection
//!
//! Drives repeated generation-service calls for one page and keeps the
//! highest-confidence non-empty parse. The retry policy is written as an
//! explicit loop with an attempt counter so the early-exit and
//! keep-trying branches are visible control flow rather than exception
//! plumbing.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::transcript_parser::TranscriptParser;
use super::transcription::{PageImage, TranscriptionService};
use crate::app::models::ExtractionAttempt;
use crate::constants::{
    ACCEPT_CONFIDENCE_THRESHOLD, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY_MS,
    RETRY_CONFIDENCE_FLOOR,
};
use crate::{Error, Result};

/// Attempt-selection policy
#[derive(Debug, Clone)]
pub struct ExtractorPolicy {
    /// Maximum service attempts per page
    pub retry_count: usize,

    /// Fixed delay between attempts (service rate-limit courtesy)
    pub retry_delay: Duration,

    /// Confidence above which an attempt is accepted immediately
    pub accept_threshold: f64,

    /// Confidence floor above which a retry is considered worthwhile
    pub retry_floor: f64,
}

impl Default for ExtractorPolicy {
    fn default() -> Self {
        Self {
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            accept_threshold: ACCEPT_CONFIDENCE_THRESHOLD,
            retry_floor: RETRY_CONFIDENCE_FLOOR,
        }
    }
}

/// Best-of-N extraction driver for a single page
#[derive(Debug)]
pub struct PageExtractor<S: TranscriptionService> {
    service: S,
    parser: TranscriptParser,
    policy: ExtractorPolicy,
}

impl<S: TranscriptionService> PageExtractor<S> {
    /// Create an extractor with the default policy
    pub fn new(service: S) -> Self {
        Self::with_policy(service, ExtractorPolicy::default())
    }

    /// Create an extractor with an explicit policy
    pub fn with_policy(service: S, policy: ExtractorPolicy) -> Self {
        Self {
            service,
            parser: TranscriptParser::new(),
            policy,
        }
    }

    /// Extract one page, retaining the best attempt across up to
    /// `retry_count` service calls
    ///
    /// Transient service errors consume attempts and are retried after the
    /// fixed delay; the final one propagates rather than fabricating a
    /// result. If every completed attempt is dead (empty table, zero
    /// confidence), the page fails with [`Error::NoUsableData`] and the
    /// caller substitutes a schema-correct empty table to keep page
    /// sequencing intact.
    pub async fn extract_page(&self, image: &PageImage) -> Result<ExtractionAttempt> {
        let mut best: Option<ExtractionAttempt> = None;

        for attempt_no in 1..=self.policy.retry_count {
            let is_last = attempt_no == self.policy.retry_count;

            let text = match self.service.transcribe_page(image).await {
                Ok(text) => text,
                Err(e) if e.is_retryable() && !is_last => {
                    warn!(
                        "Attempt {}/{} failed with transient error: {}. Retrying after {:?}",
                        attempt_no, self.policy.retry_count, e, self.policy.retry_delay
                    );
                    tokio::time::sleep(self.policy.retry_delay).await;
                    continue;
                }
                Err(e) if e.is_retryable() => {
                    return Err(Error::service_exhausted(attempt_no, e.to_string()));
                }
                Err(e) => return Err(e),
            };

            let attempt = self.parser.parse(&text);
            debug!(
                "Attempt {}/{}: confidence {:.2}, {} rows",
                attempt_no,
                self.policy.retry_count,
                attempt.confidence,
                attempt.table.row_count()
            );

            if attempt.confidence > self.policy.accept_threshold {
                // Good enough; stop burning quota on further draws
                info!(
                    "Accepting attempt {} at confidence {:.2}",
                    attempt_no, attempt.confidence
                );
                return Ok(attempt);
            }

            if attempt.improves_on(best.as_ref()) {
                best = Some(attempt.clone());
            }

            if !is_last {
                if attempt.confidence > self.policy.retry_floor {
                    debug!(
                        "Confidence {:.2} in the retry band; trying for a better draw",
                        attempt.confidence
                    );
                } else {
                    debug!("Dead or weak attempt (confidence {:.2})", attempt.confidence);
                }
                tokio::time::sleep(self.policy.retry_delay).await;
            }
        }

        best.ok_or_else(|| {
            warn!(
                "No usable table data after {} attempts",
                self.policy.retry_count
            );
            Error::no_usable_data(self.policy.retry_count)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted service: pops one canned response per call
    struct ScriptedService {
        responses: Mutex<VecDeque<Result<String>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedService {
        fn new(responses: Vec<Result<String>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl TranscriptionService for ScriptedService {
        async fn transcribe_page(&self, _image: &PageImage) -> Result<String> {
            *self.calls.lock().unwrap() += 1;
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::service_request("script exhausted", false)))
        }
    }

    fn fast_policy(retry_count: usize) -> ExtractorPolicy {
        ExtractorPolicy {
            retry_count,
            retry_delay: Duration::from_millis(0),
            ..ExtractorPolicy::default()
        }
    }

    fn image() -> PageImage {
        PageImage::png(vec![0u8; 4])
    }

    const CLEAN_CSV: &str = "Name,Where born,State\n\"Smith, John\",Ohio,Alabama\n";
    const RAGGED_CSV: &str = "Name,Where born,State,Extra\n\"Smith, John\",Ohio\n";

    #[tokio::test]
    async fn test_early_exit_on_high_confidence() {
        let service = ScriptedService::new(vec![
            Ok(CLEAN_CSV.to_string()),
            Ok(CLEAN_CSV.to_string()),
            Ok(CLEAN_CSV.to_string()),
        ]);
        let extractor = PageExtractor::with_policy(service, fast_policy(3));

        let attempt = extractor.extract_page(&image()).await.unwrap();
        assert_eq!(attempt.confidence, 1.0);
        // Stopped after the first good draw
        assert_eq!(extractor.service.call_count(), 1);
    }

    #[tokio::test]
    async fn test_best_attempt_retained_across_draws() {
        // Ragged draw (manual repair) followed by a clean one
        let service = ScriptedService::new(vec![
            Ok(RAGGED_CSV.to_string()),
            Ok(CLEAN_CSV.to_string()),
        ]);
        let extractor = PageExtractor::with_policy(service, fast_policy(3));

        let attempt = extractor.extract_page(&image()).await.unwrap();
        assert_eq!(attempt.confidence, 1.0);
        assert_eq!(extractor.service.call_count(), 2);
    }

    #[tokio::test]
    async fn test_never_returns_worse_than_best_observed() {
        // Mid-band draw, then a weaker one; the mid-band result must win
        let service = ScriptedService::new(vec![
            Ok("A,B,C,D\n1,2,3,4\n1,2,3\n".to_string()), // mean 0.875
            Ok(RAGGED_CSV.to_string()),                  // 0.5
        ]);
        let extractor = PageExtractor::with_policy(service, fast_policy(2));

        let attempt = extractor.extract_page(&image()).await.unwrap();
        assert!((attempt.confidence - 0.875).abs() < 1e-9);
        assert_eq!(extractor.service.call_count(), 2);
    }

    #[tokio::test]
    async fn test_transient_errors_retried_then_succeed() {
        let service = ScriptedService::new(vec![
            Err(Error::service_request("overloaded", true)),
            Ok(CLEAN_CSV.to_string()),
        ]);
        let extractor = PageExtractor::with_policy(service, fast_policy(3));

        let attempt = extractor.extract_page(&image()).await.unwrap();
        assert_eq!(attempt.confidence, 1.0);
        assert_eq!(extractor.service.call_count(), 2);
    }

    #[tokio::test]
    async fn test_transient_errors_exhaust_and_propagate() {
        let service = ScriptedService::new(vec![
            Err(Error::service_request("overloaded", true)),
            Err(Error::service_request("overloaded", true)),
            Err(Error::service_request("overloaded", true)),
        ]);
        let extractor = PageExtractor::with_policy(service, fast_policy(3));

        let err = extractor.extract_page(&image()).await.unwrap_err();
        assert!(matches!(err, Error::ServiceExhausted { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_non_retryable_error_propagates_immediately() {
        let service = ScriptedService::new(vec![
            Err(Error::service_request("bad api key", false)),
            Ok(CLEAN_CSV.to_string()),
        ]);
        let extractor = PageExtractor::with_policy(service, fast_policy(3));

        let err = extractor.extract_page(&image()).await.unwrap_err();
        assert!(matches!(err, Error::ServiceRequest { .. }));
        assert_eq!(extractor.service.call_count(), 1);
    }

    #[tokio::test]
    async fn test_all_dead_attempts_fail_hard() {
        let service = ScriptedService::new(vec![
            Ok("".to_string()),
            Ok("  \n".to_string()),
            Ok("".to_string()),
        ]);
        let extractor = PageExtractor::with_policy(service, fast_policy(3));

        let err = extractor.extract_page(&image()).await.unwrap_err();
        assert!(matches!(err, Error::NoUsableData { attempts: 3 }));
    }
}
