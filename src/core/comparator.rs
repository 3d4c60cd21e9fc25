//! Reference-versus-targets comparison workflow.
//!
//! Each target URL is processed independently: a failure to fetch, decode, or
//! verify one target becomes an error record for that URL alone and never
//! aborts the rest of the batch. Targets run strictly one at a time, in input
//! order, and the result list preserves that order.

use thiserror::Error;

use crate::engine::{preprocess, EngineError, FaceEmbedding, FaceInference};
use crate::models::TargetComparison;
use crate::services::{FetchError, ImageFetcher};

#[derive(Debug, Error)]
enum TargetError {
    #[error("failed to fetch target image: {0}")]
    Fetch(#[from] FetchError),

    #[error("{0}")]
    Engine(#[from] EngineError),
}

/// Compare every target URL against the reference embedding.
///
/// Always returns exactly one entry per input URL, in input order.
pub async fn compare_targets(
    engine: &dyn FaceInference,
    fetcher: &ImageFetcher,
    reference: &FaceEmbedding,
    urls: &[String],
) -> Vec<TargetComparison> {
    let mut results = Vec::with_capacity(urls.len());

    for url in urls {
        let entry = match compare_one(engine, fetcher, reference, url).await {
            Ok(verification) => TargetComparison::verified(url.clone(), verification),
            Err(e) => {
                tracing::info!("Comparison failed for {}: {}", url, e);
                TargetComparison::failed(url.clone(), e.to_string())
            }
        };
        results.push(entry);
    }

    results
}

async fn compare_one(
    engine: &dyn FaceInference,
    fetcher: &ImageFetcher,
    reference: &FaceEmbedding,
    url: &str,
) -> Result<crate::models::Verification, TargetError> {
    let bytes = fetcher.fetch(url).await?;
    let image = preprocess::decode_image(&bytes)?;
    Ok(engine.verify(reference, &image)?)
}
