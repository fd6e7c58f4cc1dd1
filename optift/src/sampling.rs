use crate::{cost_model::CostModel, error::Error};
use anyhow::{Context, Result};
use optift_common::{
    hashing::{Fnv1a, WyRand},
    join_set::JoinSet,
    paths::{sample_cache_path, temp_dir},
    progress::ProgressSink,
};
use optift_fontops::font_info::FontFaceWrapper;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::{
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::{info, warn};

/// The expensive outer operation the harness measures: subset a face to a codepoint set and
/// return the compressed bytes. Must be deterministic per inputs for caching to be meaningful.
pub trait SubsetSource: Send + Sync {
    /// The raw font file bytes, used solely for cache keying.
    fn font_blob(&self) -> &[u8];

    /// Produces a compressed font containing exactly the given sorted codepoints.
    fn subset(&self, codepoints: &[u32]) -> Result<Vec<u8>>;
}

impl SubsetSource for FontFaceWrapper {
    fn font_blob(&self) -> &[u8] {
        FontFaceWrapper::font_blob(self)
    }

    fn subset(&self, codepoints: &[u32]) -> Result<Vec<u8>> {
        let mut set = RoaringBitmap::new();
        for &codepoint in codepoints {
            set.insert(codepoint);
        }
        FontFaceWrapper::subset(self, &set)
    }
}

#[derive(Deserialize, Serialize)]
struct SampleCache {
    raw_data: Vec<(usize, f64)>,
}

/// 64-bit FNV-1a over the font blob, the codepoint universe (4 LE bytes each), the seed and the
/// sample count. Any change to these inputs must invalidate the cache.
pub fn cache_key(font_blob: &[u8], codepoints: &[u32], rng_seed: u64, n_samples: usize) -> u64 {
    let mut hash = Fnv1a::new();
    hash.write(font_blob);
    for &codepoint in codepoints {
        hash.write_u32(codepoint);
    }
    hash.write_u64(rng_seed);
    hash.write_u64(n_samples as u64);
    hash.finish()
}

/// Draws the full sample set for a run up front: the seed alone determines the result,
/// independent of how the samples are later scheduled.
fn draw_samples(codepoints: &[u32], rng_seed: u64, n_samples: usize) -> Vec<Vec<u32>> {
    let mut rng = WyRand::new(rng_seed);
    let mut samples = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        let size = 1 + (rng.rand() % codepoints.len() as u64) as usize;
        samples.push(sample_without_replacement(&mut rng, codepoints, size));
    }
    samples
}

/// Reservoir sampling: an unordered sample of `size` codepoints without replacement, returned
/// sorted for the subsetter.
fn sample_without_replacement(rng: &mut WyRand, codepoints: &[u32], size: usize) -> Vec<u32> {
    let mut sample = codepoints[..size].to_vec();
    for i in size..codepoints.len() {
        let j = (rng.rand() % (i as u64 + 1)) as usize;
        if j < size {
            sample[j] = codepoints[i];
        }
    }
    sample.sort_unstable();
    sample
}

fn load_cache(path: &Path) -> Option<Vec<(usize, f64)>> {
    if !path.is_file() {
        return None;
    }
    let parsed = std::fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|data| Ok(serde_json::from_str::<SampleCache>(&data)?));
    match parsed {
        Ok(cache) => {
            info!("Loaded cost model raw data from {}", path.display());
            Some(cache.raw_data)
        }
        Err(e) => {
            info!("Ignoring unreadable sample cache {}: {e}", path.display());
            None
        }
    }
}

/// Best-effort atomic write; a failure degrades to running uncached next time.
fn store_cache(path: &Path, raw_data: &[(usize, f64)]) {
    let write = || -> Result<()> {
        let json = serde_json::to_string_pretty(&SampleCache { raw_data: raw_data.to_vec() })?;
        let tmp_path = path.with_extension(format!("tmp-{}", std::process::id()));
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    };
    match write() {
        Ok(()) => info!("Saved cost model raw data to {}", path.display()),
        Err(e) => warn!("Could not save sample cache {}: {e}", path.display()),
    }
}

fn fit_from_raw(raw_data: &[(usize, f64)]) -> Result<CostModel, Error> {
    if let CostModel::Linear { cost_per_glyph, cost_base } = CostModel::fit_linear(raw_data)? {
        info!("Approximate linear cost model: y = {cost_per_glyph:.2}x + {cost_base:.2}");
    }
    CostModel::fit_empirical(raw_data)
}

/// Builds an empirical cost model for `source` by measuring real subsetting outcomes on random
/// samples of the codepoint universe. Subsetting runs in parallel; raw results are cached in
/// the temp directory keyed by the run inputs.
pub async fn build_cost_model<S: SubsetSource + 'static>(
    source: Arc<S>,
    codepoints: &[u32],
    rng_seed: u64,
    n_samples: usize,
    progress: Arc<dyn ProgressSink>,
) -> Result<CostModel, Error> {
    if codepoints.is_empty() {
        return Err(Error::InsufficientData);
    }

    let cache_path = match temp_dir() {
        Ok(dir) => Some(sample_cache_path(
            &dir,
            cache_key(source.font_blob(), codepoints, rng_seed, n_samples),
        )),
        Err(e) => {
            warn!("No usable temp directory, sample cache disabled: {e}");
            None
        }
    };

    if let Some(path) = &cache_path {
        if let Some(raw_data) = load_cache(path) {
            return fit_from_raw(&raw_data);
        }
    }

    let samples = draw_samples(codepoints, rng_seed, n_samples);

    progress.start(samples.len());
    let results = Arc::new(Mutex::new(Vec::with_capacity(samples.len())));
    let mut joins = JoinSet::new();
    for sample in samples {
        let source = source.clone();
        let results = results.clone();
        let progress = progress.clone();
        joins.spawn(async move {
            let compressed = source
                .subset(&sample)
                .with_context(|| format!("subsetting a sample of {} codepoints", sample.len()))?;
            let mut results = results.lock().unwrap();
            results.push((sample.len(), compressed.len() as f64));
            progress.tick();
            Ok(())
        });
    }
    joins.join().await.map_err(Error::Subset)?;
    progress.complete();

    let mut raw_data = Arc::try_unwrap(results)
        .expect("sample workers still hold the result vector")
        .into_inner()
        .unwrap();
    // Completion order is arbitrary; pin it down before caching and fitting.
    raw_data.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));

    if let Some(path) = &cache_path {
        store_cache(path, &raw_data);
    }
    fit_from_raw(&raw_data)
}
