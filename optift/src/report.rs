use crate::{partitioner::PartitionInstance, render::FontPartition};
use anyhow::Result;
use flate2::{write::GzEncoder, Compression};
use std::{collections::BTreeSet, io::Write};
use tracing::info;

fn pretty_size(size: f64) -> String {
    const KB: f64 = 1024.0;
    if size < KB {
        format!("{size:7.2}  B")
    } else if size < KB * KB {
        format!("{:7.2} KB", size / KB)
    } else if size < KB * KB * KB {
        format!("{:7.2} MB", size / (KB * KB))
    } else {
        format!("{:7.2} GB", size / (KB * KB * KB))
    }
}

/// Browsers fetch the stylesheet too; count it at its gzipped wire size.
fn gzipped_len(data: &[u8]) -> Result<usize> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?.len())
}

/// Expected transfer for the files actually emitted, as opposed to the modelled cost: each
/// request pays the real compressed size of every partition its codepoints land in.
fn measured_cost(
    instance: &PartitionInstance,
    item_to_codepoint: &[u32],
    partition: &FontPartition,
) -> f64 {
    let sizes = partition.partition_sizes();
    let codepoint_to_partition = partition.codepoint_to_partition();

    let mut total = 0.0;
    for request in instance.requests() {
        let touched: BTreeSet<usize> = request
            .items()
            .iter()
            .map(|&item| codepoint_to_partition[&item_to_codepoint[item]])
            .collect();
        let request_bytes: u64 = touched.iter().map(|idx| sizes[idx]).sum();
        total += request.weight() * request_bytes as f64;
    }
    total
}

/// Logs the realized cost of a solution, optionally against the single-subset baseline.
pub fn log_report(
    instance: &PartitionInstance,
    item_to_codepoint: &[u32],
    partition: &FontPartition,
    predicted_cost: f64,
    baseline: Option<&FontPartition>,
) -> Result<()> {
    let total_cost = measured_cost(instance, item_to_codepoint, partition);
    let css = partition.render_css().to_string();
    let total_cost_with_css = total_cost + gzipped_len(css.as_bytes())? as f64;

    info!("Total cost predicted       : {}", pretty_size(predicted_cost));
    if let Some(baseline) = baseline {
        let baseline_cost = measured_cost(instance, item_to_codepoint, baseline);
        let reduction = (baseline_cost - total_cost) / baseline_cost * 100.0;
        info!(
            "Total cost                 : {} down from {} ({reduction:.2}% reduction)",
            pretty_size(total_cost),
            pretty_size(baseline_cost),
        );

        let baseline_css = baseline.render_css().to_string();
        let baseline_with_css = baseline_cost + gzipped_len(baseline_css.as_bytes())? as f64;
        let reduction = (baseline_with_css - total_cost_with_css) / baseline_with_css * 100.0;
        info!(
            "Total cost w/ CSS (gzipped): {} down from {} ({reduction:.2}% reduction)",
            pretty_size(total_cost_with_css),
            pretty_size(baseline_with_css),
        );
    } else {
        info!("Total cost                 : {}", pretty_size(total_cost));
        info!("Total cost w/ CSS (gzipped): {}", pretty_size(total_cost_with_css));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_size_picks_the_right_unit() {
        assert_eq!(pretty_size(512.0), " 512.00  B");
        assert_eq!(pretty_size(2048.0), "   2.00 KB");
        assert_eq!(pretty_size(3.5 * 1024.0 * 1024.0), "   3.50 MB");
        assert_eq!(pretty_size(2.0 * 1024.0 * 1024.0 * 1024.0), "   2.00 GB");
    }

    #[test]
    fn gzip_shrinks_repetitive_css() {
        let css = "@font-face { unicode-range: U+41-43; }\n".repeat(64);
        let compressed = gzipped_len(css.as_bytes()).unwrap();
        assert!(compressed > 0);
        assert!(compressed < css.len());
    }
}
