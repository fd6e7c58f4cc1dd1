use crate::partitioner::PartitionSoln;
use anyhow::Result;
use optift_common::{hashing::WyHashMap, join_set::JoinSet};
use optift_fontops::font_info::FontFaceWrapper;
use roaring::RoaringBitmap;
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
    fs,
    ops::RangeInclusive,
    path::Path,
    sync::Arc,
};
use tracing::debug;

/// One emitted subset: a partition's codepoints and the compressed font built from them.
#[derive(Debug)]
pub struct SubsetInfo {
    partition_idx: usize,
    file_name: String,
    ranges: Vec<RangeInclusive<u32>>,
    woff2_data: Vec<u8>,
}
impl SubsetInfo {
    pub fn partition_idx(&self) -> usize {
        self.partition_idx
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn woff2_data(&self) -> &[u8] {
        &self.woff2_data
    }
}

/// A partitioning of a single font rendered to concrete files and a stylesheet fragment.
///
/// Partitions are re-ordered by descending size before emission; the index in that order names
/// the output file and is what the codepoint map refers to.
pub struct FontPartition {
    styles_css: Vec<BTreeMap<String, String>>,
    entries: Vec<Arc<SubsetInfo>>,
    codepoint_to_partition: WyHashMap<u32, usize>,
}
impl FontPartition {
    pub async fn from_soln(
        face: &FontFaceWrapper,
        soln: &PartitionSoln,
        item_to_codepoint: &[u32],
        output_base: &str,
        styles_css: Vec<BTreeMap<String, String>>,
    ) -> Result<FontPartition> {
        let mut partitions = soln.partitions.clone();
        partitions.sort_by_key(|x| std::cmp::Reverse(x.len()));

        let mut codepoint_to_partition = WyHashMap::default();
        let mut joins = JoinSet::new();
        for (partition_idx, partition) in partitions.iter().enumerate() {
            if partition.is_empty() {
                continue;
            }
            // Items are indices into the sorted codepoint universe, so iterating the item set
            // in order yields sorted codepoints.
            let codepoints: Vec<u32> =
                partition.iter().map(|&item| item_to_codepoint[item]).collect();
            for &codepoint in &codepoints {
                codepoint_to_partition.insert(codepoint, partition_idx);
            }

            let file_name = format!("{output_base}-{partition_idx:02}.woff2");
            let face = face.clone();
            joins.spawn(async move {
                debug!("Encoding subset '{file_name}' with {} codepoints.", codepoints.len());
                let mut subset = RoaringBitmap::new();
                for &codepoint in &codepoints {
                    subset.insert(codepoint);
                }
                let woff2_data = face.subset(&subset)?;
                let ranges = codepoint_ranges(&codepoints);
                Ok(SubsetInfo { partition_idx, file_name, ranges, woff2_data })
            });
        }
        let entries = joins.join().await?.into_iter().map(Arc::new).collect();

        Ok(FontPartition { styles_css, entries, codepoint_to_partition })
    }

    pub fn entries(&self) -> &[Arc<SubsetInfo>] {
        &self.entries
    }

    /// Maps each codepoint to the (descending-size) index of the partition holding it.
    pub fn codepoint_to_partition(&self) -> &WyHashMap<u32, usize> {
        &self.codepoint_to_partition
    }

    /// The compressed size of each emitted partition, by partition index.
    pub fn partition_sizes(&self) -> WyHashMap<usize, u64> {
        self.entries
            .iter()
            .map(|x| (x.partition_idx, x.woff2_data.len() as u64))
            .collect()
    }

    /// Writes the subset font files to the given directory.
    pub fn write_to_store(&self, target: &Path) -> Result<()> {
        let mut path = target.to_path_buf();
        for entry in &self.entries {
            path.push(&entry.file_name);
            debug!("Writing {}...", path.display());
            fs::write(&path, &entry.woff2_data)?;
            path.pop();
        }
        Ok(())
    }

    /// Returns a stylesheet fragment appropriate for using this partitioning.
    pub fn render_css(&self) -> impl Display + '_ {
        FontStylesheetDisplay { sheet: self }
    }
}

/// Collapses sorted codepoints into contiguous inclusive ranges.
fn codepoint_ranges(sorted_codepoints: &[u32]) -> Vec<RangeInclusive<u32>> {
    let mut ranges = Vec::new();
    let mut range_start = None;
    let mut range_last = 0;
    for &codepoint in sorted_codepoints {
        if let Some(start) = range_start {
            if codepoint != range_last + 1 {
                ranges.push(start..=range_last);
                range_start = Some(codepoint);
            }
        } else {
            range_start = Some(codepoint);
        }
        range_last = codepoint;
    }
    if let Some(start) = range_start {
        ranges.push(start..=range_last);
    }
    ranges
}

struct UnicodeRange<'a>(&'a [RangeInclusive<u32>]);
impl Display for UnicodeRange<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for range in self.0 {
            if first {
                first = false;
            } else {
                f.write_str(", ")?;
            }

            if range.start() == range.end() {
                write!(f, "U+{:X}", range.start())?;
            } else {
                write!(f, "U+{:X}-{:X}", range.start(), range.end())?;
            }
        }
        Ok(())
    }
}

struct FontStylesheetDisplay<'a> {
    sheet: &'a FontPartition,
}
impl Display for FontStylesheetDisplay<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for entry in &self.sheet.entries {
            for style in &self.sheet.styles_css {
                writeln!(f, "@font-face {{")?;
                writeln!(f, "    src: url(\"./{}\") format(\"woff2\");", entry.file_name)?;
                writeln!(f, "    unicode-range: {};", UnicodeRange(&entry.ranges))?;
                for (key, value) in style {
                    writeln!(f, "    {key}: {value};")?;
                }
                writeln!(f, "}}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_collapse_contiguous_runs() {
        assert_eq!(codepoint_ranges(&[]), Vec::<RangeInclusive<u32>>::new());
        assert_eq!(codepoint_ranges(&[0x41]), vec![0x41..=0x41]);
        assert_eq!(
            codepoint_ranges(&[0x41, 0x42, 0x43, 0x45, 0x50, 0x51]),
            vec![0x41..=0x43, 0x45..=0x45, 0x50..=0x51]
        );
    }

    #[test]
    fn unicode_range_formats_like_css() {
        let ranges = vec![0x41..=0x43, 0x45..=0x45, 0x4e00..=0x4e01];
        assert_eq!(UnicodeRange(&ranges).to_string(), "U+41-43, U+45, U+4E00-4E01");
    }

    #[test]
    fn stylesheet_emits_one_rule_per_entry_and_style() {
        let mut css_a = BTreeMap::new();
        css_a.insert("font-family".to_string(), "\"A\"".to_string());
        css_a.insert("font-weight".to_string(), "400".to_string());
        let mut css_b = css_a.clone();
        css_b.insert("font-weight".to_string(), "700".to_string());

        let partition = FontPartition {
            styles_css: vec![css_a, css_b],
            entries: vec![Arc::new(SubsetInfo {
                partition_idx: 0,
                file_name: "a-00.woff2".to_string(),
                ranges: vec![0x41..=0x43],
                woff2_data: vec![0; 16],
            })],
            codepoint_to_partition: (0x41..=0x43).map(|x| (x, 0)).collect(),
        };

        let css = partition.render_css().to_string();
        assert_eq!(css.matches("@font-face {").count(), 2);
        assert_eq!(css.matches("src: url(\"./a-00.woff2\") format(\"woff2\");").count(), 2);
        assert_eq!(css.matches("unicode-range: U+41-43;").count(), 2);
        assert_eq!(css.matches("font-weight: 400;").count(), 1);
        assert_eq!(css.matches("font-weight: 700;").count(), 1);

        assert_eq!(partition.partition_sizes().get(&0), Some(&16));
        assert_eq!(partition.codepoint_to_partition().get(&0x42), Some(&0));
    }
}
