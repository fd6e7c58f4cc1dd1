use anyhow::{Context, Result};
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

/// One style of a web font: the file backing it and the CSS properties it is served under.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FontSpec {
    pub path: PathBuf,
    #[serde(default)]
    pub css: BTreeMap<String, String>,
}

/// One page's demand: a weight (relative visit frequency) and the text it renders per style.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputPost {
    pub weight: f64,
    #[serde(default)]
    pub codepoints: BTreeMap<String, String>,
}

/// The input file: a set of font styles and a set of posts using them.
///
/// Fonts and posts are kept in `BTreeMap`s so that iteration order, and with it request order
/// and solver tie-breaking, is reproducible across runs.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Input {
    pub fonts: BTreeMap<String, FontSpec>,
    pub posts: BTreeMap<String, InputPost>,
}
impl Input {
    pub fn load(path: &Path) -> Result<Input> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read input file {}", path.display()))?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Distinct font paths, sorted.
    pub fn unique_font_paths(&self) -> Vec<&Path> {
        let mut paths: Vec<&Path> = self.fonts.values().map(|x| x.path.as_path()).collect();
        paths.sort();
        paths.dedup();
        paths
    }

    /// Names of the styles backed by `font_path`.
    pub fn styles_with_font_path<'a>(
        &'a self,
        font_path: &'a Path,
    ) -> impl Iterator<Item = &'a str> {
        self.fonts
            .iter()
            .filter(move |(_, spec)| spec.path.as_path() == font_path)
            .map(|(name, _)| name.as_str())
    }

    /// Every codepoint any post renders in a style backed by `font_path`, sorted and
    /// deduplicated. The index into this list is the item id used by the partitioner.
    pub fn all_codepoints_sorted(&self, font_path: &Path) -> Vec<u32> {
        let styles: Vec<&str> = self.styles_with_font_path(font_path).collect();
        let mut codepoints = RoaringBitmap::new();
        for post in self.posts.values() {
            for style in &styles {
                if let Some(text) = post.codepoints.get(*style) {
                    for ch in text.chars() {
                        codepoints.insert(ch as u32);
                    }
                }
            }
        }
        codepoints.iter().collect()
    }

    /// Per-post demand for `font_path` in item space, in post order. Posts with no demand on
    /// this font are dropped. Weights are raw; the instance normalizes them.
    pub fn requests_for_font(
        &self,
        font_path: &Path,
        item_to_codepoint: &[u32],
    ) -> Vec<(f64, Vec<usize>)> {
        let styles: Vec<&str> = self.styles_with_font_path(font_path).collect();
        let mut requests = Vec::new();
        for post in self.posts.values() {
            let mut items = BTreeSet::new();
            for style in &styles {
                if let Some(text) = post.codepoints.get(*style) {
                    for ch in text.chars() {
                        let item = item_to_codepoint
                            .binary_search(&(ch as u32))
                            .expect("codepoint not in the sorted universe");
                        items.insert(item);
                    }
                }
            }
            if !items.is_empty() {
                requests.push((post.weight, items.into_iter().collect()));
            }
        }
        requests
    }

    /// The distinct CSS property sets among the styles of `font_path`, in style-name order.
    /// Each gets its own `@font-face` rule per subset.
    pub fn styles_css(&self, font_path: &Path) -> Vec<&BTreeMap<String, String>> {
        let mut result: Vec<&BTreeMap<String, String>> = Vec::new();
        for spec in self
            .fonts
            .values()
            .filter(|spec| spec.path.as_path() == font_path)
        {
            if !result.contains(&&spec.css) {
                result.push(&spec.css);
            }
        }
        result
    }
}
