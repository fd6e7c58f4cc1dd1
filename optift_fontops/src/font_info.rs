use anyhow::{bail, Context, Result};
use hb_subset::{Blob, FontFace, SubsetInput};
use roaring::RoaringBitmap;
use std::{
    fmt::{Debug, Formatter},
    sync::Arc,
};
use tracing::debug;

/// A font face loaded for subsetting.
///
/// The raw font bytes are retained, both because HarfBuzz faces borrow their backing blob (a
/// fresh face is created per subsetting call) and because the sample cache is keyed by them.
#[derive(Clone)]
pub struct FontFaceWrapper(Arc<FontFaceData>);
struct FontFaceData {
    font_family: String,
    font_style: String,
    font_version: String,
    available_codepoints: RoaringBitmap,
    font_data: Arc<[u8]>,
}
impl FontFaceWrapper {
    /// Loads the first face of a font file.
    pub fn load(buffer: Vec<u8>) -> Result<FontFaceWrapper> {
        let is_woff = buffer.len() >= 4 && &buffer[0..4] == b"wOFF";
        let is_woff2 = buffer.len() >= 4 && &buffer[0..4] == b"wOF2";

        if is_woff || is_woff2 {
            bail!("woff/woff2 input is not supported. Please convert to .ttf or .otf first.");
        }

        let font_data: Arc<[u8]> = buffer.into();
        let blob = Blob::from_bytes(&font_data)?;
        let font_face = FontFace::new_with_index(blob, 0)?;
        if font_face.glyph_count() == 0 {
            bail!("No glyphs in first font?");
        }

        let font_family = font_face.font_family();
        let font_style = font_face.font_subfamily();
        let font_version = font_face
            .version_string()
            .split(';')
            .next()
            .unwrap()
            .trim()
            .to_string();

        let mut available_codepoints = RoaringBitmap::new();
        for char in &font_face.covered_codepoints()? {
            available_codepoints.insert(char as u32);
        }

        debug!(
            "Loaded font: {font_family} / {font_style} / {font_version} / {} codepoints",
            available_codepoints.len(),
        );

        drop(font_face);

        Ok(FontFaceWrapper(Arc::new(FontFaceData {
            font_family,
            font_style,
            font_version,
            available_codepoints,
            font_data,
        })))
    }

    pub fn all_codepoints(&self) -> &RoaringBitmap {
        &self.0.available_codepoints
    }
    pub fn font_family(&self) -> &str {
        &self.0.font_family
    }
    pub fn font_style(&self) -> &str {
        &self.0.font_style
    }
    pub fn font_version(&self) -> &str {
        &self.0.font_version
    }

    /// The raw bytes of the underlying font file.
    pub fn font_blob(&self) -> &[u8] {
        &self.0.font_data
    }

    /// Subsets the face to exactly `codepoints` and compresses the result to WOFF2.
    pub fn subset(&self, codepoints: &RoaringBitmap) -> Result<Vec<u8>> {
        // Load the font into harfbuzz
        let blob = Blob::from_bytes(&self.0.font_data)?;
        let font = FontFace::new_with_index(blob, 0)?;

        // Prepare the subsetting plan
        let mut subset_input = SubsetInput::new()?;
        subset_input.unicode_set().clear();
        for ch in codepoints {
            let ch = char::from_u32(ch).context("invalid codepoint in subset")?;
            subset_input.unicode_set().insert(ch);
        }

        // Subset the font
        let new_font = subset_input.subset_font(&font)?;
        let new_font = new_font.underlying_blob().to_vec();
        woff::version2::compress(&new_font, String::new(), 9, true)
            .context("woff2 compression failed")
    }
}
impl Debug for FontFaceWrapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[font: {} / {} / {}]",
            self.font_family(),
            self.font_style(),
            self.font_version(),
        )
    }
}
