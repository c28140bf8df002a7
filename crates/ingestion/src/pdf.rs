//! PDF page extraction module
//!
//! Extracts one page record per PDF page using lopdf: the page text with its
//! line structure intact, plus the images placed on the page, written to an
//! image directory for OCR. JPEG and JPEG2000 streams are written as-is;
//! raw or Flate/LZW compressed samples are re-encoded as PNG.

use crate::errors::IngestionError;
use crate::ocr::ImageTextRecognizer;
use crate::source::PageSource;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use lopdf::{Document, Object, ObjectId};
use outlook_common::models::{ImageRecord, PageRecord};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Images recognized concurrently per page
const OCR_CONCURRENCY: usize = 4;

/// Page source reading a single PDF file
pub struct PdfPageSource {
    path: PathBuf,
    image_dir: PathBuf,
    recognizer: Option<Arc<dyn ImageTextRecognizer>>,
}

impl PdfPageSource {
    /// `recognizer` is `None` when OCR is disabled; images are still extracted
    pub fn new(
        path: impl Into<PathBuf>,
        image_dir: impl Into<PathBuf>,
        recognizer: Option<Arc<dyn ImageTextRecognizer>>,
    ) -> Self {
        Self {
            path: path.into(),
            image_dir: image_dir.into(),
            recognizer,
        }
    }

    /// Document name: the file name without its `.pdf` extension
    pub fn doc_name(&self) -> String {
        doc_name_for(&self.path)
    }

    async fn recognize_images(&self, page: RawPage) -> PageRecord {
        let number = page.number;
        let images = match &self.recognizer {
            None => page
                .image_paths
                .iter()
                .map(|p| image_record(number, p, String::new()))
                .collect(),
            Some(recognizer) => {
                stream::iter(page.image_paths.iter().cloned())
                    .map(|image_path| {
                        let recognizer = recognizer.clone();
                        async move {
                            let text = match recognizer.recognize(&image_path).await {
                                Ok(text) => text.trim().to_string(),
                                Err(e) => {
                                    warn!(page = number, error = %e, "OCR failed, keeping image without text");
                                    String::new()
                                }
                            };
                            image_record(number, &image_path, text)
                        }
                    })
                    .buffered(OCR_CONCURRENCY)
                    .collect()
                    .await
            }
        };

        PageRecord {
            doc_name: page.doc_name,
            page: page.number,
            text: page.text,
            images,
        }
    }
}

#[async_trait]
impl PageSource for PdfPageSource {
    fn name(&self) -> String {
        self.doc_name()
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn pages(&self) -> Result<Vec<PageRecord>, IngestionError> {
        if !self.path.exists() {
            return Err(IngestionError::FileNotFound(self.path.display().to_string()));
        }

        let path = self.path.clone();
        let image_dir = self.image_dir.clone();
        let raw_pages = tokio::task::spawn_blocking(move || extract_raw_pages(&path, &image_dir))
            .await
            .map_err(|e| IngestionError::PdfParseError {
                path: self.path.display().to_string(),
                message: format!("Extraction task failed: {}", e),
            })??;

        let pages: Vec<PageRecord> = stream::iter(raw_pages)
            .then(|raw| self.recognize_images(raw))
            .collect()
            .await;

        info!(
            doc_name = %self.doc_name(),
            pages = pages.len(),
            images = pages.iter().map(|p| p.images.len()).sum::<usize>(),
            "PDF extracted"
        );

        Ok(pages)
    }
}

/// Page text and image files before OCR
struct RawPage {
    doc_name: String,
    number: u32,
    text: String,
    image_paths: Vec<PathBuf>,
}

fn image_record(page: u32, path: &Path, ocr_text: String) -> ImageRecord {
    ImageRecord {
        page,
        image_path: path.display().to_string(),
        ocr_text,
    }
}

fn doc_name_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "untitled".to_string())
}

/// Extract every page of a PDF file, in page order
fn extract_raw_pages(path: &Path, image_dir: &Path) -> Result<Vec<RawPage>, IngestionError> {
    let doc = Document::load(path).map_err(|e| IngestionError::PdfParseError {
        path: path.display().to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;

    std::fs::create_dir_all(image_dir)?;

    let doc_name = doc_name_for(path);
    let pages = doc.get_pages();

    debug!(page_count = pages.len(), "Extracting pages from PDF");

    let mut result = Vec::with_capacity(pages.len());

    for (&page_num, &page_id) in pages.iter() {
        let text = match extract_page_text(&doc, page_num, page_id) {
            Ok(text) => clean_text(&text),
            Err(e) => {
                warn!(page = page_num, error = %e, "Failed to extract text from page, keeping it empty");
                String::new()
            }
        };

        let image_paths = extract_page_images(&doc, &doc_name, page_num, page_id, image_dir);

        result.push(RawPage {
            doc_name: doc_name.clone(),
            number: page_num,
            text,
            image_paths,
        });
    }

    if result.iter().all(|p| p.text.trim().is_empty() && p.image_paths.is_empty()) {
        return Err(IngestionError::PdfParseError {
            path: path.display().to_string(),
            message: "No text content extracted from PDF".to_string(),
        });
    }

    Ok(result)
}

/// Extract text from a single page, one line per text line of the page
fn extract_page_text(doc: &Document, page_num: u32, page_id: ObjectId) -> Result<String, String> {
    match doc.extract_text(&[page_num]) {
        Ok(text) => Ok(text),
        Err(e) => {
            debug!(page = page_num, error = %e, "lopdf text extraction failed, parsing content stream");
            let content = doc.get_page_content(page_id).map_err(|e| e.to_string())?;
            Ok(extract_text_from_content(&content))
        }
    }
}

/// Extract text from a PDF content stream, one line per BT/ET block
fn extract_text_from_content(content: &[u8]) -> String {
    let content_str = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;
    let mut current_text = String::new();

    for line in content_str.lines() {
        let trimmed = line.trim();

        if trimmed == "BT" {
            in_text_block = true;
            continue;
        }

        if trimmed == "ET" {
            in_text_block = false;
            if !current_text.is_empty() {
                text.push_str(&current_text);
                text.push('\n');
                current_text.clear();
            }
            continue;
        }

        if in_text_block {
            // T* and ' start a new text line inside the block
            if (trimmed == "T*" || trimmed.ends_with('\'')) && !current_text.is_empty() {
                text.push_str(&current_text);
                text.push('\n');
                current_text.clear();
            }
            if let Some(text_content) = extract_text_from_operator(trimmed) {
                current_text.push_str(&text_content);
            }
        }
    }

    text
}

/// Extract text from a PDF text operator
fn extract_text_from_operator(line: &str) -> Option<String> {
    // (text) Tj, (text) ' and (text) "
    if line.ends_with("Tj") || line.ends_with('\'') || line.ends_with('"') {
        if let (Some(start), Some(end)) = (line.find('('), line.rfind(')')) {
            if start < end {
                return Some(decode_pdf_string(&line[start + 1..end]));
            }
        }
    }

    // [(text) num (text) num] TJ
    if line.ends_with("TJ") {
        let mut result = String::new();
        let mut in_paren = false;
        let mut current = String::new();

        for ch in line.chars() {
            match ch {
                '(' => in_paren = true,
                ')' => {
                    in_paren = false;
                    result.push_str(&decode_pdf_string(&current));
                    current.clear();
                }
                _ if in_paren => current.push(ch),
                _ => {}
            }
        }

        if !result.is_empty() {
            return Some(result);
        }
    }

    None
}

/// Decode PDF string escapes
fn decode_pdf_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some(c) => result.push(c),
                None => {}
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Clean extracted text line by line; line breaks carry heading structure
fn clean_text(text: &str) -> String {
    text.lines()
        .map(|line| {
            line.split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .replace('\u{FEFF}', "")
                .replace(['\u{201C}', '\u{201D}'], "\"")
                .replace(['\u{2018}', '\u{2019}'], "'")
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Write the page's image XObjects to `image_dir`.
/// Images that cannot be decoded or written are skipped with a warning.
fn extract_page_images(
    doc: &Document,
    doc_name: &str,
    page_num: u32,
    page_id: ObjectId,
    image_dir: &Path,
) -> Vec<PathBuf> {
    let xobjects = match page_xobjects(doc, page_id) {
        Ok(Some(xobjects)) => xobjects,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(page = page_num, error = %e, "Failed to read page resources, skipping images");
            return Vec::new();
        }
    };

    let mut paths = Vec::new();

    for (idx, (name, object)) in xobjects.iter().enumerate() {
        let xobject = String::from_utf8_lossy(name);
        let stream = match resolve(doc, object).and_then(|o| o.as_stream()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(page = page_num, %xobject, error = %e, "Image extraction failed");
                continue;
            }
        };

        let is_image = stream
            .dict
            .get(b"Subtype")
            .and_then(|s| s.as_name())
            .map(|s| s == b"Image")
            .unwrap_or(false);
        if !is_image {
            continue;
        }

        let file = match encode_image(doc, stream) {
            Ok(file) => file,
            Err(e) => {
                warn!(page = page_num, %xobject, error = %e, "Skipping image that cannot be written");
                continue;
            }
        };

        let image_id = format!(
            "{}_p{}_{}_{}",
            doc_name,
            page_num,
            idx,
            &uuid::Uuid::new_v4().simple().to_string()[..6]
        );
        let image_path = image_dir.join(format!("{}.{}", image_id, file.extension));

        match std::fs::write(&image_path, &file.bytes) {
            Ok(()) => paths.push(image_path),
            Err(e) => warn!(page = page_num, %xobject, error = %e, "Image extraction failed"),
        }
    }

    paths
}

fn page_xobjects(
    doc: &Document,
    page_id: ObjectId,
) -> Result<Option<lopdf::Dictionary>, lopdf::Error> {
    let page = doc.get_dictionary(page_id)?;
    let Ok(resources) = page.get(b"Resources") else {
        return Ok(None);
    };
    let resources = resolve(doc, resources)?.as_dict()?;
    let Ok(xobjects) = resources.get(b"XObject") else {
        return Ok(None);
    };
    Ok(Some(resolve(doc, xobjects)?.as_dict()?.clone()))
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Result<&'a Object, lopdf::Error> {
    match object {
        Object::Reference(id) => doc.get_object(*id),
        other => Ok(other),
    }
}

/// Image bytes ready to be written, with their file extension
struct ImageFile<'a> {
    extension: &'static str,
    bytes: Cow<'a, [u8]>,
}

/// Sample layout of a raw image stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SampleLayout {
    width: u32,
    height: u32,
    bits: u8,
    color: ColorModel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColorModel {
    Gray,
    Rgb,
    Cmyk,
}

impl ColorModel {
    fn components(self) -> usize {
        match self {
            ColorModel::Gray => 1,
            ColorModel::Rgb => 3,
            ColorModel::Cmyk => 4,
        }
    }
}

fn encode_image<'a>(doc: &Document, stream: &'a lopdf::Stream) -> Result<ImageFile<'a>, String> {
    let filters = filter_names(doc, stream.dict.get(b"Filter").ok())?;

    match filters.as_slice() {
        [b"DCTDecode"] => {
            return Ok(ImageFile {
                extension: "jpg",
                bytes: Cow::Borrowed(stream.content.as_slice()),
            })
        }
        [b"JPXDecode"] => {
            return Ok(ImageFile {
                extension: "jp2",
                bytes: Cow::Borrowed(stream.content.as_slice()),
            })
        }
        _ => {}
    }

    if let Some(unsupported) = filters
        .iter()
        .copied()
        .find(|f| !matches!(*f, b"FlateDecode" | b"LZWDecode"))
    {
        return Err(format!(
            "unsupported image filter {}",
            String::from_utf8_lossy(unsupported)
        ));
    }

    let samples = if filters.is_empty() {
        Cow::Borrowed(stream.content.as_slice())
    } else {
        Cow::Owned(stream.decompressed_content().map_err(|e| e.to_string())?)
    };

    let layout = sample_layout(doc, &stream.dict)?;

    Ok(ImageFile {
        extension: "png",
        bytes: Cow::Owned(encode_png(layout, &samples)?),
    })
}

fn filter_names<'a>(doc: &'a Document, filter: Option<&'a Object>) -> Result<Vec<&'a [u8]>, String> {
    let Some(filter) = filter else {
        return Ok(Vec::new());
    };
    match resolve(doc, filter).map_err(|e| e.to_string())? {
        Object::Array(filters) => filters
            .iter()
            .map(|f| {
                resolve(doc, f)
                    .and_then(|f| f.as_name())
                    .map_err(|e| e.to_string())
            })
            .collect(),
        name => Ok(vec![name.as_name().map_err(|e| e.to_string())?]),
    }
}

fn sample_layout(doc: &Document, dict: &lopdf::Dictionary) -> Result<SampleLayout, String> {
    let dimension = |key: &[u8]| -> Result<u32, String> {
        dict.get(key)
            .and_then(|v| v.as_i64())
            .ok()
            .and_then(|v| u32::try_from(v).ok())
            .filter(|&v| v > 0)
            .ok_or_else(|| format!("missing or invalid {}", String::from_utf8_lossy(key)))
    };

    let is_mask = dict
        .get(b"ImageMask")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let (bits, color) = if is_mask {
        (1, ColorModel::Gray)
    } else {
        let bits = dict
            .get(b"BitsPerComponent")
            .and_then(|v| v.as_i64())
            .map_err(|_| "missing BitsPerComponent".to_string())?;
        let color_space = dict
            .get(b"ColorSpace")
            .map_err(|_| "missing ColorSpace".to_string())?;
        let bits = u8::try_from(bits).map_err(|_| format!("invalid BitsPerComponent {}", bits))?;
        (bits, color_model(doc, color_space)?)
    };

    Ok(SampleLayout {
        width: dimension(b"Width".as_slice())?,
        height: dimension(b"Height".as_slice())?,
        bits,
        color,
    })
}

fn color_model(doc: &Document, color_space: &Object) -> Result<ColorModel, String> {
    let color_space = resolve(doc, color_space).map_err(|e| e.to_string())?;
    let name = match color_space {
        Object::Array(items) => {
            let family = items.first().and_then(|f| f.as_name().ok());
            if family == Some(b"ICCBased".as_slice()) {
                let components = items
                    .get(1)
                    .and_then(|profile| resolve(doc, profile).ok())
                    .and_then(|profile| profile.as_stream().ok())
                    .and_then(|profile| profile.dict.get(b"N").and_then(|n| n.as_i64()).ok());
                return match components {
                    Some(1) => Ok(ColorModel::Gray),
                    Some(3) => Ok(ColorModel::Rgb),
                    Some(4) => Ok(ColorModel::Cmyk),
                    other => Err(format!("unsupported ICC component count {:?}", other)),
                };
            }
            family.ok_or_else(|| "empty color space".to_string())?
        }
        other => other.as_name().map_err(|e| e.to_string())?,
    };

    match name {
        b"DeviceGray" | b"CalGray" | b"G" => Ok(ColorModel::Gray),
        b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(ColorModel::Rgb),
        b"DeviceCMYK" | b"CMYK" => Ok(ColorModel::Cmyk),
        other => Err(format!(
            "unsupported color space {}",
            String::from_utf8_lossy(other)
        )),
    }
}

/// Encode raw image samples as a PNG file
fn encode_png(layout: SampleLayout, samples: &[u8]) -> Result<Vec<u8>, String> {
    let row_bytes =
        (layout.width as usize * layout.color.components() * layout.bits as usize + 7) / 8;
    let expected = row_bytes * layout.height as usize;
    if samples.len() < expected {
        return Err(format!(
            "expected {} sample bytes, found {}",
            expected,
            samples.len()
        ));
    }
    let samples = &samples[..expected];

    let (color, data) = match layout.color {
        ColorModel::Gray => (png::ColorType::Grayscale, Cow::Borrowed(samples)),
        ColorModel::Rgb => (png::ColorType::Rgb, Cow::Borrowed(samples)),
        ColorModel::Cmyk if layout.bits == 8 => (png::ColorType::Rgb, Cow::Owned(cmyk_to_rgb(samples))),
        ColorModel::Cmyk => return Err(format!("unsupported {}-bit CMYK image", layout.bits)),
    };

    let depth = match (layout.bits, color) {
        (8, _) => png::BitDepth::Eight,
        (16, _) => png::BitDepth::Sixteen,
        (1, png::ColorType::Grayscale) => png::BitDepth::One,
        (2, png::ColorType::Grayscale) => png::BitDepth::Two,
        (4, png::ColorType::Grayscale) => png::BitDepth::Four,
        (bits, _) => return Err(format!("unsupported {}-bit {:?} image", bits, layout.color)),
    };

    let mut out = Vec::new();
    let mut encoder = png::Encoder::new(&mut out, layout.width, layout.height);
    encoder.set_color(color);
    encoder.set_depth(depth);
    let mut writer = encoder.write_header().map_err(|e| e.to_string())?;
    writer.write_image_data(&data).map_err(|e| e.to_string())?;
    writer.finish().map_err(|e| e.to_string())?;

    Ok(out)
}

fn cmyk_to_rgb(samples: &[u8]) -> Vec<u8> {
    samples
        .chunks_exact(4)
        .flat_map(|px| {
            let k = 255 - px[3] as u16;
            [0, 1, 2].map(|i| ((255 - px[i] as u16) * k / 255) as u8)
        })
        .collect()
}
