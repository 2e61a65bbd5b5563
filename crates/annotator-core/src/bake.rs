//! Bake placed elements into the page content of a new PDF
//!
//! Elements are drawn straight into each page's content stream (flattened),
//! not added as annotation objects. The original content is wrapped in
//! `q`/`Q` so its graphics state cannot leak into the drawn elements.
//!
//! One element failing (missing asset, undecodable image) is logged and
//! skipped. Failing to parse or write the document aborts the bake.

use crate::assets::AssetSource;
use crate::config::EditorConfig;
use crate::coords::{text_baseline_y, MediaBox, PdfRect};
use crate::element::{ElementId, ElementKind, PlacedElement};
use crate::error::AnnotatorError;
use crate::render::media_box_of;
use crate::text_layout::{line_height, wrap_text, Helvetica};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::ImageDecoder;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};
use tracing::{info, warn};

/// Parse a hex color (`#RRGGBB`, `RRGGBB` or `#RGB`) to RGB floats in `[0, 1]`
pub fn parse_hex_color(color: &str) -> Result<[f32; 3], AnnotatorError> {
    let hex = color.trim().trim_start_matches('#');
    let invalid = || AnnotatorError::InvalidColor(color.to_string());

    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return Err(invalid()),
    };

    let mut rgb = [0.0f32; 3];
    for (i, channel) in rgb.iter_mut().enumerate() {
        let byte = expanded
            .get(i * 2..i * 2 + 2)
            .and_then(|pair| u8::from_str_radix(pair, 16).ok())
            .ok_or_else(invalid)?;
        *channel = byte as f32 / 255.0;
    }
    Ok(rgb)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BakeOptions {
    pub highlight_opacity: f64,
    pub line_height_factor: f64,
}

impl Default for BakeOptions {
    fn default() -> Self {
        Self {
            highlight_opacity: 0.3,
            line_height_factor: 1.2,
        }
    }
}

impl BakeOptions {
    pub fn from_config(config: &EditorConfig) -> Self {
        Self {
            highlight_opacity: config.highlight.opacity,
            line_height_factor: config.text.line_height_factor,
        }
    }
}

/// Element left out of the output and why
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedElement {
    pub id: ElementId,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct BakeReport {
    pub bytes: Vec<u8>,
    pub skipped: Vec<SkippedElement>,
}

/// Composite `elements` onto a copy of `original` and return the new bytes.
///
/// Image assets are fetched one element at a time, in list order.
pub async fn bake<A: AssetSource>(
    original: &[u8],
    elements: &[PlacedElement],
    assets: &A,
    options: &BakeOptions,
) -> Result<BakeReport, AnnotatorError> {
    let mut doc = Document::load_mem(original).map_err(|e| AnnotatorError::Load(e.to_string()))?;

    if elements.is_empty() {
        return Ok(BakeReport {
            bytes: original.to_vec(),
            skipped: Vec::new(),
        });
    }

    info!(elements = elements.len(), "Baking annotations");

    let pages = doc.get_pages();
    let mut shared = SharedResources::default();
    let mut skipped = Vec::new();

    for element in elements.iter().filter(|el| !pages.contains_key(&el.page)) {
        warn!(element = element.id, page = element.page, "Skipping element on missing page");
        skipped.push(SkippedElement {
            id: element.id,
            reason: AnnotatorError::PageNotFound(element.page).to_string(),
        });
    }

    for (page_num, page_id) in pages {
        let page_elements: Vec<&PlacedElement> =
            elements.iter().filter(|el| el.page == page_num).collect();
        if page_elements.is_empty() {
            continue;
        }

        let media_box = media_box_of(&doc, page_id);
        let mut canvas = PageCanvas::new(&doc, page_id);

        for element in page_elements {
            let drawn = draw_element(
                &mut doc,
                &mut canvas,
                &mut shared,
                element,
                &media_box,
                assets,
                options,
            )
            .await;

            if let Err(e) = drawn {
                let err = AnnotatorError::ElementBake {
                    id: element.id,
                    reason: e.to_string(),
                };
                warn!(element = element.id, error = %err, "Skipping element");
                skipped.push(SkippedElement {
                    id: element.id,
                    reason: e.to_string(),
                });
            }
        }

        canvas.flush(&mut doc, page_id)?;
    }

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| AnnotatorError::Bake(e.to_string()))?;

    info!(
        bytes = output.len(),
        skipped = skipped.len(),
        "Bake complete"
    );
    Ok(BakeReport {
        bytes: output,
        skipped,
    })
}

/// Objects reused across pages within one bake
#[derive(Default)]
struct SharedResources {
    font: Option<ObjectId>,
    highlight_state: Option<ObjectId>,
    images: HashMap<String, EmbeddedImage>,
}

#[derive(Debug, Clone, Copy)]
struct EmbeddedImage {
    id: ObjectId,
}

/// Operations and resources collected for one page before they are written
struct PageCanvas {
    operations: Vec<Operation>,
    taken_names: HashSet<Vec<u8>>,
    fonts: Vec<(String, ObjectId)>,
    states: Vec<(String, ObjectId)>,
    xobjects: Vec<(String, ObjectId)>,
    counter: u32,
}

impl PageCanvas {
    fn new(doc: &Document, page_id: ObjectId) -> Self {
        let mut taken_names = HashSet::new();
        if let Some(resources) = resolve_resources(doc, page_id) {
            for category in [&b"Font"[..], b"ExtGState", b"XObject"] {
                if let Some(sub) = resolve_dict(doc, resources.get(category).ok()) {
                    taken_names.extend(sub.iter().map(|(name, _)| name.clone()));
                }
            }
        }
        Self {
            operations: Vec::new(),
            taken_names,
            fonts: Vec::new(),
            states: Vec::new(),
            xobjects: Vec::new(),
            counter: 0,
        }
    }

    fn fresh_name(&mut self, prefix: &str) -> String {
        loop {
            self.counter += 1;
            let name = format!("{}{}", prefix, self.counter);
            if self.taken_names.insert(name.clone().into_bytes()) {
                return name;
            }
        }
    }

    fn font_name(&mut self, font_id: ObjectId) -> String {
        if let Some((name, _)) = self.fonts.iter().find(|(_, id)| *id == font_id) {
            return name.clone();
        }
        let name = self.fresh_name("AnnF");
        self.fonts.push((name.clone(), font_id));
        name
    }

    fn state_name(&mut self, state_id: ObjectId) -> String {
        if let Some((name, _)) = self.states.iter().find(|(_, id)| *id == state_id) {
            return name.clone();
        }
        let name = self.fresh_name("AnnGs");
        self.states.push((name.clone(), state_id));
        name
    }

    fn xobject_name(&mut self, image_id: ObjectId) -> String {
        if let Some((name, _)) = self.xobjects.iter().find(|(_, id)| *id == image_id) {
            return name.clone();
        }
        let name = self.fresh_name("AnnIm");
        self.xobjects.push((name.clone(), image_id));
        name
    }

    /// Write collected operations and resources into the page
    fn flush(self, doc: &mut Document, page_id: ObjectId) -> Result<(), AnnotatorError> {
        if self.operations.is_empty() {
            return Ok(());
        }

        let mut resources = resolve_resources(doc, page_id).unwrap_or_default();
        for (category, entries) in [
            ("Font", &self.fonts),
            ("ExtGState", &self.states),
            ("XObject", &self.xobjects),
        ] {
            if entries.is_empty() {
                continue;
            }
            let mut sub =
                resolve_dict(doc, resources.get(category.as_bytes()).ok()).unwrap_or_default();
            for (name, id) in entries {
                sub.set(name.as_bytes().to_vec(), Object::Reference(*id));
            }
            resources.set(category, Object::Dictionary(sub));
        }

        let content = Content {
            operations: self.operations,
        }
        .encode()
        .map_err(|e| AnnotatorError::Bake(e.to_string()))?;

        append_content(doc, page_id, content)?;

        let page = doc
            .get_dictionary_mut(page_id)
            .map_err(|e| AnnotatorError::Bake(e.to_string()))?;
        page.set("Resources", Object::Dictionary(resources));
        Ok(())
    }
}

/// Page resources, resolved through references and `Parent` inheritance
fn resolve_resources(doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok();
    while let Some(dict) = node {
        if let Some(resources) = resolve_dict(doc, dict.get(b"Resources").ok()) {
            return Some(resources);
        }
        node = dict
            .get(b"Parent")
            .ok()
            .and_then(|p| p.as_reference().ok())
            .and_then(|id| doc.get_dictionary(id).ok());
    }
    None
}

fn resolve_dict(doc: &Document, obj: Option<&Object>) -> Option<Dictionary> {
    match obj? {
        Object::Dictionary(d) => Some(d.clone()),
        Object::Reference(id) => doc.get_dictionary(*id).ok().cloned(),
        _ => None,
    }
}

/// Append `content` to the page, with the existing content isolated in `q`/`Q`
fn append_content(
    doc: &mut Document,
    page_id: ObjectId,
    content: Vec<u8>,
) -> Result<(), AnnotatorError> {
    let existing: Vec<Object> = {
        let page = doc
            .get_dictionary(page_id)
            .map_err(|e| AnnotatorError::Bake(e.to_string()))?;
        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match doc.get_object(*id) {
                Ok(Object::Array(arr)) => arr.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(arr)) => arr.clone(),
            _ => Vec::new(),
        }
    };

    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let mut body = b"Q\n".to_vec();
    body.extend_from_slice(&content);
    let body_id = doc.add_object(Stream::new(Dictionary::new(), body));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(save_id));
    contents.extend(existing);
    contents.push(Object::Reference(body_id));

    let page = doc
        .get_dictionary_mut(page_id)
        .map_err(|e| AnnotatorError::Bake(e.to_string()))?;
    page.set("Contents", Object::Array(contents));
    Ok(())
}

async fn draw_element<A: AssetSource>(
    doc: &mut Document,
    canvas: &mut PageCanvas,
    shared: &mut SharedResources,
    element: &PlacedElement,
    media_box: &MediaBox,
    assets: &A,
    options: &BakeOptions,
) -> Result<(), AnnotatorError> {
    match &element.kind {
        ElementKind::Text {
            text,
            font_size,
            color,
        } => {
            let font_id = *shared
                .font
                .get_or_insert_with(|| doc.add_object(helvetica_font()));
            let font_name = canvas.font_name(font_id);
            draw_text(canvas, element, &font_name, text, *font_size, color, media_box, options);
            Ok(())
        }
        ElementKind::Highlight { color } => {
            let opacity = options.highlight_opacity as f32;
            let state_id = *shared.highlight_state.get_or_insert_with(|| {
                doc.add_object(dictionary! {
                    "Type" => "ExtGState",
                    "ca" => Object::Real(opacity),
                    "CA" => Object::Real(opacity),
                })
            });
            let state_name = canvas.state_name(state_id);
            let rgb = color_or_black(element.id, color);
            let rect = element.rect.to_pdf(media_box);
            canvas.operations.extend([
                Operation::new("q", vec![]),
                Operation::new("gs", vec![Object::Name(state_name.into_bytes())]),
                fill_color(rgb),
                Operation::new("re", rect_operands(&rect)),
                Operation::new("f", vec![]),
                Operation::new("Q", vec![]),
            ]);
            Ok(())
        }
        ElementKind::Stamp { asset } | ElementKind::Signature { asset } => {
            let image = match shared.images.get(&asset.image_url) {
                Some(image) => *image,
                None => {
                    let bytes = assets.fetch(&asset.image_url).await?;
                    let image = embed_image(doc, &bytes)?;
                    shared.images.insert(asset.image_url.clone(), image);
                    image
                }
            };
            let image_name = canvas.xobject_name(image.id);
            let rect = element.rect.to_pdf(media_box);
            canvas.operations.extend([
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        real(rect.width),
                        real(0.0),
                        real(0.0),
                        real(rect.height),
                        real(rect.x),
                        real(rect.y),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(image_name.into_bytes())]),
                Operation::new("Q", vec![]),
            ]);
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_text(
    canvas: &mut PageCanvas,
    element: &PlacedElement,
    font_name: &str,
    text: &str,
    font_size: f64,
    color: &str,
    media_box: &MediaBox,
    options: &BakeOptions,
) {
    let rgb = color_or_black(element.id, color);
    let lines = wrap_text(&Helvetica, text, font_size, element.rect.width);
    let leading = line_height(font_size, options.line_height_factor);
    let x = media_box.x + element.rect.x;

    canvas.operations.push(Operation::new("q", vec![]));
    canvas.operations.push(fill_color(rgb));
    for (index, line) in lines.iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        let y = text_baseline_y(media_box, element.rect.y, font_size, index, leading);
        canvas.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(font_name.as_bytes().to_vec()), real(font_size)],
            ),
            Operation::new("Td", vec![real(x), real(y)]),
            Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(line), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ]);
    }
    canvas.operations.push(Operation::new("Q", vec![]));
}

fn color_or_black(id: ElementId, color: &str) -> [f32; 3] {
    parse_hex_color(color).unwrap_or_else(|e| {
        warn!(element = id, error = %e, "Falling back to black");
        [0.0, 0.0, 0.0]
    })
}

fn helvetica_font() -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => Helvetica::PDF_NAME,
        "Encoding" => "WinAnsiEncoding",
    }
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

fn fill_color(rgb: [f32; 3]) -> Operation {
    Operation::new("rg", rgb.iter().map(|c| Object::Real(*c)).collect())
}

fn rect_operands(rect: &PdfRect) -> Vec<Object> {
    vec![real(rect.x), real(rect.y), real(rect.width), real(rect.height)]
}

/// Encode text for a WinAnsi simple font; unmappable characters become `?`
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            code @ (0x20..=0x7E | 0xA0..=0xFF) => code as u8,
            0x20AC => 0x80,
            0x2026 => 0x85,
            0x2018 => 0x91,
            0x2019 => 0x92,
            0x201C => 0x93,
            0x201D => 0x94,
            0x2022 => 0x95,
            0x2013 => 0x96,
            0x2014 => 0x97,
            _ => b'?',
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

/// Detect the image format from its leading bytes
pub fn sniff_image_format(bytes: &[u8]) -> Option<ImageFormat> {
    match image::guess_format(bytes).ok()? {
        image::ImageFormat::Png => Some(ImageFormat::Png),
        image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
        _ => None,
    }
}

/// Embed image bytes as an image XObject. The sniffed format is tried
/// first; unknown signatures try PNG, then JPEG.
fn embed_image(doc: &mut Document, bytes: &[u8]) -> Result<EmbeddedImage, AnnotatorError> {
    let order = match sniff_image_format(bytes) {
        Some(ImageFormat::Jpeg) => [ImageFormat::Jpeg, ImageFormat::Png],
        _ => [ImageFormat::Png, ImageFormat::Jpeg],
    };

    let mut last_err = None;
    for format in order {
        let stream = match format {
            ImageFormat::Png => png_xobject(doc, bytes),
            ImageFormat::Jpeg => jpeg_xobject(bytes),
        };
        match stream {
            Ok(stream) => {
                return Ok(EmbeddedImage {
                    id: doc.add_object(stream),
                })
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| AnnotatorError::ImageDecode("unsupported image".to_string())))
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, AnnotatorError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| AnnotatorError::ImageDecode(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| AnnotatorError::ImageDecode(e.to_string()))
}

fn image_dict(width: u32, height: u32, color_space: &str, filter: &str) -> Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => Object::Name(color_space.as_bytes().to_vec()),
        "BitsPerComponent" => 8i64,
        "Filter" => Object::Name(filter.as_bytes().to_vec()),
    }
}

/// Decode a PNG into a Flate image, with alpha split into an SMask
fn png_xobject(doc: &mut Document, bytes: &[u8]) -> Result<Stream, AnnotatorError> {
    let decode_err = |e: png::DecodingError| AnnotatorError::ImageDecode(e.to_string());

    let mut decoder = png::Decoder::new(bytes);
    decoder.set_transformations(png::Transformations::normalize_to_color8());
    let mut reader = decoder.read_info().map_err(decode_err)?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf).map_err(decode_err)?;
    let data = &buf[..info.buffer_size()];

    let (color, alpha, color_space) = match info.color_type {
        png::ColorType::Rgb => (data.to_vec(), None, "DeviceRGB"),
        png::ColorType::Grayscale => (data.to_vec(), None, "DeviceGray"),
        png::ColorType::Rgba => {
            let (color, alpha) = split_alpha(data, 3);
            (color, Some(alpha), "DeviceRGB")
        }
        png::ColorType::GrayscaleAlpha => {
            let (color, alpha) = split_alpha(data, 1);
            (color, Some(alpha), "DeviceGray")
        }
        png::ColorType::Indexed => {
            return Err(AnnotatorError::ImageDecode(
                "indexed PNG was not expanded".to_string(),
            ))
        }
    };

    let mut dict = image_dict(info.width, info.height, color_space, "FlateDecode");
    if let Some(alpha) = alpha {
        let mask = Stream::new(
            image_dict(info.width, info.height, "DeviceGray", "FlateDecode"),
            deflate(&alpha)?,
        );
        let mask_id = doc.add_object(mask);
        dict.set("SMask", Object::Reference(mask_id));
    }
    Ok(Stream::new(dict, deflate(&color)?))
}

fn split_alpha(data: &[u8], color_channels: usize) -> (Vec<u8>, Vec<u8>) {
    let pixel = color_channels + 1;
    let mut color = Vec::with_capacity(data.len() / pixel * color_channels);
    let mut alpha = Vec::with_capacity(data.len() / pixel);
    for chunk in data.chunks_exact(pixel) {
        color.extend_from_slice(&chunk[..color_channels]);
        alpha.push(chunk[color_channels]);
    }
    (color, alpha)
}

/// Pass a JPEG through as DCTDecode, reading size and components from its header
fn jpeg_xobject(bytes: &[u8]) -> Result<Stream, AnnotatorError> {
    let decoder = image::codecs::jpeg::JpegDecoder::new(Cursor::new(bytes))
        .map_err(|e| AnnotatorError::ImageDecode(e.to_string()))?;
    let (width, height) = decoder.dimensions();
    let header = JpegHeader::scan(bytes)
        .ok_or_else(|| AnnotatorError::ImageDecode("JPEG has no frame header".to_string()))?;

    let mut dict = image_dict(width, height, header.color_space()?, "DCTDecode");
    if header.is_inverted_cmyk() {
        let decode: Vec<Object> = [1, 0, 1, 0, 1, 0, 1, 0]
            .into_iter()
            .map(Object::Integer)
            .collect();
        dict.set("Decode", decode);
    }
    Ok(Stream::new(dict, bytes.to_vec()))
}

/// Fields of a JPEG's marker segments needed to tag the embedded stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegHeader {
    components: u8,
    adobe: bool,
}

impl JpegHeader {
    /// Walk the marker segments up to the first scan
    fn scan(bytes: &[u8]) -> Option<Self> {
        if bytes.get(..2)? != [0xFF, 0xD8] {
            return None;
        }
        let mut adobe = false;
        let mut components = None;
        let mut i = 2;
        while i + 1 < bytes.len() {
            if bytes[i] != 0xFF {
                return None;
            }
            let marker = bytes[i + 1];
            i += 2;
            match marker {
                0xFF => {
                    i -= 1;
                    continue;
                }
                0x01 | 0xD0..=0xD7 => continue,
                0xDA | 0xD9 => break,
                _ => {}
            }
            let length = u16::from_be_bytes([*bytes.get(i)?, *bytes.get(i + 1)?]) as usize;
            let segment = bytes.get(i + 2..i + length)?;
            match marker {
                0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                    components = Some(*segment.get(5)?);
                }
                0xEE if segment.starts_with(b"Adobe") => adobe = true,
                _ => {}
            }
            i += length;
        }
        components.map(|components| Self { components, adobe })
    }

    fn color_space(&self) -> Result<&'static str, AnnotatorError> {
        match self.components {
            1 => Ok("DeviceGray"),
            3 => Ok("DeviceRGB"),
            4 => Ok("DeviceCMYK"),
            n => Err(AnnotatorError::ImageDecode(format!(
                "unsupported JPEG component count {}",
                n
            ))),
        }
    }

    /// Adobe writes CMYK JPEGs with inverted samples
    fn is_inverted_cmyk(&self) -> bool {
        self.components == 4 && self.adobe
    }
}
