//! In-memory test documents

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// Letter-size invoice with `pages` pages. MediaBox and resources are
/// inherited from the page tree; each page has a line of text in `F1`.
pub fn invoice(pages: usize) -> Vec<u8> {
    invoice_with_font(pages, "F1")
}

/// Same as [`invoice`] with the page font registered as `font_name`
pub fn invoice_with_font(pages: usize, font_name: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            font_name => font_id,
        },
    });

    let mut kids = Vec::new();
    for n in 1..=pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![font_name.into(), 18.into()]),
                Operation::new("Td", vec![50.into(), 740.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("INVOICE page {}", n))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// 4x4 RGBA PNG with a transparent corner
pub fn stamp_png() -> Vec<u8> {
    let mut pixels = Vec::new();
    for i in 0..16u8 {
        let alpha = if i == 0 { 0 } else { 255 };
        pixels.extend_from_slice(&[200, 30, 30, alpha]);
    }

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, 4, 4);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&pixels).unwrap();
    }
    out
}

/// Operations of a page's concatenated content streams
pub fn page_operations(bytes: &[u8], page: u32) -> Vec<Operation> {
    let doc = Document::load_mem(bytes).unwrap();
    let page_id = doc.get_pages()[&page];
    let content = doc.get_page_content(page_id).unwrap();
    Content::decode(&content).unwrap().operations
}

pub fn operators(ops: &[Operation]) -> Vec<&str> {
    ops.iter().map(|op| op.operator.as_str()).collect()
}
