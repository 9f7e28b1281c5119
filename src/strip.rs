//! Page stripping: flatten a page to a single raster image
//!
//! Replacing a page's content with one full-page image removes every
//! pre-existing text run while keeping the visible rendering identical, so
//! the only searchable layer in the output is the one the injector adds.
//! The trade-off is loss of vector/text crispness at high zoom; the raster
//! is taken at an upscale factor to compensate.

use crate::geometry::{PageRaster, PageSize};
use crate::PdfError;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;

/// Name of the full-page image XObject installed by stripping
const IMAGE_RESOURCE: &str = "Im0";

/// Replace the page's content with `raster` drawn over the full page
///
/// The page keeps its MediaBox; its `Contents` becomes a single stream that
/// paints the image, and `Resources` is reset so no font (and therefore no
/// text run) survives from the original content.
pub fn strip_page(
    doc: &mut Document,
    page_id: ObjectId,
    size: &PageSize,
    raster: &PageRaster,
) -> Result<(), PdfError> {
    let image_id = doc.add_object(Object::Stream(image_xobject(raster)?));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            // Unit image space scaled to the full page
            Operation::new(
                "cm",
                vec![
                    size.width.into(),
                    0.into(),
                    0.into(),
                    size.height.into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec![IMAGE_RESOURCE.into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content
        .encode()
        .map_err(|e| PdfError::Parse(e.to_string()))?;
    let content_id = doc.add_object(Object::Stream(Stream::new(dictionary! {}, encoded)));

    let page_dict = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| PdfError::Parse(e.to_string()))?;

    page_dict.set("Contents", content_id);
    page_dict.set(
        "Resources",
        dictionary! {
            "XObject" => dictionary! { IMAGE_RESOURCE => image_id },
        },
    );

    Ok(())
}

/// Build the FlateDecode RGB image stream for a page raster
fn image_xobject(raster: &PageRaster) -> Result<Stream, PdfError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raster.rgb)?;
    let compressed = encoder.finish()?;

    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => raster.width as i64,
        "Height" => raster.height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };

    // Content is already deflated; lopdf must not compress it again
    let mut stream = Stream::new(dict, compressed);
    stream.allows_compression = false;
    Ok(stream)
}
