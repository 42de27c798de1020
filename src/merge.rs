//! Document merge pipeline: grafts per-page overlays onto a loaded PDF.
//!
//! Each stamped page gets its overlay wrapped in a Form XObject and appended
//! to the page's content with a `Do` under a save/restore pair, so existing
//! content keeps its own graphics state. Pages with no applicable stamp pass
//! through byte-identical apart from renumbering. Validation happens up
//! front; nothing is emitted once any step fails.

use crate::error::{Result, StampError};
use crate::pdf::{self, OverlayPage};
use crate::plan;
use crate::security::Security;
use crate::stamp::StampSet;
use crate::types::{Pt, Size};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use sha2::{Digest, Sha256};

/// Applies every stamp to the document and returns the finished bytes,
/// optionally encrypted.
pub fn apply_all(
    pdf_bytes: &[u8],
    stamps: &StampSet,
    security: Option<&Security>,
    alpha_fills: bool,
) -> Result<Vec<u8>> {
    if let Some(security) = security {
        security.validate()?;
    }

    let mut doc = Document::load_mem(pdf_bytes)?;
    if doc.is_encrypted() {
        return Err(StampError::Document(
            "source document is already encrypted".to_string(),
        ));
    }

    let pages = doc.get_pages();
    let page_count = pages.len() as u32;
    if page_count == 0 {
        return Err(StampError::Document("document has no pages".to_string()));
    }
    stamps.validate(page_count)?;

    let page_ids: Vec<(u32, ObjectId)> = pages.iter().map(|(n, id)| (*n, *id)).collect();
    for (page_no, page_id) in page_ids {
        let page_index = (page_no - 1) as usize;
        let page_plan = plan::build_page_plan(stamps, page_index);
        if page_plan.is_empty() {
            continue;
        }
        let page_size = page_size_of(&doc, page_id)?;
        let Some(overlay) = pdf::build_overlay_page(&page_plan, page_size, alpha_fills)? else {
            continue;
        };
        attach_overlay(&mut doc, page_id, page_no, page_size, overlay)?;
    }

    doc.prune_objects();
    doc.renumber_objects();
    doc.compress();

    if let Some(security) = security {
        encrypt_document(&mut doc, security, pdf_bytes)?;
    }

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| StampError::Encode(format!("failed to serialize document: {}", e)))?;
    Ok(out)
}

/// CropBox when present, else MediaBox, else US Letter.
fn page_size_of(doc: &Document, page_id: ObjectId) -> Result<Size> {
    let page = doc.get_object(page_id).and_then(Object::as_dict)?;
    let bbox = page_box(doc, page);
    let numbers: Vec<f32> = bbox.iter().map(object_number).collect();
    if numbers.len() != 4 {
        return Ok(Size::letter());
    }
    Ok(Size::new(
        Pt::from_f32((numbers[2] - numbers[0]).abs()),
        Pt::from_f32((numbers[3] - numbers[1]).abs()),
    ))
}

fn page_box(doc: &Document, page: &lopdf::Dictionary) -> Vec<Object> {
    for key in [b"CropBox".as_slice(), b"MediaBox".as_slice()] {
        let resolved = match page.get(key) {
            Ok(Object::Reference(id)) => doc.get_object(*id).ok(),
            Ok(obj) => Some(obj),
            Err(_) => None,
        };
        if let Some(arr) = resolved.and_then(|obj| obj.as_array().ok()) {
            return arr.clone();
        }
    }
    vec![0.into(), 0.into(), 612.into(), 792.into()]
}

fn object_number(obj: &Object) -> f32 {
    match obj {
        Object::Integer(value) => *value as f32,
        Object::Real(value) => *value,
        _ => 0.0,
    }
}

fn attach_overlay(
    doc: &mut Document,
    page_id: ObjectId,
    page_no: u32,
    page_size: Size,
    overlay: OverlayPage,
) -> Result<()> {
    let mut form_resources = lopdf::Dictionary::new();

    if !overlay.fonts.is_empty() {
        let mut fonts = lopdf::Dictionary::new();
        for variant in &overlay.fonts {
            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => variant.postscript_name(),
            });
            fonts.set(variant.resource_name(), Object::Reference(font_id));
        }
        form_resources.set("Font", Object::Dictionary(fonts));
    }

    if !overlay.images.is_empty() {
        let mut xobjects = lopdf::Dictionary::new();
        for image in &overlay.images {
            let mut image_dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width as i64,
                "Height" => image.height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            };
            if let Some(alpha) = &image.alpha {
                let mask_id = doc.add_object(Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => image.width as i64,
                        "Height" => image.height as i64,
                        "ColorSpace" => "DeviceGray",
                        "BitsPerComponent" => 8,
                    },
                    alpha.clone(),
                ));
                image_dict.set("SMask", Object::Reference(mask_id));
            }
            let image_id = doc.add_object(Stream::new(image_dict, image.rgb.clone()));
            xobjects.set(image.name.as_bytes().to_vec(), Object::Reference(image_id));
        }
        form_resources.set("XObject", Object::Dictionary(xobjects));
    }

    if !overlay.alpha_states.is_empty() {
        let mut states = lopdf::Dictionary::new();
        for state in &overlay.alpha_states {
            let state_id = doc.add_object(dictionary! {
                "Type" => "ExtGState",
                "ca" => state.alpha(),
                "CA" => state.alpha(),
            });
            states.set(
                state.resource_name().as_bytes().to_vec(),
                Object::Reference(state_id),
            );
        }
        form_resources.set("ExtGState", Object::Dictionary(states));
    }

    let form_stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "FormType" => 1,
            "BBox" => vec![
                0.into(),
                0.into(),
                Object::Real(page_size.width.to_f32()),
                Object::Real(page_size.height.to_f32()),
            ],
            "Resources" => Object::Dictionary(form_resources),
        },
        overlay.content.into_bytes(),
    );
    let form_id = doc.add_object(form_stream);
    let form_name = format!("StampOvl{}", page_no);

    let page_dict = doc.get_object(page_id).and_then(Object::as_dict)?.clone();
    let mut resources = page_resources_dict(doc, &page_dict);
    let mut xobjects = page_xobject_dict(doc, &resources);
    xobjects.set(form_name.as_bytes().to_vec(), Object::Reference(form_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    {
        let page_mut = doc.get_object_mut(page_id).and_then(Object::as_dict_mut)?;
        page_mut.set("Resources", Object::Dictionary(resources));
    }

    let do_content = format!("q /{} Do Q\n", form_name).into_bytes();
    doc.add_page_contents(page_id, do_content)?;
    Ok(())
}

fn page_resources_dict(doc: &Document, page: &lopdf::Dictionary) -> lopdf::Dictionary {
    match page.get(b"Resources") {
        Ok(Object::Dictionary(d)) => d.clone(),
        Ok(Object::Reference(id)) => doc
            .get_object(*id)
            .ok()
            .and_then(|o| o.as_dict().ok())
            .cloned()
            .unwrap_or_default(),
        _ => lopdf::Dictionary::new(),
    }
}

fn page_xobject_dict(doc: &Document, resources: &lopdf::Dictionary) -> lopdf::Dictionary {
    match resources.get(b"XObject") {
        Ok(Object::Dictionary(d)) => d.clone(),
        Ok(Object::Reference(id)) => doc
            .get_object(*id)
            .ok()
            .and_then(|o| o.as_dict().ok())
            .cloned()
            .unwrap_or_default(),
        _ => lopdf::Dictionary::new(),
    }
}

fn encrypt_document(doc: &mut Document, security: &Security, source: &[u8]) -> Result<()> {
    use lopdf::encryption::{EncryptionState, EncryptionVersion, Permissions};

    ensure_file_id(doc, source);
    let permissions =
        Permissions::from_bits_truncate(security.restrictions.permission_bits().into());
    let version = EncryptionVersion::V2 {
        document: doc,
        owner_password: &security.owner_password,
        user_password: &security.user_password,
        key_length: 128,
        permissions,
    };
    let state = EncryptionState::try_from(version)
        .map_err(|e| StampError::Encode(format!("failed to build encryption state: {}", e)))?;
    doc.encrypt(&state)
        .map_err(|e| StampError::Encode(format!("failed to encrypt document: {}", e)))?;
    Ok(())
}

/// The encryption key derivation hashes the first trailer /ID element, which
/// many generators never write. Documents without one get a deterministic ID
/// derived from the source bytes.
fn ensure_file_id(doc: &mut Document, source: &[u8]) {
    if doc.trailer.get(b"ID").is_ok() {
        return;
    }
    let mut hasher = Sha256::new();
    hasher.update(source);
    let digest = hasher.finalize();
    let (first, second) = digest.split_at(16);
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(first.to_vec(), StringFormat::Hexadecimal),
            Object::String(second.to_vec(), StringFormat::Hexadecimal),
        ]),
    );
}
