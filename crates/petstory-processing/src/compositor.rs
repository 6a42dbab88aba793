//! Multi-page printable kit assembly.
//!
//! Fixed page structure: cover, story/biography page with the original photo
//! grid, one coloring page per generated art image, and a 3x3 sticker page.
//! Individual images that fail to open are skipped and composition
//! continues; the only hard failure is having no art images at all.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use printpdf::image_crate::{self, GenericImageView};
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Point, Rgb,
};
use tracing::{debug, info, warn};

use crate::layout::{
    approx_text_width_mm, fit_within, grid_columns, sanitize_text, wrap_text, PT_TO_MM,
};
use petstory_core::slug::name_slug;

// A4 geometry in millimeters.
const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;

/// Embedded image resolution used for scale computation.
const IMAGE_DPI: f32 = 300.0;
const PX_TO_MM_AT_DPI: f32 = 25.4 / IMAGE_DPI;

/// Rotating labels for the coloring pages. Cycled, never random, so the same
/// page count always yields the same labels.
const COLORING_THEMES: [&str; 6] = [
    "Amizade", "Alegria", "Carinho", "Aventura", "Coragem", "Saudade",
];

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// The document has no content to build pages around.
    #[error("at least one generated art image is required")]
    NoArtwork,

    #[error("pdf generation failed: {0}")]
    Pdf(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Inputs for one kit. Image slices hold paths into the order's working
/// directory; the compositor reads them, never copies them.
pub struct KitSpec<'a> {
    pub pet_name: &'a str,
    pub pet_date: &'a str,
    pub pet_story: &'a str,
    pub art_images: &'a [PathBuf],
    pub original_images: &'a [PathBuf],
    pub sticker_images: &'a [PathBuf],
}

/// Total page count for a kit with `art_count` coloring pages: cover +
/// biography + coloring pages + sticker page.
pub fn kit_page_count(art_count: usize) -> usize {
    3 + art_count
}

/// Compose the kit PDF into `out_dir` and return its path.
pub fn compose_digital_kit(
    spec: &KitSpec<'_>,
    out_dir: &Path,
    timestamp: &str,
) -> Result<PathBuf, ComposeError> {
    if spec.art_images.is_empty() {
        return Err(ComposeError::NoArtwork);
    }

    let pet_name = sanitize_text(spec.pet_name);
    let pet_date = sanitize_text(spec.pet_date);
    let pet_story = sanitize_text(spec.pet_story);

    let (doc, cover_page, cover_layer) = PdfDocument::new(
        format!("Kit Digital - {pet_name}"),
        Mm(PAGE_W),
        Mm(PAGE_H),
        "cover",
    );
    let fonts = Fonts::load(&doc)?;

    let cover = doc.get_page(cover_page).get_layer(cover_layer);
    draw_cover(&cover, &fonts, &pet_name, &spec.art_images[0]);

    let (bio_page, bio_layer) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "biography");
    let bio = doc.get_page(bio_page).get_layer(bio_layer);
    draw_biography(
        &bio,
        &fonts,
        &pet_name,
        &pet_date,
        &pet_story,
        spec.original_images,
        &spec.art_images[0],
    );

    for (idx, art_path) in spec.art_images.iter().enumerate() {
        let theme = COLORING_THEMES[idx % COLORING_THEMES.len()];
        let (page, layer) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), format!("coloring-{}", idx + 1));
        let layer = doc.get_page(page).get_layer(layer);
        draw_coloring_page(&layer, &fonts, theme, art_path);
    }

    let pool = sticker_pool(spec.sticker_images, spec.art_images, spec.original_images);
    let (page, layer) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "stickers");
    let layer = doc.get_page(page).get_layer(layer);
    draw_sticker_page(&layer, &fonts, &pet_name, &pool);

    let pdf_path = out_dir.join(format!(
        "kit_digital_{}_{timestamp}.pdf",
        name_slug(spec.pet_name)
    ));
    save_document(doc, &pdf_path)?;

    info!(
        path = %pdf_path.display(),
        pages = kit_page_count(spec.art_images.len()),
        "digital kit composed"
    );
    Ok(pdf_path)
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    oblique: IndirectFontRef,
}

impl Fonts {
    fn load(doc: &PdfDocumentReference) -> Result<Self, ComposeError> {
        Ok(Self {
            regular: doc
                .add_builtin_font(BuiltinFont::Helvetica)
                .map_err(|e| ComposeError::Pdf(e.to_string()))?,
            bold: doc
                .add_builtin_font(BuiltinFont::HelveticaBold)
                .map_err(|e| ComposeError::Pdf(e.to_string()))?,
            oblique: doc
                .add_builtin_font(BuiltinFont::HelveticaOblique)
                .map_err(|e| ComposeError::Pdf(e.to_string()))?,
        })
    }
}

fn save_document(doc: PdfDocumentReference, path: &Path) -> Result<(), ComposeError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    doc.save(&mut writer)
        .map_err(|e| ComposeError::Pdf(e.to_string()))
}

// ----- drawing primitives -----

/// Load an image as RGB for embedding. `None` skips the slot.
fn load_image(path: &Path) -> Option<(Image, u32, u32)> {
    match image_crate::open(path) {
        Ok(img) => {
            let (w, h) = img.dimensions();
            let rgb = image_crate::DynamicImage::ImageRgb8(img.to_rgb8());
            Some((Image::from_dynamic_image(&rgb), w, h))
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping image that failed to open");
            None
        }
    }
}

/// Fit the image at `path` into the box (top-left `x`/`y_top`, `w`x`h` mm),
/// centered on both axes. Returns false when the image had to be skipped.
fn place_image(
    layer: &PdfLayerReference,
    path: &Path,
    x: f32,
    y_top: f32,
    w: f32,
    h: f32,
) -> bool {
    let Some((img, px_w, px_h)) = load_image(path) else {
        return false;
    };

    let (render_w, render_h) = fit_within(px_w as f32, px_h as f32, w, h);
    let offset_x = x + (w - render_w) / 2.0;
    let offset_y_top = y_top + (h - render_h) / 2.0;

    let native_w = px_w as f32 * PX_TO_MM_AT_DPI;
    let native_h = px_h as f32 * PX_TO_MM_AT_DPI;

    img.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(offset_x)),
            translate_y: Some(Mm(PAGE_H - offset_y_top - render_h)),
            scale_x: Some(render_w / native_w),
            scale_y: Some(render_h / native_h),
            dpi: Some(IMAGE_DPI),
            ..Default::default()
        },
    );
    true
}

/// Stroke a rectangle given its top-left corner in page coordinates.
fn stroke_rect(layer: &PdfLayerReference, x: f32, y_top: f32, w: f32, h: f32) {
    let y = PAGE_H - y_top - h;
    let line = Line {
        points: vec![
            (Point::new(Mm(x), Mm(y)), false),
            (Point::new(Mm(x + w), Mm(y)), false),
            (Point::new(Mm(x + w), Mm(y + h)), false),
            (Point::new(Mm(x), Mm(y + h)), false),
        ],
        is_closed: true,
    };
    layer.add_line(line);
}

/// Decorative double border used by the cover and biography pages.
fn draw_border(layer: &PdfLayerReference) {
    layer.set_outline_color(Color::Rgb(Rgb::new(0.35, 0.25, 0.55, None)));
    layer.set_outline_thickness(1.5);
    stroke_rect(layer, 8.0, 8.0, PAGE_W - 16.0, PAGE_H - 16.0);
    layer.set_outline_thickness(0.5);
    stroke_rect(layer, 11.0, 11.0, PAGE_W - 22.0, PAGE_H - 22.0);
}

fn draw_centered_text(
    layer: &PdfLayerReference,
    text: &str,
    font: &IndirectFontRef,
    size_pt: f32,
    y_top: f32,
) {
    let width = approx_text_width_mm(text, size_pt);
    let x = (PAGE_W - width) / 2.0;
    layer.use_text(text, size_pt, Mm(x.max(10.0)), Mm(PAGE_H - y_top), font);
}

/// Render wrapped, justified body text. Every line except a paragraph's last
/// is stretched to the column by widening the inter-word gaps. Returns the
/// y_top position below the rendered block.
fn draw_justified_text(
    layer: &PdfLayerReference,
    text: &str,
    font: &IndirectFontRef,
    size_pt: f32,
    x: f32,
    y_top: f32,
    column_mm: f32,
) -> f32 {
    let line_height = size_pt * PT_TO_MM * 1.45;
    let lines = wrap_text(text, size_pt, column_mm);
    let mut y = y_top;

    for (idx, line) in lines.iter().enumerate() {
        if y > PAGE_H - 18.0 {
            debug!(dropped = lines.len() - idx, "story text exceeds page, truncating");
            break;
        }

        let words: Vec<&str> = line.split_whitespace().collect();
        let is_last = idx + 1 == lines.len();
        let natural = approx_text_width_mm(line, size_pt);

        if is_last || words.len() < 2 || natural >= column_mm {
            layer.use_text(line.as_str(), size_pt, Mm(x), Mm(PAGE_H - y), font);
        } else {
            let space = approx_text_width_mm(" ", size_pt);
            let extra = (column_mm - natural) / (words.len() - 1) as f32;
            let mut cursor = x;
            for word in &words {
                layer.use_text(*word, size_pt, Mm(cursor), Mm(PAGE_H - y), font);
                cursor += approx_text_width_mm(word, size_pt) + space + extra;
            }
        }
        y += line_height;
    }
    y
}

// ----- pages -----

fn draw_cover(layer: &PdfLayerReference, fonts: &Fonts, pet_name: &str, first_art: &Path) {
    draw_border(layer);
    layer.set_fill_color(Color::Rgb(Rgb::new(0.15, 0.1, 0.3, None)));
    draw_centered_text(layer, "Kit Digital", &fonts.bold, 36.0, 45.0);
    draw_centered_text(layer, &format!("de {pet_name}"), &fonts.bold, 26.0, 60.0);

    // First art image centered below the title; fit, never distort.
    if !place_image(layer, first_art, 30.0, 75.0, 150.0, 175.0) {
        debug!("cover art could not be embedded, leaving title-only cover");
    }

    layer.set_fill_color(Color::Rgb(Rgb::new(0.4, 0.4, 0.4, None)));
    draw_centered_text(
        layer,
        "PetStory - memórias para colorir",
        &fonts.oblique,
        11.0,
        275.0,
    );
}

fn draw_biography(
    layer: &PdfLayerReference,
    fonts: &Fonts,
    pet_name: &str,
    pet_date: &str,
    pet_story: &str,
    originals: &[PathBuf],
    first_art: &Path,
) {
    draw_border(layer);
    layer.set_fill_color(Color::Rgb(Rgb::new(0.15, 0.1, 0.3, None)));
    draw_centered_text(
        layer,
        &format!("A História de {pet_name}"),
        &fonts.bold,
        24.0,
        32.0,
    );
    if !pet_date.is_empty() {
        layer.set_fill_color(Color::Rgb(Rgb::new(0.35, 0.35, 0.35, None)));
        draw_centered_text(layer, pet_date, &fonts.oblique, 12.0, 42.0);
    }

    let grid_top = 52.0;
    let story_top = if originals.is_empty() {
        // No originals kept: show the first art image alone.
        place_image(layer, first_art, 55.0, grid_top, 100.0, 105.0);
        grid_top + 115.0
    } else {
        let bottom = draw_photo_grid(layer, originals, grid_top);
        bottom + 8.0
    };

    layer.set_fill_color(Color::Rgb(Rgb::new(0.1, 0.1, 0.1, None)));
    draw_justified_text(layer, pet_story, &fonts.regular, 11.0, 25.0, story_top, 160.0);
}

/// Bordered photo grid with reserved caption space per cell. Column count is
/// picked from the photo count. Returns the grid's bottom edge (y_top mm).
fn draw_photo_grid(layer: &PdfLayerReference, originals: &[PathBuf], grid_top: f32) -> f32 {
    const GRID_X: f32 = 20.0;
    const GRID_W: f32 = 170.0;
    const GRID_MAX_H: f32 = 118.0;
    const CELL_INSET: f32 = 3.0;
    const CAPTION_H: f32 = 8.0;

    let cols = grid_columns(originals.len());
    let rows = originals.len().div_ceil(cols);
    let cell_w = GRID_W / cols as f32;
    let cell_h = (GRID_MAX_H / rows as f32).min(85.0);

    layer.set_outline_color(Color::Rgb(Rgb::new(0.6, 0.6, 0.6, None)));
    layer.set_outline_thickness(0.75);

    for (idx, photo) in originals.iter().enumerate() {
        let col = idx % cols;
        let row = idx / cols;
        let x = GRID_X + col as f32 * cell_w;
        let y = grid_top + row as f32 * cell_h;

        // Frame, then the photo above the reserved caption strip.
        stroke_rect(
            layer,
            x + CELL_INSET,
            y + CELL_INSET,
            cell_w - 2.0 * CELL_INSET,
            cell_h - 2.0 * CELL_INSET,
        );
        place_image(
            layer,
            photo,
            x + 2.0 * CELL_INSET,
            y + 2.0 * CELL_INSET,
            cell_w - 4.0 * CELL_INSET,
            cell_h - 4.0 * CELL_INSET - CAPTION_H,
        );
    }

    grid_top + rows as f32 * cell_h
}

fn draw_coloring_page(layer: &PdfLayerReference, fonts: &Fonts, theme: &str, art: &Path) {
    layer.set_fill_color(Color::Rgb(Rgb::new(0.15, 0.1, 0.3, None)));
    draw_centered_text(
        layer,
        &format!("Para Colorir: {theme}"),
        &fonts.bold,
        20.0,
        22.0,
    );
    // Maximally fill the remaining page area, preserving aspect ratio.
    place_image(layer, art, 12.0, 30.0, PAGE_W - 24.0, PAGE_H - 42.0);
}

/// Candidate images for the sticker page: sticker variants when available,
/// else the coloring art, extended with originals not already present.
fn sticker_pool(
    stickers: &[PathBuf],
    arts: &[PathBuf],
    originals: &[PathBuf],
) -> Vec<PathBuf> {
    let mut pool: Vec<PathBuf> = if stickers.is_empty() {
        arts.to_vec()
    } else {
        stickers.to_vec()
    };
    for photo in originals {
        if !pool.contains(photo) {
            pool.push(photo.clone());
        }
    }
    pool
}

fn draw_sticker_page(
    layer: &PdfLayerReference,
    fonts: &Fonts,
    pet_name: &str,
    pool: &[PathBuf],
) {
    const GRID_X: f32 = 22.0;
    const GRID_TOP: f32 = 45.0;
    const CELL: f32 = 55.5;
    const FOOTPRINT: f32 = 48.0;

    layer.set_fill_color(Color::Rgb(Rgb::new(0.15, 0.1, 0.3, None)));
    draw_centered_text(
        layer,
        &format!("Adesivos de {pet_name}"),
        &fonts.bold,
        22.0,
        30.0,
    );

    if pool.is_empty() {
        return;
    }

    layer.set_outline_color(Color::Rgb(Rgb::new(0.7, 0.7, 0.7, None)));
    layer.set_outline_thickness(0.5);

    // Fixed 3x3 grid, filled left-to-right, top-to-bottom, cycling the pool.
    for idx in 0..9 {
        let col = idx % 3;
        let row = idx / 3;
        let x = GRID_X + col as f32 * CELL;
        let y = GRID_TOP + row as f32 * CELL;

        stroke_rect(layer, x, y, CELL - 3.0, CELL - 3.0);
        let inset = (CELL - 3.0 - FOOTPRINT) / 2.0;
        place_image(
            layer,
            &pool[idx % pool.len()],
            x + inset,
            y + inset,
            FOOTPRINT,
            FOOTPRINT,
        );
    }
}
