//! Pure layout math: fit-within scaling, text sanitization, wrapping and
//! grid sizing. Everything here is unit-testable without touching a PDF.

/// Points to millimeters.
pub const PT_TO_MM: f32 = 25.4 / 72.0;

/// Average Helvetica advance as a fraction of the font size. Builtin fonts
/// ship no metrics table, so wrapping and centering use this estimate.
const AVG_CHAR_WIDTH_EM: f32 = 0.5;

/// Scale a `(w, h)` source into a `(max_w, max_h)` box, preserving aspect
/// ratio and touching the box on at least one axis.
pub fn fit_within(w: f32, h: f32, max_w: f32, max_h: f32) -> (f32, f32) {
    let scaled_w = w * max_h / h;
    if scaled_w <= max_w {
        (scaled_w, max_h)
    } else {
        (max_w, h * max_w / w)
    }
}

/// Strip everything outside the printable Latin-1 range. Accented
/// Western-European letters survive; pictographic symbols and control
/// characters do not. Newlines are kept as paragraph breaks.
pub fn sanitize_text(text: &str) -> String {
    text.chars()
        .filter(|&c| {
            c == '\n'
                || ('\u{20}'..='\u{7E}').contains(&c)
                || ('\u{A0}'..='\u{FF}').contains(&c)
        })
        .collect()
}

/// Estimated rendered width in millimeters for builtin Helvetica.
pub fn approx_text_width_mm(text: &str, font_size_pt: f32) -> f32 {
    text.chars().count() as f32 * font_size_pt * AVG_CHAR_WIDTH_EM * PT_TO_MM
}

/// Greedy word wrap against an estimated column width. Paragraph breaks in
/// the input are preserved as empty-line separators.
pub fn wrap_text(text: &str, font_size_pt: f32, column_mm: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if approx_text_width_mm(&candidate, font_size_pt) <= column_mm || current.is_empty() {
                current = candidate;
            } else {
                lines.push(std::mem::take(&mut current));
                current = word.to_string();
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}

/// Column count for the biography photo grid, chosen by photo count.
pub fn grid_columns(photo_count: usize) -> usize {
    match photo_count {
        0 | 1 => 1,
        2..=4 => 2,
        _ => 3,
    }
}
