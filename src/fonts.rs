use std::num::NonZeroUsize;

use cosmic_text::{Attrs, Buffer, Family, FontSystem, Metrics, Shaping, Weight};
use lru::LruCache;

const CACHE_CAPACITY: usize = 2048;

#[derive(Hash, PartialEq, Eq, Clone)]
struct MeasureKey {
    text: String,
    font_size_bits: u32,
    is_bold: bool,
    max_width_bits: Option<u32>,
}

/// Text extents for node-card sizing. Returns `(width, height)`; with a
/// `max_width` the text wraps and the height covers every line.
pub trait TextMeasure {
    fn measure_text(&mut self, text: &str, font_size: f32, is_bold: bool, max_width: Option<f32>) -> (f32, f32);
}

pub struct CosmicTextMeasure {
    font_system: FontSystem,
    cache: LruCache<MeasureKey, (f32, f32)>,
    line_height: f32,
}

impl CosmicTextMeasure {
    pub fn new(line_height: f32) -> Self {
        let capacity = NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            font_system: FontSystem::new(),
            cache: LruCache::new(capacity),
            line_height: if line_height.is_finite() && line_height > 0.0 { line_height } else { 1.2 },
        }
    }
}

impl TextMeasure for CosmicTextMeasure {
    fn measure_text(&mut self, text: &str, font_size: f32, is_bold: bool, max_width: Option<f32>) -> (f32, f32) {
        let key = MeasureKey {
            text: text.to_string(),
            font_size_bits: font_size.to_bits(),
            is_bold,
            max_width_bits: max_width.map(f32::to_bits),
        };

        if let Some(cached) = self.cache.get(&key) {
            return *cached;
        }

        let line_height = font_size * self.line_height;
        let mut buffer = Buffer::new(
            &mut self.font_system,
            Metrics {
                font_size,
                line_height,
            },
        );

        buffer.set_size(&mut self.font_system, max_width, None);

        let attrs = Attrs::new()
            .family(Family::SansSerif)
            .weight(if is_bold { Weight::SEMIBOLD } else { Weight::NORMAL });

        buffer.set_text(&mut self.font_system, text, &attrs, Shaping::Advanced, None);

        let mut total_width: f32 = 0.0;
        let mut total_height: f32 = 0.0;

        for run in buffer.layout_runs() {
            total_width = total_width.max(run.line_w);
            total_height += run.line_height;
        }

        let measured = (total_width, total_height);
        self.cache.put(key, measured);
        measured
    }
}

impl Default for CosmicTextMeasure {
    fn default() -> Self {
        Self::new(1.2)
    }
}

/// Font-free approximation: a fixed advance per character, greedy wrapping
/// on whitespace. Deterministic, so card sizes are stable in tests.
#[derive(Debug, Clone, Copy)]
pub struct EstimateMeasure {
    pub advance: f32,
    pub line_height: f32,
}

impl Default for EstimateMeasure {
    fn default() -> Self {
        Self {
            advance: 0.55,
            line_height: 1.2,
        }
    }
}

impl TextMeasure for EstimateMeasure {
    fn measure_text(&mut self, text: &str, font_size: f32, is_bold: bool, max_width: Option<f32>) -> (f32, f32) {
        let advance = font_size * self.advance * if is_bold { 1.08 } else { 1.0 };
        let line_height = font_size * self.line_height;
        let word_width = |w: &str| w.chars().count() as f32 * advance;

        let mut widest: f32 = 0.0;
        let mut lines = 0usize;
        for paragraph in text.split('\n') {
            let mut current: f32 = 0.0;
            lines += 1;
            for word in paragraph.split_whitespace() {
                let w = word_width(word);
                let candidate = if current > 0.0 { current + advance + w } else { w };
                match max_width {
                    Some(max) if candidate > max && current > 0.0 => {
                        widest = widest.max(current);
                        lines += 1;
                        current = w;
                    }
                    _ => current = candidate,
                }
            }
            widest = widest.max(current);
        }

        (widest, lines as f32 * line_height)
    }
}

/// Greedy word wrap driven by a measurer. Words wider than `max_width`
/// stay on a line of their own.
pub fn wrap_words<T: TextMeasure + ?Sized>(
    measure: &mut T,
    text: &str,
    font_size: f32,
    is_bold: bool,
    max_width: f32,
) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
                continue;
            }
            let candidate = format!("{current} {word}");
            let (width, _) = measure.measure_text(&candidate, font_size, is_bold, None);
            if width > max_width {
                lines.push(std::mem::take(&mut current));
                current.push_str(word);
            } else {
                current = candidate;
            }
        }
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_scales_with_length_and_size() {
        let mut m = EstimateMeasure::default();
        let (short, h) = m.measure_text("abc", 10.0, false, None);
        let (long, _) = m.measure_text("abcdef", 10.0, false, None);
        assert!((short - 16.5).abs() < 0.001);
        assert!((long - 2.0 * short).abs() < 0.001);
        assert!((h - 12.0).abs() < 0.001);
    }

    #[test]
    fn estimate_wraps_to_max_width() {
        let mut m = EstimateMeasure::default();
        let (w, h) = m.measure_text("aaaa bbbb cccc", 10.0, false, Some(50.0));
        // "aaaa bbbb" fits in 49.5, "cccc" wraps.
        assert!(w <= 50.0);
        assert!((h - 24.0).abs() < 0.001);
    }

    #[test]
    fn wrap_words_breaks_between_words() {
        let mut m = EstimateMeasure::default();
        let lines = wrap_words(&mut m, "write the quarterly report", 10.0, false, 80.0);
        assert_eq!(lines, vec!["write the", "quarterly", "report"]);
    }

    #[test]
    fn wrap_words_keeps_empty_text_as_one_line() {
        let mut m = EstimateMeasure::default();
        assert_eq!(wrap_words(&mut m, "", 10.0, false, 80.0), vec![String::new()]);
    }
}
