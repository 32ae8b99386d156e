//! Label text shaping: line wrapping in em units, font stack selection and
//! CSS font strings.

use std::collections::HashMap;

const HAIR_SPACE: char = '\u{200A}';
/// Hair spaces inserted between two characters at most.
const MAX_HAIR_SPACES: f64 = 32.0;

/// Measures rendered text width in pixels for a CSS font string.
pub trait TextMeasure {
    fn measure(&self, text: &str, font: &str) -> f64;
}

/// Width estimate from the font size alone: Latin glyphs are 0.6 em wide,
/// CJK and full-width glyphs 1 em.
#[derive(Debug, Default, Copy, Clone)]
pub struct EstimatedMeasure;

impl TextMeasure for EstimatedMeasure {
    fn measure(&self, text: &str, font: &str) -> f64 {
        let size = font_size_px(font).unwrap_or(16.0);
        text.chars()
            .map(|c| {
                if c == HAIR_SPACE {
                    0.1
                } else if is_cjk(c) {
                    1.0
                } else {
                    0.6
                }
            })
            .sum::<f64>()
            * size
    }
}

/// Pixel size out of a CSS font shorthand such as `normal 400 16px/1.2 Arial`.
pub fn font_size_px(font: &str) -> Option<f64> {
    font.split_whitespace().find_map(|token| {
        let size = token.split('/').next()?.strip_suffix("px")?;
        size.parse::<f64>().ok()
    })
}

/// Ideographs, kana, hangul and full-width forms: scripts wrapped per
/// character since they carry no word boundaries.
pub fn is_cjk(c: char) -> bool {
    matches!(
        c as u32,
        0x1100..=0x11FF
            | 0x2E80..=0x2FDF
            | 0x3000..=0x303F
            | 0x3040..=0x30FF
            | 0x3100..=0x31FF
            | 0x3400..=0x4DBF
            | 0x4E00..=0x9FFF
            | 0xAC00..=0xD7AF
            | 0xF900..=0xFAFF
            | 0xFF00..=0xFFEF
            | 0x20000..=0x2FA1F
    )
}

/// Insert `round(spacing / 0.1)` hair spaces between characters.
pub fn apply_letter_spacing(text: &str, letter_spacing: f64) -> String {
    if letter_spacing.is_nan() || letter_spacing < 0.05 {
        return text.to_string();
    }
    let count = (letter_spacing / 0.1).round().min(MAX_HAIR_SPACES) as usize;
    let spacer: String = std::iter::repeat_n(HAIR_SPACE, count).collect();
    let mut out = String::with_capacity(text.len() * (1 + count * 3));
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if let Some(&next) = chars.peek()
            && c != '\n'
            && next != '\n'
        {
            out.push_str(&spacer);
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WrapKey {
    font: String,
    max_width_bits: u64,
    spacing_bits: u64,
    text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FontDescriptor {
    family: String,
    weight: u16,
    style: &'static str,
}

const FONT_WEIGHTS: &[(&str, u16)] = &[
    ("thin", 100),
    ("hairline", 100),
    ("ultra-light", 200),
    ("extra-light", 200),
    ("light", 300),
    ("book", 300),
    ("regular", 400),
    ("normal", 400),
    ("plain", 400),
    ("roman", 400),
    ("standard", 400),
    ("medium", 500),
    ("semi-bold", 600),
    ("demi-bold", 600),
    ("bold", 700),
    ("extra-bold", 800),
    ("ultra-bold", 800),
    ("heavy", 900),
    ("black", 900),
    ("heavy-black", 900),
    ("fat", 900),
    ("poster", 900),
    ("ultra-black", 950),
    ("extra-black", 950),
];

/// Split a style font name such as `Open Sans Semibold Italic` into family,
/// CSS weight and CSS style.
fn parse_font_name(name: &str) -> FontDescriptor {
    let mut parts: Vec<&str> = name.split_whitespace().collect();
    let mut style = "normal";

    if let Some(last) = parts.last() {
        let lower = last.to_lowercase();
        if lower == "italic" || lower == "oblique" {
            style = if lower == "italic" { "italic" } else { "oblique" };
            parts.pop();
        }
    }

    let mut weight = 400;
    if let Some(last) = parts.last() {
        let mut maybe_weight = last.to_lowercase();
        // `BoldItalic` style suffixes glued to the weight word.
        for suffix in ["italic", "oblique"] {
            if maybe_weight.len() > suffix.len()
                && let Some(stripped) = maybe_weight.strip_suffix(suffix)
            {
                style = if suffix == "italic" { "italic" } else { "oblique" };
                maybe_weight = stripped.to_string();
            }
        }
        let previous = if parts.len() > 1 {
            parts[parts.len() - 2].to_lowercase()
        } else {
            String::new()
        };
        let joined = format!("{previous}-{maybe_weight}");
        for (word, value) in FONT_WEIGHTS {
            if maybe_weight == *word || maybe_weight == word.replace('-', "") || joined == *word {
                weight = *value;
                parts.pop();
                if !previous.is_empty() && joined == *word {
                    parts.pop();
                }
                break;
            }
        }
    }

    let family = parts.join(" ").replace("Klokantech Noto Sans", "Noto Sans");
    FontDescriptor {
        family,
        weight,
        style,
    }
}

/// Caches wrapped label text and font conversions for one style function.
pub struct TextShaper {
    measure: Box<dyn TextMeasure>,
    available_fonts: Option<Vec<String>>,
    wrapped: HashMap<WrapKey, String>,
    fonts: HashMap<String, FontDescriptor>,
    chosen: HashMap<Vec<String>, String>,
}

impl std::fmt::Debug for TextShaper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextShaper")
            .field("available_fonts", &self.available_fonts)
            .field("wrapped", &self.wrapped.len())
            .finish_non_exhaustive()
    }
}

impl Default for TextShaper {
    fn default() -> Self {
        Self::new(Box::new(EstimatedMeasure), None)
    }
}

impl TextShaper {
    pub fn new(measure: Box<dyn TextMeasure>, available_fonts: Option<Vec<String>>) -> Self {
        Self {
            measure,
            available_fonts,
            wrapped: HashMap::new(),
            fonts: HashMap::new(),
            chosen: HashMap::new(),
        }
    }

    pub fn set_available_fonts(&mut self, fonts: Option<Vec<String>>) {
        self.available_fonts = fonts;
        self.chosen.clear();
    }

    pub fn available_fonts(&self) -> Option<&[String]> {
        self.available_fonts.as_deref()
    }

    /// Reduce a font stack to the single font used for rendering.
    pub fn choose_font(&mut self, stack: &[String]) -> String {
        if let Some(chosen) = self.chosen.get(stack) {
            return chosen.clone();
        }
        let chosen = match &self.available_fonts {
            Some(available) => stack
                .iter()
                .find(|font| available.contains(*font))
                .or_else(|| available.first())
                .or_else(|| stack.first())
                .cloned()
                .unwrap_or_default(),
            None => stack.first().cloned().unwrap_or_default(),
        };
        self.chosen.insert(stack.to_vec(), chosen.clone());
        chosen
    }

    /// CSS font shorthand, e.g. `normal 700 16px/1.2 "Open Sans", sans-serif`.
    pub fn css_font(&mut self, name: &str, size: f64, line_height: f64) -> String {
        let descriptor = self
            .fonts
            .entry(name.to_string())
            .or_insert_with(|| parse_font_name(name));
        let family = if descriptor.family.contains(' ') {
            format!("\"{}\"", descriptor.family)
        } else {
            descriptor.family.clone()
        };
        let size = crate::expression::format_number(size);
        let line_height = crate::expression::format_number(line_height);
        if family.is_empty() {
            format!(
                "{} {} {size}px/{line_height} sans-serif",
                descriptor.style, descriptor.weight
            )
        } else {
            format!(
                "{} {} {size}px/{line_height} {family}, sans-serif",
                descriptor.style, descriptor.weight
            )
        }
    }

    pub fn measure(&self, text: &str, font: &str) -> f64 {
        self.measure.measure(text, font)
    }

    /// Wrap `text` into lines no wider than `max_width_em` ems of `font`.
    /// Hard line breaks are kept and each hard line is wrapped separately.
    pub fn wrap(&mut self, text: &str, font: &str, max_width_em: f64, letter_spacing: f64) -> String {
        let key = WrapKey {
            font: font.to_string(),
            max_width_bits: max_width_em.to_bits(),
            spacing_bits: letter_spacing.to_bits(),
            text: text.to_string(),
        };
        if let Some(wrapped) = self.wrapped.get(&key) {
            return wrapped.clone();
        }

        let wrapped = text
            .split('\n')
            .map(|line| self.wrap_line(line, font, max_width_em, letter_spacing))
            .collect::<Vec<_>>()
            .join("\n");
        let wrapped = apply_letter_spacing(&wrapped, letter_spacing);
        self.wrapped.insert(key, wrapped.clone());
        wrapped
    }

    fn width(&self, line: &str, font: &str, letter_spacing: f64) -> f64 {
        if letter_spacing >= 0.05 {
            self.measure.measure(&apply_letter_spacing(line, letter_spacing), font)
        } else {
            self.measure.measure(line, font)
        }
    }

    fn wrap_line(&self, text: &str, font: &str, max_width_em: f64, letter_spacing: f64) -> String {
        let em = self.measure.measure("M", font);
        let budget = em * max_width_em;
        let cjk = text.chars().any(is_cjk);

        // CJK packs per character with no separator; everything else per word.
        let (units, separator): (Vec<String>, &str) = if cjk {
            (text.chars().map(String::from).collect(), "")
        } else {
            (text.split(' ').map(str::to_string).collect(), " ")
        };
        if units.len() <= 1 {
            return text.to_string();
        }

        let mut lines: Vec<String> = Vec::new();
        let mut line = String::new();
        for unit in units {
            let candidate = if line.is_empty() {
                unit.clone()
            } else {
                format!("{line}{separator}{unit}")
            };
            if self.width(&candidate, font, letter_spacing) <= budget {
                line = candidate;
            } else {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                line = unit;
            }
        }
        if !line.is_empty() {
            lines.push(line);
        }

        if !cjk {
            self.merge_short_lines(&mut lines, font, budget, letter_spacing);
        }
        lines.retain(|line| !line.trim().is_empty());
        lines.join("\n")
    }

    /// Fold lines narrower than 35% of the budget into their narrower
    /// neighbour.
    fn merge_short_lines(&self, lines: &mut Vec<String>, font: &str, budget: f64, letter_spacing: f64) {
        let mut i = 0;
        while lines.len() > 1 && i < lines.len() {
            let width = self.width(&lines[i], font, letter_spacing);
            if width >= budget * 0.35 {
                i += 1;
                continue;
            }
            let previous = if i > 0 {
                self.width(&lines[i - 1], font, letter_spacing)
            } else {
                f64::INFINITY
            };
            let next = if i + 1 < lines.len() {
                self.width(&lines[i + 1], font, letter_spacing)
            } else {
                f64::INFINITY
            };
            let short = lines.remove(i);
            if previous < next {
                let target = &mut lines[i - 1];
                target.push(' ');
                target.push_str(&short);
                i -= 1;
            } else {
                let target = &mut lines[i];
                *target = format!("{short} {target}");
            }
        }
    }
}
