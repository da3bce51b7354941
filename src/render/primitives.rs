use crate::document::{FULL_WIDTH_UNDERSCORE, Paragraph, TextRun};
use crate::layout::{Padding, Palette, ValueKind};
use crate::model::Verdict;
use crate::util::is_blank;

pub const EMPTY_FILLER_WIDTH: usize = 4;

pub fn push_underlined_filler(paragraph: &mut Paragraph, count: usize, color: &str) {
    if count == 0 {
        return;
    }
    let filler: String = std::iter::repeat_n(FULL_WIDTH_UNDERSCORE, count).collect();
    paragraph.push_text(TextRun::colored(filler, color).underlined());
}

pub fn push_empty_filler(paragraph: &mut Paragraph, count: usize, color: &str) {
    if count == 0 {
        return;
    }
    paragraph.push_text(TextRun::colored(" ".repeat(count), color));
}

pub fn push_labelled_value(
    paragraph: &mut Paragraph,
    label: &str,
    value: &str,
    pad: Padding,
    palette: &Palette,
) {
    paragraph.push_text(TextRun::plain(format!("{label} ")));
    push_value(paragraph, value, pad, palette);
}

pub fn push_value(paragraph: &mut Paragraph, value: &str, pad: Padding, palette: &Palette) {
    push_underlined_filler(paragraph, pad.before, &palette.text);

    let run = TextRun::colored(value, &palette.accent);
    paragraph.push_text(if pad.is_blank() { run } else { run.underlined() });

    push_underlined_filler(paragraph, pad.after, &palette.text);
    if pad.is_blank() {
        push_empty_filler(paragraph, EMPTY_FILLER_WIDTH, &palette.text);
    }
}

pub fn format_value(raw: &str, kind: &ValueKind) -> String {
    match kind {
        ValueKind::Text => raw.to_string(),
        ValueKind::PassFail => Verdict::parse(raw).as_str().to_string(),
        ValueKind::Measurement { unit } => format_measurement(raw, unit),
    }
}

fn format_measurement(raw: &str, unit: &str) -> String {
    let value = raw.trim();
    if value.is_empty() {
        return String::new();
    }
    if is_blank(unit) || value.parse::<f64>().is_err() {
        return value.to_string();
    }
    format!("{value} {}", unit.trim())
}
