use std::path::PathBuf;

pub const FULL_WIDTH_UNDERSCORE: char = '\u{FF3F}';

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub margin_inches: f64,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Paragraph),
    Heading { level: u8, text: String },
    PageBreak,
    Table(Table),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left,
    Center,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Paragraph {
    pub alignment: Alignment,
    pub runs: Vec<Run>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Run {
    Text(TextRun),
    Image(ImageRun),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextRun {
    pub text: String,
    pub bold: bool,
    pub size_pt: Option<usize>,
    pub underline: bool,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageRun {
    pub source: PathBuf,
    pub png: Vec<u8>,
    pub width_in: f64,
    pub height_in: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub alignment: Alignment,
    pub column_widths_in: Vec<f64>,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    pub vertical_center: bool,
    pub paragraphs: Vec<Paragraph>,
}

impl Document {
    pub fn new(margin_inches: f64) -> Self {
        Self {
            margin_inches,
            blocks: Vec::new(),
        }
    }

    pub fn plain_text(&self) -> String {
        let mut lines = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Paragraph(paragraph) => lines.push(paragraph.text()),
                Block::Heading { text, .. } => lines.push(text.clone()),
                Block::PageBreak => {}
                Block::Table(table) => {
                    for cell in table.rows.iter().flatten() {
                        lines.extend(cell.paragraphs.iter().map(Paragraph::text));
                    }
                }
            }
        }
        lines.join("\n")
    }

    pub fn images(&self) -> Vec<&ImageRun> {
        let mut images = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Paragraph(paragraph) => images.extend(paragraph.images()),
                Block::Table(table) => {
                    for cell in table.rows.iter().flatten() {
                        for paragraph in &cell.paragraphs {
                            images.extend(paragraph.images());
                        }
                    }
                }
                Block::Heading { .. } | Block::PageBreak => {}
            }
        }
        images
    }
}

impl Paragraph {
    pub fn aligned(alignment: Alignment) -> Self {
        Self {
            alignment,
            runs: Vec::new(),
        }
    }

    pub fn text(&self) -> String {
        self.runs
            .iter()
            .filter_map(|run| match run {
                Run::Text(text) => Some(text.text.as_str()),
                Run::Image(_) => None,
            })
            .collect()
    }

    pub fn images(&self) -> impl Iterator<Item = &ImageRun> {
        self.runs.iter().filter_map(|run| match run {
            Run::Image(image) => Some(image),
            Run::Text(_) => None,
        })
    }

    pub fn push_text(&mut self, run: TextRun) {
        self.runs.push(Run::Text(run));
    }
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn colored(text: impl Into<String>, color: &str) -> Self {
        Self {
            color: Some(color.to_string()),
            ..Self::plain(text)
        }
    }

    pub fn underlined(mut self) -> Self {
        self.underline = true;
        self
    }
}
