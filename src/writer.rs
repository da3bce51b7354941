use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use docx_rs::{
    AlignmentType, BreakType, Docx, PageMargin, Pic, Run as DocxRun, Style, StyleType,
    Table as DocxTable, TableAlignmentType, TableCell, TableRow, VAlignType, WidthType,
};
use tracing::{debug, info};

use crate::document::{Alignment, Block, Cell, Document, ImageRun, Paragraph, Run, TextRun};
use crate::error::{QcError, QcResult};
use crate::resolver::{FileMover, relocate};

const TWIPS_PER_INCH: f64 = 1440.0;
const EMU_PER_INCH: f64 = 914_400.0;
const HEADING_LEVELS: u8 = 3;

pub fn build_docx(document: &Document) -> Docx {
    let margin = twips(document.margin_inches) as i32;
    let mut docx = Docx::new().page_margin(
        PageMargin::new()
            .top(margin)
            .bottom(margin)
            .left(margin)
            .right(margin),
    );

    for level in 1..=HEADING_LEVELS {
        let half_points = 32_usize.saturating_sub(usize::from(level - 1) * 4);
        docx = docx.add_style(
            Style::new(heading_style(level), StyleType::Paragraph)
                .name(format!("Heading {level}"))
                .bold()
                .size(half_points),
        );
    }

    for block in &document.blocks {
        docx = match block {
            Block::Paragraph(paragraph) => docx.add_paragraph(convert_paragraph(paragraph)),
            Block::Heading { level, text } => docx.add_paragraph(
                docx_rs::Paragraph::new()
                    .style(&heading_style((*level).clamp(1, HEADING_LEVELS)))
                    .add_run(DocxRun::new().add_text(text.as_str())),
            ),
            Block::PageBreak => docx.add_paragraph(
                docx_rs::Paragraph::new().add_run(DocxRun::new().add_break(BreakType::Page)),
            ),
            Block::Table(table) => docx.add_table(convert_table(table)),
        };
    }

    docx
}

pub fn write_document(document: &Document, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create document: {}", path.display()))?;
    build_docx(document)
        .build()
        .pack(file)
        .with_context(|| format!("failed to write document: {}", path.display()))?;

    debug!(
        path = %path.display(),
        blocks = document.blocks.len(),
        images = document.images().len(),
        "document written"
    );
    Ok(())
}

pub fn place(
    mover: &dyn FileMover,
    name: &str,
    from_dir: &Path,
    to_dir: &Path,
) -> QcResult<PathBuf> {
    let source = from_dir.join(name);
    let stale = to_dir.join(name);
    if source == stale {
        return Err(QcError::Relocate {
            name: name.to_string(),
            from: from_dir.to_path_buf(),
            to: to_dir.to_path_buf(),
            reason: "source and destination are the same file".to_string(),
        });
    }
    if source.is_file() && stale.is_file() {
        fs::remove_file(&stale).map_err(|err| QcError::Relocate {
            name: name.to_string(),
            from: from_dir.to_path_buf(),
            to: to_dir.to_path_buf(),
            reason: format!("failed to replace previous document: {err}"),
        })?;
        info!(path = %stale.display(), "replacing previous document");
    }

    relocate(mover, from_dir, to_dir, name)
}

fn heading_style(level: u8) -> String {
    format!("Heading{level}")
}

fn twips(inches: f64) -> usize {
    (inches * TWIPS_PER_INCH).round().max(0.0) as usize
}

fn emu(inches: f64) -> u32 {
    (inches * EMU_PER_INCH).round().max(0.0) as u32
}

fn convert_paragraph(paragraph: &Paragraph) -> docx_rs::Paragraph {
    let mut converted = docx_rs::Paragraph::new();
    if paragraph.alignment == Alignment::Center {
        converted = converted.align(AlignmentType::Center);
    }

    for run in &paragraph.runs {
        converted = converted.add_run(match run {
            Run::Text(text) => convert_text(text),
            Run::Image(image) => convert_image(image),
        });
    }
    converted
}

fn convert_text(text: &TextRun) -> DocxRun {
    let mut run = DocxRun::new().add_text(text.text.as_str());
    if text.bold {
        run = run.bold();
    }
    if let Some(size_pt) = text.size_pt {
        run = run.size(size_pt * 2);
    }
    if text.underline {
        run = run.underline("thick");
    }
    if let Some(color) = &text.color {
        run = run.color(color.as_str());
    }
    run
}

fn convert_image(image: &ImageRun) -> DocxRun {
    debug!(source = %image.source.display(), "embedding image");
    let pic = Pic::new(&image.png).size(emu(image.width_in), emu(image.height_in));
    DocxRun::new().add_image(pic)
}

fn convert_table(table: &crate::document::Table) -> DocxTable {
    let grid: Vec<usize> = table.column_widths_in.iter().map(|w| twips(*w)).collect();

    let rows = table
        .rows
        .iter()
        .map(|row| {
            let cells = row
                .iter()
                .enumerate()
                .map(|(index, cell)| convert_cell(cell, grid.get(index).copied()))
                .collect();
            TableRow::new(cells)
        })
        .collect();

    let mut converted = DocxTable::new(rows).set_grid(grid);
    if table.alignment == Alignment::Center {
        converted = converted.align(TableAlignmentType::Center);
    }
    converted
}

fn convert_cell(cell: &Cell, width_twips: Option<usize>) -> TableCell {
    let mut converted = TableCell::new();
    for paragraph in &cell.paragraphs {
        converted = converted.add_paragraph(convert_paragraph(paragraph));
    }
    if cell.vertical_center {
        converted = converted.vertical_align(VAlignType::Center);
    }
    if let Some(width) = width_twips {
        converted = converted.width(width, WidthType::Dxa);
    }
    converted
}
