mod context;
mod primitives;

use crate::document::{Alignment, Block, Cell, Document, Paragraph, Run, Table, TextRun};
use crate::error::QcResult;
use crate::layout::{FunctionalLayout, LayoutProfile, SectionLayout, TitleBlock};

pub use context::{ImageSlot, RenderContext};
#[cfg(test)]
pub use context::load_image;
pub use primitives::format_value;

use primitives::{push_labelled_value, push_underlined_filler};

pub const PAGE_MARGIN_INCHES: f64 = 1.0;

pub fn render(ctx: &RenderContext<'_>, layout: &LayoutProfile) -> QcResult<Document> {
    let mut renderer = Renderer {
        ctx,
        layout,
        document: Document::new(PAGE_MARGIN_INCHES),
    };

    renderer.section(&layout.bare_board, false)?;
    renderer.document.blocks.push(Block::PageBreak);
    renderer.section(&layout.assembled_board, true)?;
    renderer.functional_tests(&layout.functional_tests)?;

    Ok(renderer.document)
}

struct Renderer<'r, 'a> {
    ctx: &'r RenderContext<'a>,
    layout: &'r LayoutProfile,
    document: Document,
}

impl Renderer<'_, '_> {
    fn section(&mut self, section: &SectionLayout, with_component_table: bool) -> QcResult<()> {
        self.title_block(&section.title)?;
        self.heading(&section.heading);

        let record = self.ctx.record;
        let photo = section.photo.as_ref();
        let mut current: Option<Paragraph> = None;

        for item in &section.items {
            let photo_here = photo
                .filter(|slot| slot.before_item.as_deref() == Some(item.label.as_str()));
            if let Some(slot) = photo_here {
                self.flush(&mut current);
                self.photo(&slot.field);
            }

            let value = format_value(record.require(&item.field)?, &item.kind);
            if item.lines > 0 || current.is_none() {
                self.flush(&mut current);
            }
            let paragraph = current.get_or_insert_with(Paragraph::default);
            push_labelled_value(paragraph, &item.label, &value, item.pad, &self.layout.palette);

            if item.lines == 2 {
                self.flush(&mut current);
                let mut trailing = Paragraph::default();
                push_underlined_filler(&mut trailing, item.pad.trailing, &self.layout.palette.text);
                current = Some(trailing);
            }
        }
        self.flush(&mut current);

        if with_component_table {
            self.component_table()?;
        }
        if let Some(slot) = photo.filter(|slot| slot.before_item.is_none()) {
            self.photo(&slot.field);
        }

        Ok(())
    }

    fn title_block(&mut self, title: &TitleBlock) -> QcResult<()> {
        let record = self.ctx.record;
        let layout = self.layout;
        let palette = &layout.palette;

        let text = record.require_or(&title.title_field, title.title_fallback.as_deref())?;
        let mut heading = Paragraph::aligned(Alignment::Center);
        heading.push_text(TextRun {
            bold: true,
            size_pt: Some(title.size_pt),
            ..TextRun::plain(text)
        });
        self.push(heading);

        let mut current: Option<Paragraph> = None;
        for (index, entry) in title.entries.iter().enumerate() {
            if index % title.per_paragraph == 0 {
                self.flush(&mut current);
            }
            let value = record.require_or(&entry.field, entry.fallback.as_deref())?;
            let paragraph = current.get_or_insert_with(Paragraph::default);
            paragraph.push_text(TextRun::colored(entry.label.as_str(), &palette.text));
            push_underlined_filler(paragraph, entry.pad.before, &palette.text);
            paragraph.push_text(TextRun::colored(value, &palette.accent).underlined());
            push_underlined_filler(paragraph, entry.pad.after, &palette.text);
        }
        self.flush(&mut current);

        Ok(())
    }

    fn component_table(&mut self) -> QcResult<()> {
        let layout = self.layout;
        let table_layout = &layout.component_table;
        let label = self.ctx.record.require(&table_layout.label_field)?;

        let mut left = Paragraph::default();
        left.push_text(TextRun::plain(label));

        let mut right = Paragraph::aligned(Alignment::Center);
        let markers = &layout.markers;
        match self.ctx.image(&table_layout.image_field) {
            ImageSlot::Ready(image) => right.runs.push(Run::Image(image.clone())),
            ImageSlot::Blank => right.push_text(self.error_run(&markers.no_image)),
            ImageSlot::Missing => right.push_text(self.error_run(&markers.not_found)),
            ImageSlot::Unreadable(name) => right.push_text(
                self.error_run(&format!("{}: {name}", markers.unreadable)),
            ),
        }

        let cell = |paragraph: Paragraph| Cell {
            vertical_center: true,
            paragraphs: vec![paragraph],
        };
        self.document.blocks.push(Block::Table(Table {
            alignment: Alignment::Center,
            column_widths_in: table_layout.column_widths_in.to_vec(),
            rows: vec![vec![cell(left), cell(right)]],
        }));

        Ok(())
    }

    fn functional_tests(&mut self, functional: &FunctionalLayout) -> QcResult<()> {
        self.heading(&functional.heading);

        for group in functional.items.chunks(functional.per_paragraph) {
            let mut paragraph = Paragraph::default();
            for item in group {
                let value = format_value(self.ctx.record.require(&item.field)?, &item.kind);
                push_labelled_value(
                    &mut paragraph,
                    &item.label,
                    &value,
                    item.pad,
                    &self.layout.palette,
                );
            }
            self.push(paragraph);
        }

        Ok(())
    }

    fn photo(&mut self, field: &str) {
        let layout = self.layout;
        let markers = &layout.markers;
        let run = match self.ctx.image(field) {
            ImageSlot::Ready(image) => Run::Image(image.clone()),
            ImageSlot::Blank => return,
            ImageSlot::Missing if !layout.mark_missing_images => return,
            ImageSlot::Missing => Run::Text(self.error_run(&markers.not_found)),
            ImageSlot::Unreadable(name) => {
                Run::Text(self.error_run(&format!("{}: {name}", markers.unreadable)))
            }
        };

        let mut paragraph = Paragraph::aligned(Alignment::Center);
        paragraph.runs.push(run);
        self.push(paragraph);
    }

    fn heading(&mut self, text: &str) {
        self.document.blocks.push(Block::Heading {
            level: 1,
            text: text.to_string(),
        });
    }

    fn error_run(&self, text: &str) -> TextRun {
        TextRun::colored(text, &self.layout.palette.error)
    }

    fn push(&mut self, paragraph: Paragraph) {
        self.document.blocks.push(Block::Paragraph(paragraph));
    }

    fn flush(&mut self, current: &mut Option<Paragraph>) {
        if let Some(paragraph) = current.take() {
            self.push(paragraph);
        }
    }
}
