//! Fixed-coordinate page model. Coordinates are in points with the origin at the top-left
//! corner; renderers flip them as their output format requires.

use serde::Serialize;

pub const A4_WIDTH: f32 = 595.28;
pub const A4_HEIGHT: f32 = 841.89;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Font {
    Regular,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawOp {
    /// `y` is the text baseline.
    Text {
        x: f32,
        y: f32,
        size: f32,
        font: Font,
        text: String,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        /// Gray level 0.0 (black) to 1.0 (white); `None` draws the outline only.
        fill: Option<f32>,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        width: f32,
    },
}

/// Approximate Helvetica advance width for one character, in thousandths of the font size.
fn glyph_width(ch: char, font: Font) -> f32 {
    let regular = match ch {
        ' ' | '.' | ',' | ':' | ';' | '!' | '\'' | 'i' | 'j' | 'l' | '|' => 278.0,
        'f' | 't' | 'I' | '(' | ')' | '[' | ']' | '/' | '-' => 333.0,
        'r' => 333.0,
        'm' | 'M' => 833.0,
        'w' => 722.0,
        'W' => 944.0,
        '0'..='9' => 556.0,
        'A'..='Z' => 667.0,
        'a'..='z' => 556.0,
        'É' | 'È' | 'À' | 'Ç' => 667.0,
        _ => 556.0,
    };
    match font {
        Font::Regular => regular,
        Font::Bold => regular * 1.05,
    }
}

/// Width of `text` set in `font` at `size` points.
pub fn text_width(text: &str, size: f32, font: Font) -> f32 {
    text.chars().map(|ch| glyph_width(ch, font)).sum::<f32>() * size / 1000.0
}

/// Greedy word wrap. A single word wider than `width` gets its own line.
pub fn wrap(text: &str, width: f32, size: f32, font: Font) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if !current.is_empty() && text_width(&candidate, size, font) > width {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// A single page worth of drawing operations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageLayout {
    pub width: f32,
    pub height: f32,
    pub ops: Vec<DrawOp>,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::a4()
    }
}

/// Table column: header text, width in points and cell alignment.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub title: &'static str,
    pub width: f32,
    pub align: Align,
}

#[derive(Debug, Clone)]
pub struct TableRow {
    pub cells: Vec<String>,
    pub emphasized: bool,
}

/// Geometry for [`PageLayout::table`].
#[derive(Debug, Clone, Copy)]
pub struct TableStyle {
    pub header_height: f32,
    pub row_height: f32,
    pub font_size: f32,
    pub padding: f32,
    pub header_fill: f32,
}

impl PageLayout {
    pub fn a4() -> Self {
        Self {
            width: A4_WIDTH,
            height: A4_HEIGHT,
            ops: Vec::new(),
        }
    }

    pub fn text(&mut self, x: f32, y: f32, size: f32, font: Font, text: impl Into<String>) {
        self.ops.push(DrawOp::Text {
            x,
            y,
            size,
            font,
            text: text.into(),
        });
    }

    /// Place `text` inside `[x, x + width]` with the requested alignment.
    pub fn aligned_text(
        &mut self,
        x: f32,
        width: f32,
        y: f32,
        size: f32,
        font: Font,
        align: Align,
        text: impl Into<String>,
    ) {
        let text = text.into();
        let measured = text_width(&text, size, font);
        let left = match align {
            Align::Left => x,
            Align::Center => x + (width - measured) / 2.0,
            Align::Right => x + width - measured,
        };
        self.text(left, y, size, font, text);
    }

    /// Center `text` across the full page width.
    pub fn centered_text(&mut self, y: f32, size: f32, font: Font, text: impl Into<String>) {
        let width = self.width;
        self.aligned_text(0.0, width, y, size, font, Align::Center, text);
    }

    pub fn rect(&mut self, x: f32, y: f32, width: f32, height: f32, fill: Option<f32>) {
        self.ops.push(DrawOp::Rect {
            x,
            y,
            width,
            height,
            fill,
        });
    }

    pub fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, width: f32) {
        self.ops.push(DrawOp::Line {
            x1,
            y1,
            x2,
            y2,
            width,
        });
    }

    /// Word-wrapped text starting at baseline `y`. Returns the baseline after the last line.
    pub fn paragraph(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        size: f32,
        line_height: f32,
        text: &str,
    ) -> f32 {
        let mut baseline = y;
        for line in wrap(text, width, size, Font::Regular) {
            self.text(x, baseline, size, Font::Regular, line);
            baseline += line_height;
        }
        baseline
    }

    /// Bordered box of `label: value` lines. Returns the y just below the box.
    pub fn info_box(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        line_height: f32,
        entries: &[(&str, String)],
    ) -> f32 {
        let padding = 8.0;
        let height = entries.len() as f32 * line_height + padding * 2.0;
        self.rect(x, y, width, height, None);

        let label_width = entries
            .iter()
            .map(|(label, _)| text_width(label, 10.0, Font::Bold))
            .fold(0.0_f32, f32::max)
            + 12.0;

        for (index, (label, value)) in entries.iter().enumerate() {
            let baseline = y + padding + line_height * (index as f32 + 1.0) - 4.0;
            self.text(x + padding, baseline, 10.0, Font::Bold, format!("{label} :"));
            self.text(
                x + padding + label_width,
                baseline,
                10.0,
                Font::Regular,
                value.clone(),
            );
        }

        y + height
    }

    /// Header row plus one bordered rectangle per row. Returns the y below the last row.
    pub fn table(
        &mut self,
        x: f32,
        y: f32,
        columns: &[Column],
        rows: &[TableRow],
        style: TableStyle,
    ) -> f32 {
        let total_width: f32 = columns.iter().map(|column| column.width).sum();

        self.rect(x, y, total_width, style.header_height, Some(style.header_fill));
        self.rect(x, y, total_width, style.header_height, None);
        let header_baseline = y + style.header_height / 2.0 + style.font_size / 3.0;
        let mut left = x;
        for column in columns {
            self.aligned_text(
                left,
                column.width,
                header_baseline,
                style.font_size,
                Font::Bold,
                Align::Center,
                column.title,
            );
            left += column.width;
        }

        let mut top = y + style.header_height;
        for row in rows {
            self.rect(x, top, total_width, style.row_height, None);
            let baseline = top + style.row_height / 2.0 + style.font_size / 3.0;
            let font = if row.emphasized {
                Font::Bold
            } else {
                Font::Regular
            };

            let mut left = x;
            for (column, cell) in columns.iter().zip(&row.cells) {
                self.aligned_text(
                    left + style.padding,
                    column.width - style.padding * 2.0,
                    baseline,
                    style.font_size,
                    font,
                    column.align,
                    cell.clone(),
                );
                left += column.width;
            }

            top += style.row_height;
        }

        let mut divider = x;
        for column in columns.iter().take(columns.len().saturating_sub(1)) {
            divider += column.width;
            self.line(divider, y, divider, top, 0.5);
        }

        top
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_measure_uniformly() {
        let width = text_width("1000", 10.0, Font::Regular);
        assert!((width - 22.24).abs() < 0.01);
    }

    #[test]
    fn centered_text_is_balanced_on_page() {
        let mut page = PageLayout::a4();
        page.centered_text(100.0, 12.0, Font::Bold, "REÇU");
        let DrawOp::Text { x, text, size, font, .. } = &page.ops[0] else {
            panic!("expected a text op");
        };
        let width = text_width(text, *size, *font);
        let right_margin = A4_WIDTH - (x + width);
        assert!((x - right_margin).abs() < 0.01);
    }

    #[test]
    fn wrap_breaks_on_word_boundaries() {
        let width = text_width("aaaa bbbb", 10.0, Font::Regular);
        let lines = wrap("aaaa bbbb cccc", width, 10.0, Font::Regular);
        assert_eq!(lines, vec!["aaaa bbbb".to_string(), "cccc".to_string()]);
        assert!(wrap("   ", 100.0, 10.0, Font::Regular).is_empty());
    }

    #[test]
    fn table_draws_one_border_per_row() {
        let mut page = PageLayout::a4();
        let columns = [
            Column {
                title: "A",
                width: 100.0,
                align: Align::Left,
            },
            Column {
                title: "B",
                width: 50.0,
                align: Align::Right,
            },
        ];
        let rows = vec![
            TableRow {
                cells: vec!["x".to_string(), "1".to_string()],
                emphasized: false,
            },
            TableRow {
                cells: vec!["y".to_string(), "2".to_string()],
                emphasized: true,
            },
        ];
        let bottom = page.table(
            40.0,
            200.0,
            &columns,
            &rows,
            TableStyle {
                header_height: 24.0,
                row_height: 22.0,
                font_size: 9.0,
                padding: 4.0,
                header_fill: 0.9,
            },
        );
        assert_eq!(bottom, 200.0 + 24.0 + 22.0 * 2.0);

        let outlines = page
            .ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Rect { fill: None, .. }))
            .count();
        assert_eq!(outlines, 3);
    }
}
