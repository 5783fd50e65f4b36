//! Page layout: flows the block model onto A4 pages.
//!
//! All coordinates are PDF points with the origin at the bottom-left corner.
//! The writer keeps a single cursor (`y`, the top of the free area) and every
//! vertical movement goes through [`PageWriter::advance`], which is also where
//! block quote bars get painted so they survive page breaks.

use super::blocks::{Block, ListItem, Run, RunStyle};
use crate::error::Result;
use oxidize_pdf::text::TextEncoding;
use oxidize_pdf::{measure_text, Color, Document, Font, Page};
use std::collections::BTreeSet;

/// Fixed look of every rendered document.
///
/// Values mirror the HTML stylesheet (`40px` margins, `#f4f4f4` code
/// backgrounds with `2px 5px` inline and `10px` block padding) at 0.75pt/px.
#[derive(Debug, Clone)]
pub struct Stylesheet {
    pub page_width: f64,
    pub page_height: f64,
    pub margin: f64,
    pub body_size: f64,
    pub line_height: f64,
    pub heading_sizes: [f64; 6],
    pub code_size: f64,
    pub code_background: Color,
    /// Vertical and horizontal padding of inline code
    pub inline_code_padding: (f64, f64),
    pub block_code_padding: f64,
    pub block_spacing: f64,
    pub indent: f64,
    pub rule_color: Color,
}

impl Default for Stylesheet {
    fn default() -> Self {
        Self {
            page_width: 595.0,
            page_height: 842.0,
            margin: 30.0,
            body_size: 11.0,
            line_height: 1.35,
            heading_sizes: [24.0, 18.0, 14.0, 12.0, 11.0, 10.0],
            code_size: 9.5,
            code_background: Color::rgb(244.0 / 255.0, 244.0 / 255.0, 244.0 / 255.0),
            inline_code_padding: (1.5, 3.75),
            block_code_padding: 7.5,
            block_spacing: 8.0,
            indent: 18.0,
            rule_color: Color::gray(0.75),
        }
    }
}

impl Stylesheet {
    fn content_width(&self) -> f64 {
        self.page_width - 2.0 * self.margin
    }

    fn top(&self) -> f64 {
        self.page_height - self.margin
    }
}

/// Pick the standard font for a run.
/// Characters the standard fonts cannot draw. Text goes out WinAnsi-encoded,
/// so each of these prints as `?`.
pub fn unsupported_chars(text: &str) -> BTreeSet<char> {
    let mut buf = [0u8; 4];
    text.chars()
        .filter(|&c| c != '?' && !c.is_control())
        .filter(|c| TextEncoding::WinAnsiEncoding.encode(c.encode_utf8(&mut buf)) == b"?")
        .collect()
}

pub fn font_for(style: RunStyle) -> Font {
    match (style.code, style.bold, style.italic) {
        (true, true, _) => Font::CourierBold,
        (true, false, _) => Font::Courier,
        (false, true, true) => Font::HelveticaBoldOblique,
        (false, true, false) => Font::HelveticaBold,
        (false, false, true) => Font::HelveticaOblique,
        (false, false, false) => Font::Helvetica,
    }
}

/// A measured piece of a line.
#[derive(Debug, Clone)]
struct Fragment {
    text: String,
    style: RunStyle,
    width: f64,
}

#[derive(Debug, Clone, Default)]
struct Line {
    fragments: Vec<Fragment>,
    width: f64,
}

impl Line {
    fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    fn push(&mut self, text: &str, style: RunStyle, width: f64) {
        self.width += width;
        match self.fragments.last_mut() {
            Some(last) if last.style == style => {
                last.text.push_str(text);
                last.width += width;
            }
            _ => self.fragments.push(Fragment {
                text: text.to_string(),
                style,
                width,
            }),
        }
    }

    /// Append a single space unless the line is empty or already ends in one.
    fn push_space(&mut self, style: RunStyle, size: f64) {
        let ends_in_space = self
            .fragments
            .last()
            .is_some_and(|f| f.text.ends_with(' '));
        if !self.is_empty() && !ends_in_space {
            self.push(" ", style, measure_text(" ", font_for(style), size));
        }
    }

    fn trim_end(&mut self, size: f64) {
        if let Some(last) = self.fragments.last_mut() {
            if last.text.ends_with(' ') {
                let trimmed = last.text.trim_end_matches(' ').len();
                let removed = last.text.len() - trimmed;
                let space = measure_text(" ", font_for(last.style), size) * removed as f64;
                last.text.truncate(trimmed);
                last.width -= space;
                self.width -= space;
                if last.text.is_empty() {
                    self.fragments.pop();
                }
            }
        }
    }
}

/// Greedy line breaking of styled runs into lines no wider than `max_width`.
///
/// Whitespace collapses to single spaces, `\n` forces a break and words wider
/// than a full line are split across lines.
fn break_lines(runs: &[Run], size: f64, max_width: f64) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut current = Line::default();

    for run in runs {
        let font = font_for(run.style);
        for (i, segment) in run.text.split('\n').enumerate() {
            if i > 0 {
                current.trim_end(size);
                lines.push(std::mem::take(&mut current));
            }

            let mut words = segment.split_whitespace().peekable();
            let leading_space = segment.starts_with(char::is_whitespace);
            let trailing_space = segment.ends_with(char::is_whitespace);
            let mut first = true;

            if words.peek().is_none() && leading_space {
                current.push_space(run.style, size);
            }

            while let Some(word) = words.next() {
                if !first || leading_space {
                    current.push_space(run.style, size);
                }
                first = false;

                let width = measure_text(word, font.clone(), size);
                if current.width + width > max_width && !current.is_empty() {
                    current.trim_end(size);
                    lines.push(std::mem::take(&mut current));
                }

                if width > max_width {
                    push_split_word(&mut lines, &mut current, word, run.style, size, max_width);
                } else {
                    current.push(word, run.style, width);
                }

                if words.peek().is_none() && trailing_space {
                    current.push_space(run.style, size);
                }
            }
        }
    }

    current.trim_end(size);
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn push_split_word(
    lines: &mut Vec<Line>,
    current: &mut Line,
    word: &str,
    style: RunStyle,
    size: f64,
    max_width: f64,
) {
    let font = font_for(style);
    let mut chunk = String::new();
    let mut chunk_width = 0.0;

    for ch in word.chars() {
        let mut buf = [0u8; 4];
        let ch_width = measure_text(ch.encode_utf8(&mut buf), font.clone(), size);
        if current.width + chunk_width + ch_width > max_width && !(chunk.is_empty() && current.is_empty()) {
            if !chunk.is_empty() {
                current.push(&chunk, style, chunk_width);
            }
            lines.push(std::mem::take(current));
            chunk.clear();
            chunk_width = 0.0;
        }
        chunk.push(ch);
        chunk_width += ch_width;
    }

    if !chunk.is_empty() {
        current.push(&chunk, style, chunk_width);
    }
}

/// Lays blocks out page by page and serializes the result.
pub struct PageWriter<'s> {
    style: &'s Stylesheet,
    document: Document,
    page: Page,
    pages: usize,
    y: f64,
    quote_bars: Vec<f64>,
    pending_marker: Option<(String, f64)>,
}

impl<'s> PageWriter<'s> {
    pub fn new(style: &'s Stylesheet) -> Self {
        Self {
            style,
            document: Document::new(),
            page: Page::new(style.page_width, style.page_height),
            pages: 1,
            y: style.top(),
            quote_bars: Vec::new(),
            pending_marker: None,
        }
    }

    /// Render `blocks` and return the PDF bytes.
    pub fn render(mut self, blocks: &[Block], title: Option<&str>) -> Result<Vec<u8>> {
        if let Some(title) = title {
            self.document.set_title(title);
        }
        self.document.set_creator("docforge");

        for block in blocks {
            self.block(block, 0.0)?;
        }

        let page = std::mem::replace(
            &mut self.page,
            Page::new(self.style.page_width, self.style.page_height),
        );
        self.document.add_page(page);
        tracing::debug!("Laid out {} blocks on {} pages", blocks.len(), self.pages);

        let mut pdf_bytes = Vec::new();
        self.document.write(&mut pdf_bytes)?;
        Ok(pdf_bytes)
    }

    fn at_page_top(&self) -> bool {
        self.y >= self.style.top() - f64::EPSILON
    }

    fn new_page(&mut self) {
        let finished = std::mem::replace(
            &mut self.page,
            Page::new(self.style.page_width, self.style.page_height),
        );
        self.document.add_page(finished);
        self.pages += 1;
        self.y = self.style.top();
    }

    fn ensure_space(&mut self, height: f64) {
        if self.y - height < self.style.margin && !self.at_page_top() {
            self.new_page();
        }
    }

    /// Move the cursor down, painting any open quote bars alongside.
    fn advance(&mut self, height: f64) {
        let bottom = (self.y - height).max(self.style.margin);
        if bottom < self.y {
            for &x in &self.quote_bars {
                self.page
                    .graphics()
                    .set_fill_color(self.style.rule_color)
                    .rect(x, bottom, 2.0, self.y - bottom)
                    .fill();
            }
        }
        self.y -= height;
    }

    fn spacing(&mut self, height: f64) {
        if !self.at_page_top() {
            self.advance(height);
        }
    }

    fn block(&mut self, block: &Block, indent: f64) -> Result<()> {
        match block {
            Block::Heading { level, runs } => {
                let size = self.style.heading_sizes[(*level as usize).clamp(1, 6) - 1];
                let runs: Vec<Run> = runs
                    .iter()
                    .map(|r| Run {
                        text: r.text.clone(),
                        style: RunStyle { bold: true, ..r.style },
                    })
                    .collect();
                self.spacing(size * 0.5);
                self.paragraph(&runs, size, indent)?;
                self.spacing(size * 0.3);
            }
            Block::Paragraph(runs) => {
                self.paragraph(runs, self.style.body_size, indent)?;
                self.spacing(self.style.block_spacing);
            }
            Block::CodeBlock { code, .. } => {
                self.code_block(code, indent)?;
                self.spacing(self.style.block_spacing);
            }
            Block::Quote(children) => {
                self.quote_bars.push(self.style.margin + indent);
                let inner = indent + self.style.indent;
                for child in children {
                    self.block(child, inner)?;
                }
                self.quote_bars.pop();
            }
            Block::List {
                ordered,
                start,
                items,
            } => {
                for (i, item) in items.iter().enumerate() {
                    let marker = if *ordered {
                        format!("{}.", start + i)
                    } else {
                        "\u{2022}".to_string()
                    };
                    self.list_item(item, marker, indent)?;
                }
                self.spacing(self.style.block_spacing / 2.0);
            }
            Block::Table { header, rows } => {
                self.table(header, rows, indent)?;
                self.spacing(self.style.block_spacing);
            }
            Block::Rule => {
                self.ensure_space(self.style.block_spacing * 2.0);
                self.advance(self.style.block_spacing);
                let x = self.style.margin + indent;
                let width = self.style.content_width() - indent;
                let y = self.y;
                self.page
                    .graphics()
                    .set_stroke_color(self.style.rule_color)
                    .set_line_width(0.75)
                    .move_to(x, y)
                    .line_to(x + width, y)
                    .stroke();
                self.advance(self.style.block_spacing);
            }
        }
        Ok(())
    }

    fn list_item(&mut self, item: &ListItem, marker: String, indent: f64) -> Result<()> {
        let inner = indent + self.style.indent;
        self.pending_marker = Some((marker, self.style.margin + indent));

        let mut blocks = item.blocks.iter();
        match (item.task, blocks.next()) {
            (Some(checked), Some(Block::Paragraph(runs))) => {
                let mut runs = runs.clone();
                runs.insert(0, Run::plain(if checked { "[x] " } else { "[ ] " }));
                self.paragraph(&runs, self.style.body_size, inner)?;
            }
            (_, Some(Block::Paragraph(runs))) => {
                self.paragraph(runs, self.style.body_size, inner)?;
            }
            (_, Some(first)) => self.block(first, inner)?,
            (_, None) => {
                self.paragraph(&[Run::plain(" ")], self.style.body_size, inner)?;
            }
        }
        for block in blocks {
            self.block(block, inner)?;
        }
        self.pending_marker = None;
        Ok(())
    }

    fn paragraph(&mut self, runs: &[Run], size: f64, indent: f64) -> Result<()> {
        let width = self.style.content_width() - indent;
        let mut lines = break_lines(runs, size, width);
        if lines.is_empty() && self.pending_marker.is_some() {
            lines.push(Line::default());
        }
        let x = self.style.margin + indent;
        for line in &lines {
            self.line(line, x, size)?;
        }
        Ok(())
    }

    fn baseline(&self, line_height: f64, size: f64) -> f64 {
        self.y - (line_height + size * 0.6) / 2.0
    }

    fn line(&mut self, line: &Line, x: f64, size: f64) -> Result<()> {
        let line_height = size * self.style.line_height;
        self.ensure_space(line_height);
        let baseline = self.baseline(line_height, size);
        self.marker(baseline)?;

        let (pad_v, pad_h) = self.style.inline_code_padding;
        let mut cursor = x;
        for fragment in &line.fragments {
            if fragment.style.code {
                self.page
                    .graphics()
                    .set_fill_color(self.style.code_background)
                    .rect(
                        cursor - pad_h,
                        baseline - size * 0.25 - pad_v,
                        fragment.width + 2.0 * pad_h,
                        size + 2.0 * pad_v,
                    )
                    .fill();
            }
            if fragment.style.strike {
                self.page
                    .graphics()
                    .set_stroke_color(Color::black())
                    .set_line_width(size / 18.0)
                    .move_to(cursor, baseline + size * 0.3)
                    .line_to(cursor + fragment.width, baseline + size * 0.3)
                    .stroke();
            }
            self.page
                .text()
                .set_font(font_for(fragment.style), size)
                .at(cursor, baseline)
                .write(&fragment.text)?;
            cursor += fragment.width;
        }

        self.advance(line_height);
        Ok(())
    }

    fn marker(&mut self, baseline: f64) -> Result<()> {
        if let Some((marker, x)) = self.pending_marker.take() {
            self.page
                .text()
                .set_font(Font::Helvetica, self.style.body_size)
                .at(x + 4.0, baseline)
                .write(&marker)?;
        }
        Ok(())
    }

    fn code_block(&mut self, code: &str, indent: f64) -> Result<()> {
        let size = self.style.code_size;
        let pad = self.style.block_code_padding;
        let line_height = size * self.style.line_height;
        let x = self.style.margin + indent;
        let width = self.style.content_width() - indent;
        let char_width = measure_text("M", Font::Courier, size);
        let max_chars = (((width - 2.0 * pad) / char_width).floor() as usize).max(1);

        let mut lines: Vec<String> = Vec::new();
        for raw in code.replace('\t', "    ").split('\n') {
            let chars: Vec<char> = raw.chars().collect();
            if chars.is_empty() {
                lines.push(String::new());
            }
            for chunk in chars.chunks(max_chars) {
                lines.push(chunk.iter().collect());
            }
        }

        self.ensure_space(pad + line_height);
        self.fill_band(x, width, pad);
        let last = lines.len().saturating_sub(1);
        for (i, text) in lines.iter().enumerate() {
            let needed = if i == last { line_height + pad } else { line_height };
            if self.y - needed < self.style.margin && !self.at_page_top() {
                self.new_page();
            }
            self.fill_band(x, width, line_height);
            let baseline = self.baseline(line_height, size);
            self.marker(baseline)?;
            if !text.is_empty() {
                self.page
                    .text()
                    .set_font(Font::Courier, size)
                    .at(x + pad, baseline)
                    .write(text)?;
            }
            self.advance(line_height);
        }
        self.fill_band(x, width, pad);
        self.advance(pad);
        Ok(())
    }

    /// Paint a code background band of `height` below the cursor.
    fn fill_band(&mut self, x: f64, width: f64, height: f64) {
        let bottom = (self.y - height).max(self.style.margin);
        self.page
            .graphics()
            .set_fill_color(self.style.code_background)
            .rect(x, bottom, width, self.y - bottom)
            .fill();
    }

    fn table(&mut self, header: &[Vec<Run>], rows: &[Vec<Vec<Run>>], indent: f64) -> Result<()> {
        let columns = rows
            .iter()
            .map(|r| r.len())
            .chain(std::iter::once(header.len()))
            .max()
            .unwrap_or(0);
        if columns == 0 {
            return Ok(());
        }

        let size = self.style.body_size;
        let pad = 4.0;
        let x = self.style.margin + indent;
        let column_width = (self.style.content_width() - indent) / columns as f64;
        let line_height = size * self.style.line_height;

        let header_row: Vec<Vec<Run>> = header
            .iter()
            .map(|cell| {
                cell.iter()
                    .map(|r| Run {
                        text: r.text.clone(),
                        style: RunStyle { bold: true, ..r.style },
                    })
                    .collect()
            })
            .collect();

        let all_rows = (!header_row.is_empty())
            .then_some(&header_row)
            .into_iter()
            .chain(rows.iter());

        for (row_index, row) in all_rows.enumerate() {
            let cells: Vec<Vec<Line>> = (0..columns)
                .map(|c| {
                    row.get(c)
                        .map(|runs| break_lines(runs, size, column_width - 2.0 * pad))
                        .unwrap_or_default()
                })
                .collect();
            let row_lines = cells.iter().map(|c| c.len()).max().unwrap_or(0).max(1);
            let row_height = row_lines as f64 * line_height + 2.0 * pad;

            self.ensure_space(row_height);
            let top = self.y;
            if row_index == 0 && !header_row.is_empty() {
                self.page
                    .graphics()
                    .set_fill_color(self.style.code_background)
                    .rect(x, top - row_height, column_width * columns as f64, row_height)
                    .fill();
            }

            for (c, lines) in cells.iter().enumerate() {
                let cell_x = x + c as f64 * column_width;
                self.page
                    .graphics()
                    .set_stroke_color(self.style.rule_color)
                    .set_line_width(0.5)
                    .rect(cell_x, top - row_height, column_width, row_height)
                    .stroke();

                for (l, line) in lines.iter().enumerate() {
                    let line_top = top - pad - l as f64 * line_height;
                    let baseline = line_top - (line_height + size * 0.6) / 2.0;
                    let mut cursor = cell_x + pad;
                    for fragment in &line.fragments {
                        self.page
                            .text()
                            .set_font(font_for(fragment.style), size)
                            .at(cursor, baseline)
                            .write(&fragment.text)?;
                        cursor += fragment.width;
                    }
                }
            }
            self.advance(row_height);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::blocks::parse_blocks;

    fn text_of(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.fragments.iter().map(|f| f.text.as_str()).collect())
            .collect()
    }

    #[test]
    fn test_font_selection() {
        assert_eq!(font_for(RunStyle::default()), Font::Helvetica);
        assert_eq!(
            font_for(RunStyle { bold: true, italic: true, ..Default::default() }),
            Font::HelveticaBoldOblique
        );
        assert_eq!(
            font_for(RunStyle { code: true, italic: true, ..Default::default() }),
            Font::Courier
        );
    }

    #[test]
    fn test_short_text_stays_on_one_line() {
        let lines = break_lines(&[Run::plain("hello   world")], 11.0, 500.0);
        assert_eq!(text_of(&lines), vec!["hello world"]);
    }

    #[test]
    fn test_wrapping_respects_width() {
        let text = "lorem ipsum dolor sit amet ".repeat(20);
        let lines = break_lines(&[Run::plain(text)], 11.0, 200.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.width <= 200.0 + 1e-6, "line too wide: {}", line.width);
            let text: String = line.fragments.iter().map(|f| f.text.as_str()).collect();
            assert!(!text.ends_with(' '));
        }
    }

    #[test]
    fn test_hard_break_and_long_word() {
        let lines = break_lines(&[Run::plain("a\nb")], 11.0, 500.0);
        assert_eq!(text_of(&lines), vec!["a", "b"]);

        let long = "x".repeat(400);
        let lines = break_lines(&[Run::plain(long.clone())], 11.0, 100.0);
        assert!(lines.len() > 1);
        assert_eq!(text_of(&lines).concat(), long);
    }

    #[test]
    fn test_styles_keep_separate_fragments() {
        let runs = vec![
            Run::plain("see "),
            Run {
                text: "code".to_string(),
                style: RunStyle { code: true, ..Default::default() },
            },
            Run::plain(" here"),
        ];
        let lines = break_lines(&runs, 11.0, 500.0);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].fragments.len(), 3);
        assert_eq!(text_of(&lines), vec!["see code here"]);
    }

    #[test]
    fn test_render_produces_pdf() {
        let style = Stylesheet::default();
        let blocks = parse_blocks("# Title\n\nBody\n\n```\ncode\n```\n\n> quote\n\n- a\n- b\n\n| x | y |\n|---|---|\n| 1 | 2 |\n\n---\n").unwrap();
        let bytes = PageWriter::new(&style).render(&blocks, Some("Title")).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn test_long_documents_break_pages() {
        let style = Stylesheet::default();
        let source = (0..200).map(|i| format!("Paragraph {i}\n\n")).collect::<String>();
        let blocks = parse_blocks(&source).unwrap();
        let mut writer = PageWriter::new(&style);
        for block in &blocks {
            writer.block(block, 0.0).unwrap();
        }
        assert!(writer.pages > 1);
    }

    #[test]
    fn test_empty_document_renders_one_page() {
        let style = Stylesheet::default();
        let bytes = PageWriter::new(&style).render(&[], None).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }
}
