//! Lowering of the markdown syntax tree into a small block model the page
//! layout understands.

use crate::error::{ConversionError, Result};
use comrak::arena_tree::NodeEdge;
use comrak::nodes::{AstNode, ListType, NodeValue};
use comrak::{parse_document, Arena, Options};

/// Deepest block quote / list nesting accepted in a document.
pub const MAX_NESTING: usize = 64;

/// Deepest syntax tree accepted after parsing. Lists take two nodes per level
/// and inline emphasis nests inside blocks.
const MAX_TREE_DEPTH: usize = 4 * MAX_NESTING;

/// Inline emphasis carried by a text run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStyle {
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
    pub strike: bool,
}

/// A piece of inline text with uniform styling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub style: RunStyle,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: RunStyle::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    /// `Some(checked)` for task list items
    pub task: Option<bool>,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, runs: Vec<Run> },
    Paragraph(Vec<Run>),
    CodeBlock { info: String, code: String },
    Quote(Vec<Block>),
    List {
        ordered: bool,
        start: usize,
        items: Vec<ListItem>,
    },
    Table {
        header: Vec<Vec<Run>>,
        rows: Vec<Vec<Vec<Run>>>,
    },
    Rule,
}

/// Enable the extension set used for every document: tables, fenced code,
/// strikethrough, footnotes, autolinks, task lists and definition lists.
pub fn enable_extensions(options: &mut Options) {
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.footnotes = true;
    options.extension.description_lists = true;
}

/// Parse markdown source into blocks.
///
/// Parsing and lowering both recurse per nesting level, so documents nested
/// deeper than [`MAX_NESTING`] are rejected before the parser sees them.
pub fn parse_blocks(source: &str) -> Result<Vec<Block>> {
    let depth = nesting_depth(source);
    if depth > MAX_NESTING {
        return Err(ConversionError::TooDeeplyNested {
            depth,
            limit: MAX_NESTING,
        });
    }

    let arena = Arena::new();
    let mut options = Options::default();
    enable_extensions(&mut options);
    let root = parse_document(&arena, source, &options);

    let depth = tree_depth(root);
    if depth > MAX_TREE_DEPTH {
        return Err(ConversionError::TooDeeplyNested {
            depth,
            limit: MAX_TREE_DEPTH,
        });
    }

    Ok(lower_children(root))
}

/// Estimate the container nesting of `source` from line prefixes: every
/// `>` and list marker opens a level, and every four columns of indentation
/// count as one more. Lines inside fenced code are not containers.
pub fn nesting_depth(source: &str) -> usize {
    let mut deepest = 0;
    let mut fence: Option<char> = None;

    for line in source.lines() {
        let (depth, rest) = line_prefix(line);
        let fence_char = fence_opener(rest);

        match (fence, fence_char) {
            (None, Some(c)) => fence = Some(c),
            (Some(open), Some(c)) if open == c => {
                fence = None;
                continue;
            }
            (Some(_), _) => continue,
            (None, None) => {}
        }

        deepest = deepest.max(depth);
    }

    deepest
}

fn line_prefix(line: &str) -> (usize, &str) {
    let mut markers = 0;
    let mut columns = 0;
    let mut rest = line;

    loop {
        let trimmed = rest.trim_start_matches([' ', '\t']);
        columns += rest[..rest.len() - trimmed.len()]
            .chars()
            .map(|c| if c == '\t' { 4 } else { 1 })
            .sum::<usize>();
        rest = trimmed;

        if let Some(after) = rest.strip_prefix('>') {
            markers += 1;
            rest = after;
        } else if let Some(after) = strip_list_marker(rest) {
            markers += 1;
            rest = after;
        } else {
            break;
        }
    }

    (markers + columns / 4, rest)
}

/// `-`, `*`, `+` or up to nine digits with `.`/`)`, followed by a blank or
/// the end of the line.
fn strip_list_marker(text: &str) -> Option<&str> {
    let digits = text.bytes().take_while(u8::is_ascii_digit).count();
    let marker_len = match text.as_bytes().get(digits) {
        Some(b'-' | b'*' | b'+') if digits == 0 => 1,
        Some(b'.' | b')') if (1..=9).contains(&digits) => digits + 1,
        _ => return None,
    };

    let after = &text[marker_len..];
    (after.is_empty() || after.starts_with([' ', '\t'])).then_some(after)
}

fn fence_opener(text: &str) -> Option<char> {
    ['`', '~']
        .into_iter()
        .find(|&c| text.chars().take_while(|&t| t == c).count() >= 3)
}

fn tree_depth<'a>(root: &'a AstNode<'a>) -> usize {
    let mut depth = 0usize;
    let mut deepest = 0;
    for edge in root.traverse() {
        match edge {
            NodeEdge::Start(_) => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            NodeEdge::End(_) => depth = depth.saturating_sub(1),
        }
    }
    deepest
}

/// Text of the first heading, if the document has one.
pub fn first_heading(blocks: &[Block]) -> Option<String> {
    blocks.iter().find_map(|block| match block {
        Block::Heading { runs, .. } => {
            let title: String = runs.iter().map(|r| r.text.as_str()).collect();
            let title = title.trim().to_string();
            (!title.is_empty()).then_some(title)
        }
        _ => None,
    })
}

fn lower_children<'a>(node: &'a AstNode<'a>) -> Vec<Block> {
    let mut blocks = Vec::new();
    for child in node.children() {
        lower_block(child, &mut blocks);
    }
    blocks
}

fn lower_block<'a>(node: &'a AstNode<'a>, out: &mut Vec<Block>) {
    let value = node.data.borrow().value.clone();
    match value {
        NodeValue::Heading(heading) => out.push(Block::Heading {
            level: heading.level.clamp(1, 6),
            runs: inline_runs(node),
        }),
        NodeValue::Paragraph => {
            let runs = inline_runs(node);
            if !runs.is_empty() {
                out.push(Block::Paragraph(runs));
            }
        }
        NodeValue::CodeBlock(code_block) => out.push(Block::CodeBlock {
            info: code_block.info.trim().to_string(),
            code: code_block.literal.trim_end_matches('\n').to_string(),
        }),
        NodeValue::BlockQuote => out.push(Block::Quote(lower_children(node))),
        NodeValue::List(list) => {
            let items = node
                .children()
                .map(|item| {
                    let task = match &item.data.borrow().value {
                        NodeValue::TaskItem(symbol) => Some(symbol.is_some()),
                        _ => None,
                    };
                    ListItem {
                        task,
                        blocks: lower_children(item),
                    }
                })
                .collect();
            out.push(Block::List {
                ordered: list.list_type == ListType::Ordered,
                start: list.start,
                items,
            });
        }
        NodeValue::Table(..) => out.push(lower_table(node)),
        NodeValue::ThematicBreak => out.push(Block::Rule),
        NodeValue::DescriptionTerm => {
            let runs: Vec<Run> = lower_children(node)
                .into_iter()
                .flat_map(|block| match block {
                    Block::Paragraph(runs) => runs,
                    _ => Vec::new(),
                })
                .map(|mut run| {
                    run.style.bold = true;
                    run
                })
                .collect();
            if !runs.is_empty() {
                out.push(Block::Paragraph(runs));
            }
        }
        NodeValue::DescriptionDetails => out.push(Block::Quote(lower_children(node))),
        NodeValue::FootnoteDefinition(definition) => {
            let mut blocks = lower_children(node);
            let label = Run::plain(format!("[{}] ", definition.name));
            match blocks.first_mut() {
                Some(Block::Paragraph(runs)) => runs.insert(0, label),
                _ => blocks.insert(0, Block::Paragraph(vec![label])),
            }
            out.extend(blocks);
        }
        NodeValue::HtmlBlock(_) | NodeValue::FrontMatter(_) => {
            tracing::debug!("Skipping raw HTML/front matter block");
        }
        // Containers we don't style (documents, description lists, items)
        _ => out.extend(lower_children(node)),
    }
}

fn lower_table<'a>(node: &'a AstNode<'a>) -> Block {
    let mut header = Vec::new();
    let mut rows = Vec::new();

    for row in node.children() {
        let is_header = matches!(row.data.borrow().value, NodeValue::TableRow(true));
        let cells: Vec<Vec<Run>> = row.children().map(inline_runs).collect();
        if is_header && header.is_empty() {
            header = cells;
        } else {
            rows.push(cells);
        }
    }

    Block::Table { header, rows }
}

/// Flatten the inline children of `node` into styled runs.
fn inline_runs<'a>(node: &'a AstNode<'a>) -> Vec<Run> {
    let mut runs = Vec::new();
    for child in node.children() {
        collect_inline(child, RunStyle::default(), &mut runs);
    }
    merge_adjacent(runs)
}

fn collect_inline<'a>(node: &'a AstNode<'a>, style: RunStyle, runs: &mut Vec<Run>) {
    let value = node.data.borrow().value.clone();
    let mut child_style = style;
    match value {
        NodeValue::Text(text) => {
            runs.push(Run { text, style });
            return;
        }
        NodeValue::Code(code) => {
            runs.push(Run {
                text: code.literal,
                style: RunStyle { code: true, ..style },
            });
            return;
        }
        NodeValue::SoftBreak => {
            runs.push(Run { text: " ".to_string(), style });
            return;
        }
        NodeValue::LineBreak => {
            runs.push(Run { text: "\n".to_string(), style });
            return;
        }
        NodeValue::FootnoteReference(reference) => {
            runs.push(Run {
                text: format!("[{}]", reference.name),
                style,
            });
            return;
        }
        NodeValue::HtmlInline(_) => return,
        NodeValue::Image(..) => {
            let alt: String = node
                .descendants()
                .filter_map(|d| match &d.data.borrow().value {
                    NodeValue::Text(t) => Some(t.clone()),
                    _ => None,
                })
                .collect();
            runs.push(Run {
                text: format!("[image: {alt}]"),
                style: RunStyle { italic: true, ..style },
            });
            return;
        }
        NodeValue::Strong => child_style.bold = true,
        NodeValue::Emph => child_style.italic = true,
        NodeValue::Strikethrough => child_style.strike = true,
        _ => {}
    }

    for child in node.children() {
        collect_inline(child, child_style, runs);
    }
}

fn merge_adjacent(runs: Vec<Run>) -> Vec<Run> {
    let mut merged: Vec<Run> = Vec::with_capacity(runs.len());
    for run in runs {
        match merged.last_mut() {
            Some(last) if last.style == run.style => last.text.push_str(&run.text),
            _ => merged.push(run),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_heading_and_paragraph() {
        let blocks = parse_blocks("# Title\n\nBody text").unwrap();
        assert_eq!(
            blocks,
            vec![
                Block::Heading {
                    level: 1,
                    runs: vec![Run::plain("Title")],
                },
                Block::Paragraph(vec![Run::plain("Body text")]),
            ]
        );
    }

    #[test]
    fn test_inline_styles() {
        let blocks = parse_blocks("plain **bold** *it* `code` ~~gone~~").unwrap();
        let Block::Paragraph(runs) = &blocks[0] else {
            panic!("Expected paragraph, got {:?}", blocks[0]);
        };
        assert!(runs.iter().any(|r| r.text == "bold" && r.style.bold));
        assert!(runs.iter().any(|r| r.text == "it" && r.style.italic));
        assert!(runs.iter().any(|r| r.text == "code" && r.style.code));
        assert!(runs.iter().any(|r| r.text == "gone" && r.style.strike));
    }

    #[test]
    fn test_fenced_code_block() {
        let blocks = parse_blocks("```rust\nfn main() {}\n```\n").unwrap();
        assert_eq!(
            blocks,
            vec![Block::CodeBlock {
                info: "rust".to_string(),
                code: "fn main() {}".to_string(),
            }]
        );
    }

    #[test]
    fn test_table() {
        let blocks = parse_blocks("| a | b |\n|---|---|\n| 1 | 2 |\n| 3 | 4 |\n").unwrap();
        let Block::Table { header, rows } = &blocks[0] else {
            panic!("Expected table, got {:?}", blocks[0]);
        };
        assert_eq!(header.len(), 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][1], vec![Run::plain("4")]);
    }

    #[test]
    fn test_nested_lists_and_tasks() {
        let blocks = parse_blocks("3. three\n4. four\n   - nested\n\n- [x] done\n- [ ] todo\n").unwrap();
        let Block::List { ordered, start, items } = &blocks[0] else {
            panic!("Expected list, got {:?}", blocks[0]);
        };
        assert!(*ordered);
        assert_eq!(*start, 3);
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1].blocks.last(), Some(Block::List { ordered: false, .. })));

        let Block::List { items, .. } = &blocks[1] else {
            panic!("Expected task list, got {:?}", blocks[1]);
        };
        assert_eq!(items[0].task, Some(true));
        assert_eq!(items[1].task, Some(false));
    }

    #[test]
    fn test_quote_and_rule() {
        let blocks = parse_blocks("> quoted\n\n---\n").unwrap();
        assert_eq!(
            blocks,
            vec![
                Block::Quote(vec![Block::Paragraph(vec![Run::plain("quoted")])]),
                Block::Rule,
            ]
        );
    }

    #[test]
    fn test_first_heading() {
        let blocks = parse_blocks("intro\n\n## Second *level*\n\n# Top").unwrap();
        assert_eq!(first_heading(&blocks), Some("Second level".to_string()));
        assert_eq!(first_heading(&parse_blocks("no headings").unwrap()), None);
    }

    #[test]
    fn test_empty_source() {
        assert!(parse_blocks("").unwrap().is_empty());
    }

    #[test]
    fn test_nesting_depth_from_prefixes() {
        assert_eq!(nesting_depth("plain text"), 0);
        assert_eq!(nesting_depth("> > quoted"), 2);
        assert_eq!(nesting_depth(">>> x\n> y"), 3);
        assert_eq!(nesting_depth("1. a\n2) b\n- > c"), 2);
        assert_eq!(nesting_depth("- a\n    - b\n        - c"), 3);
        assert_eq!(nesting_depth("---\n*emphasis*\n3.14 is pi"), 0);
    }

    #[test]
    fn test_fenced_code_is_not_nesting() {
        let source = format!("```\n{}\n```\n\nafter", ">".repeat(500));
        assert_eq!(nesting_depth(&source), 0);
        assert!(parse_blocks(&source).is_ok());
    }

    #[test]
    fn test_nesting_at_limit_is_accepted() {
        let source = format!("{} x", ">".repeat(MAX_NESTING));
        let mut block = &parse_blocks(&source).unwrap()[0];
        let mut depth = 1;
        while let Block::Quote(children) = block {
            match children.first() {
                Some(child @ Block::Quote(_)) => {
                    block = child;
                    depth += 1;
                }
                _ => break,
            }
        }
        assert_eq!(depth, MAX_NESTING);
    }

    #[test]
    fn test_deep_quotes_are_rejected_before_parsing() {
        let source = format!("{} x", ">".repeat(20_000));
        match parse_blocks(&source) {
            Err(ConversionError::TooDeeplyNested { depth, limit }) => {
                assert_eq!(depth, 20_000);
                assert_eq!(limit, MAX_NESTING);
            }
            other => panic!("Expected TooDeeplyNested, got {other:?}"),
        }
    }

    #[test]
    fn test_deep_indented_lists_are_rejected() {
        let source: String = (0..1000)
            .map(|level| format!("{}- a\n", "  ".repeat(level)))
            .collect();
        assert!(matches!(
            parse_blocks(&source),
            Err(ConversionError::TooDeeplyNested { .. })
        ));
    }

    #[test]
    fn test_deep_inline_emphasis_is_rejected() {
        let source = format!("{}x{}", "*".repeat(1000), "*".repeat(1000));
        assert_eq!(nesting_depth(&source), 0);
        assert!(matches!(
            parse_blocks(&source),
            Err(ConversionError::TooDeeplyNested { .. })
        ));
    }
}
