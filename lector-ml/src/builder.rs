use crate::document::{Block, Document, Line, Page, Prediction, Word};

/// Groups recognized words into lines and blocks.
#[derive(Debug, Clone, Copy)]
pub struct DocumentBuilder {
    pub resolve_blocks: bool,
    /// Relative vertical gap between two lines that starts a new block.
    pub paragraph_break: f32,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self {
            resolve_blocks: false,
            paragraph_break: 0.035,
        }
    }
}

impl DocumentBuilder {
    /// Builds one page per `(dimensions, words)` entry, in order.
    pub fn build(&self, pages: Vec<((u32, u32), Vec<Word>)>) -> Document {
        Document {
            pages: pages
                .into_iter()
                .enumerate()
                .map(|(page_idx, (dimensions, words))| self.build_page(page_idx, dimensions, words))
                .collect(),
        }
    }

    pub fn build_page(&self, page_idx: usize, dimensions: (u32, u32), words: Vec<Word>) -> Page {
        let lines = resolve_lines(words);
        let blocks = if lines.is_empty() {
            Vec::new()
        } else if self.resolve_blocks {
            self.resolve_blocks(lines)
        } else {
            vec![Block::new(lines)]
        };

        Page {
            page_idx,
            dimensions,
            orientation: Prediction::default(),
            language: Prediction::default(),
            blocks,
        }
    }

    fn resolve_blocks(&self, lines: Vec<Line>) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut current: Vec<Line> = Vec::new();

        for line in lines {
            if let Some(previous) = current.last()
                && line.geometry.ymin() - previous.geometry.ymax() > self.paragraph_break
            {
                blocks.push(Block::new(std::mem::take(&mut current)));
            }
            current.push(line);
        }
        if !current.is_empty() {
            blocks.push(Block::new(current));
        }

        blocks
    }
}

/// Words sorted by vertical centre join the current line while their centre
/// stays within half the median word height of the line's mean centre.
fn resolve_lines(mut words: Vec<Word>) -> Vec<Line> {
    if words.is_empty() {
        return Vec::new();
    }

    let tolerance = median(words.iter().map(|w| w.geometry.height())) / 2.0;
    words.sort_by(|a, b| a.geometry.y_center().total_cmp(&b.geometry.y_center()));

    let mut lines = Vec::new();
    let mut current: Vec<Word> = Vec::new();
    let mut center_sum = 0.0;

    for word in words {
        let center = word.geometry.y_center();
        if !current.is_empty() && (center - center_sum / current.len() as f32).abs() > tolerance {
            lines.push(finish_line(std::mem::take(&mut current)));
            center_sum = 0.0;
        }
        center_sum += center;
        current.push(word);
    }
    lines.push(finish_line(current));

    lines
}

fn finish_line(mut words: Vec<Word>) -> Line {
    words.sort_by(|a, b| a.geometry.xmin().total_cmp(&b.geometry.xmin()));
    Line::new(words)
}

fn median(values: impl Iterator<Item = f32>) -> f32 {
    let mut values: Vec<f32> = values.collect();
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Geometry;

    fn word(value: &str, xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Word {
        Word::new(
            value.to_string(),
            0.9,
            Geometry::new(xmin, ymin, xmax, ymax),
            0.8,
        )
    }

    fn page_text(page: &Page) -> Vec<Vec<String>> {
        page.blocks
            .iter()
            .flat_map(|b| &b.lines)
            .map(|l| l.words.iter().map(|w| w.value.clone()).collect())
            .collect()
    }

    #[test]
    fn words_on_a_row_form_one_line_left_to_right() {
        let words = vec![
            word("world", 0.4, 0.11, 0.6, 0.16),
            word("Hello", 0.1, 0.10, 0.3, 0.15),
            word("below", 0.1, 0.30, 0.3, 0.35),
        ];

        let page = DocumentBuilder::default().build_page(0, (100, 100), words);

        assert_eq!(page.blocks.len(), 1);
        assert_eq!(page_text(&page), [vec!["Hello", "world"], vec!["below"]]);
    }

    #[test]
    fn empty_page_has_no_blocks() {
        let document = DocumentBuilder::default().build(vec![((10, 20), vec![])]);
        assert_eq!(document.pages.len(), 1);
        assert!(document.pages[0].blocks.is_empty());
        assert_eq!(document.pages[0].dimensions, (10, 20));
    }

    #[test]
    fn blocks_split_on_large_gaps() {
        let words = vec![
            word("one", 0.1, 0.10, 0.3, 0.15),
            word("two", 0.1, 0.16, 0.3, 0.21),
            word("three", 0.1, 0.50, 0.3, 0.55),
        ];
        let builder = DocumentBuilder {
            resolve_blocks: true,
            ..Default::default()
        };

        let page = builder.build_page(0, (100, 100), words);

        assert_eq!(page.blocks.len(), 2);
        assert_eq!(page.blocks[0].lines.len(), 2);
        assert_eq!(page.blocks[1].lines[0].words[0].value, "three");
        assert_eq!(page.blocks[0].geometry, Geometry::new(0.1, 0.10, 0.3, 0.21));
    }

    #[test]
    fn single_block_without_resolution() {
        let words = vec![
            word("one", 0.1, 0.10, 0.3, 0.15),
            word("three", 0.1, 0.50, 0.3, 0.55),
        ];

        let page = DocumentBuilder::default().build_page(0, (100, 100), words);

        assert_eq!(page.blocks.len(), 1);
        assert_eq!(page.blocks[0].lines.len(), 2);
    }

    #[test]
    fn pages_keep_their_index() {
        let document = DocumentBuilder::default().build(vec![
            ((10, 10), vec![word("a", 0.1, 0.1, 0.2, 0.2)]),
            ((10, 10), vec![word("b", 0.1, 0.1, 0.2, 0.2)]),
        ]);
        let indices: Vec<_> = document.pages.iter().map(|p| p.page_idx).collect();
        assert_eq!(indices, [0, 1]);
    }

    #[test]
    fn median_of_even_count_averages() {
        assert_eq!(median([4.0, 1.0, 3.0, 2.0].into_iter()), 2.5);
        assert_eq!(median([5.0, 1.0, 3.0].into_iter()), 3.0);
        assert_eq!(median(std::iter::empty()), 0.0);
    }
}
