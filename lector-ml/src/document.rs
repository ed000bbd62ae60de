use serde::{Deserialize, Serialize};

/// Axis-aligned box relative to the page, `((xmin, ymin), (xmax, ymax))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry(pub (f32, f32), pub (f32, f32));

impl Geometry {
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self((xmin, ymin), (xmax, ymax))
    }

    pub fn xmin(&self) -> f32 {
        self.0.0
    }

    pub fn ymin(&self) -> f32 {
        self.0.1
    }

    pub fn xmax(&self) -> f32 {
        self.1.0
    }

    pub fn ymax(&self) -> f32 {
        self.1.1
    }

    pub fn height(&self) -> f32 {
        self.ymax() - self.ymin()
    }

    pub fn y_center(&self) -> f32 {
        (self.ymin() + self.ymax()) / 2.0
    }

    /// Smallest box enclosing every input, `None` when empty.
    pub fn union<'a>(geometries: impl IntoIterator<Item = &'a Geometry>) -> Option<Self> {
        geometries.into_iter().fold(None, |acc, g| {
            Some(match acc {
                None => *g,
                Some(acc) => Geometry::new(
                    acc.xmin().min(g.xmin()),
                    acc.ymin().min(g.ymin()),
                    acc.xmax().max(g.xmax()),
                    acc.ymax().max(g.ymax()),
                ),
            })
        })
    }
}

/// An optional classification result, serialized with explicit nulls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction<T> {
    pub value: Option<T>,
    pub confidence: Option<f32>,
}

impl<T> Default for Prediction<T> {
    fn default() -> Self {
        Self {
            value: None,
            confidence: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub value: String,
    pub confidence: f32,
    pub geometry: Geometry,
    pub objectness_score: f32,
    pub crop_orientation: Prediction<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub geometry: Geometry,
    pub objectness_score: f32,
    pub words: Vec<Word>,
}

/// Non-text element of a block. Never produced, kept for schema parity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artefact {
    pub r#type: String,
    pub confidence: f32,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub geometry: Geometry,
    pub objectness_score: f32,
    pub lines: Vec<Line>,
    pub artefacts: Vec<Artefact>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub page_idx: usize,
    /// (height, width) in pixels
    pub dimensions: (u32, u32),
    pub orientation: Prediction<f32>,
    pub language: Prediction<String>,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub pages: Vec<Page>,
}

impl Word {
    pub fn new(value: String, confidence: f32, geometry: Geometry, objectness_score: f32) -> Self {
        Self {
            value,
            confidence,
            geometry,
            objectness_score,
            crop_orientation: Prediction {
                value: Some(0),
                confidence: None,
            },
        }
    }
}

impl Line {
    pub fn new(words: Vec<Word>) -> Self {
        let geometry = Geometry::union(words.iter().map(|w| &w.geometry))
            .unwrap_or(Geometry::new(0.0, 0.0, 0.0, 0.0));
        let objectness_score = mean(words.iter().map(|w| w.objectness_score));
        Self {
            geometry,
            objectness_score,
            words,
        }
    }

    pub fn render(&self) -> String {
        self.words
            .iter()
            .map(|w| w.value.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Block {
    pub fn new(lines: Vec<Line>) -> Self {
        let geometry = Geometry::union(lines.iter().map(|l| &l.geometry))
            .unwrap_or(Geometry::new(0.0, 0.0, 0.0, 0.0));
        let objectness_score = mean(lines.iter().map(|l| l.objectness_score));
        Self {
            geometry,
            objectness_score,
            lines,
            artefacts: Vec::new(),
        }
    }

    pub fn render(&self) -> String {
        self.lines
            .iter()
            .map(Line::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Page {
    pub fn render(&self) -> String {
        self.blocks
            .iter()
            .map(Block::render)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl Document {
    /// Plain text of the whole document.
    pub fn render(&self) -> String {
        self.pages
            .iter()
            .map(Page::render)
            .collect::<Vec<_>>()
            .join("\n\n\n")
    }

    /// Nested JSON form: pages, blocks, lines, words.
    pub fn export(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    pub fn words(&self) -> impl Iterator<Item = &Word> {
        self.pages
            .iter()
            .flat_map(|p| &p.blocks)
            .flat_map(|b| &b.lines)
            .flat_map(|l| &l.words)
    }
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f32 }
}
