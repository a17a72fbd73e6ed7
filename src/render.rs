//! The fretboard scene graph and its SVG serialization.
//!
//! The tree is built once at startup. Interactive elements carry a
//! `FretTarget`; the page turns pointer events on them into
//! `InputEvent::Pointer` with the target's explicit string index.

use crate::geometry::Geometry;
use crate::notes::note_name;
use crate::types::{
    BOARD_COLOR, DOUBLE_MARK_POSITIONS, SINGLE_MARK_POSITIONS, TARGET_STROKE,
};
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FretTarget {
    pub string: usize,
    /// 0 = open string.
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Circle { cx: f64, cy: f64, r: f64 },
    Rect { x: f64, y: f64, width: f64, height: f64 },
    Text { x: f64, y: f64, content: String, font_size: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: Option<String>,
    pub class: String,
    pub shape: Shape,
    pub fill: String,
    pub stroke: Option<String>,
    pub target: Option<FretTarget>,
}

impl Element {
    fn new(class: &str, shape: Shape, fill: &str) -> Self {
        Self {
            id: None,
            class: class.to_string(),
            shape,
            fill: fill.to_string(),
            stroke: None,
            target: None,
        }
    }

    fn with_id(mut self, id: String) -> Self {
        self.id = Some(id);
        self
    }

    fn with_target(mut self, target: FretTarget) -> Self {
        self.stroke = Some(TARGET_STROKE.to_string());
        self.target = Some(target);
        self
    }
}

/// One string's nested canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct StringLayer {
    pub index: usize,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: String,
    pub base_note: u8,
    pub elements: Vec<Element>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderTree {
    pub width: f64,
    pub height: f64,
    pub background: String,
    pub markers: Vec<Element>,
    pub fret_lines: Vec<Element>,
    pub strings: Vec<StringLayer>,
}

impl RenderTree {
    /// Lay out the board for `tuning` (one entry per string, high string
    /// first). Colors cycle through `palette`.
    pub fn build(g: &Geometry, tuning: &[u8], palette: &[String]) -> Self {
        let mut markers = Vec::new();
        for &d in SINGLE_MARK_POSITIONS.iter().filter(|&&d| d < g.fret_count) {
            markers.push(Element::new(
                "single_mark",
                Shape::Circle { cx: g.fret_center_x(d), cy: g.single_mark_y(), r: g.mark_radius },
                "black",
            ));
        }
        for (k, cy) in g.double_mark_ys().into_iter().enumerate() {
            for &d in DOUBLE_MARK_POSITIONS.iter().filter(|&&d| d < g.fret_count) {
                markers.push(Element::new(
                    &format!("double_mark-{}", k + 1),
                    Shape::Circle { cx: g.fret_center_x(d), cy, r: g.mark_radius },
                    "black",
                ));
            }
        }

        let fret_lines = (1..g.fret_count)
            .map(|d| {
                Element::new(
                    "fret_line",
                    Shape::Rect { x: g.fret_line_x(d), y: 0.0, width: g.fret_line_width, height: g.height },
                    "black",
                )
            })
            .collect();

        let strings = tuning
            .iter()
            .enumerate()
            .map(|(i, &base)| {
                let color = if palette.is_empty() {
                    "gray".to_string()
                } else {
                    palette[i % palette.len()].clone()
                };
                StringLayer {
                    index: i,
                    y: g.string_y(i),
                    width: g.width,
                    height: g.row_height,
                    elements: string_elements(g, i, base, &color),
                    color,
                    base_note: base,
                }
            })
            .collect();

        Self {
            width: g.width,
            height: g.height,
            background: BOARD_COLOR.to_string(),
            markers,
            fret_lines,
            strings,
        }
    }

    /// Every interactive element, string by string.
    pub fn targets(&self) -> impl Iterator<Item = (&Element, FretTarget)> {
        self.strings
            .iter()
            .flat_map(|s| s.elements.iter())
            .filter_map(|e| e.target.map(|t| (e, t)))
    }

    pub fn find(&self, id: &str) -> Option<&Element> {
        self.strings
            .iter()
            .flat_map(|s| s.elements.iter())
            .find(|e| e.id.as_deref() == Some(id))
    }

    /// Standalone SVG document.
    pub fn to_svg(&self) -> String {
        let mut out = String::with_capacity(64 * 1024);
        let _ = writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" class="base" width="{}" height="{}" style="background-color: {}">"#,
            num(self.width),
            num(self.height),
            escape(&self.background)
        );
        for e in self.markers.iter().chain(self.fret_lines.iter()) {
            write_element(&mut out, e, "  ");
        }
        for s in &self.strings {
            let _ = writeln!(
                out,
                r#"  <svg class="string-{}" y="{}" width="{}" height="{}" data-base-note="{}">"#,
                s.index,
                num(s.y),
                num(s.width),
                num(s.height),
                s.base_note
            );
            for e in &s.elements {
                write_element(&mut out, e, "    ");
            }
            out.push_str("  </svg>\n");
        }
        out.push_str("</svg>\n");
        out
    }
}

fn string_elements(g: &Geometry, i: usize, base: u8, color: &str) -> Vec<Element> {
    let dead = g.dead_fret();
    let mut elements = Vec::with_capacity(2 * g.fret_count + 2);

    for d in g.circle_offsets() {
        let mut circle = Element::new(
            "fret",
            Shape::Circle { cx: g.fret_center_x(d), cy: g.center_line, r: g.fret_radius },
            color,
        )
        .with_id(format!("s{i}-f{d}"));
        if d < dead {
            circle = circle.with_target(FretTarget { string: i, offset: d });
        }
        elements.push(circle);
    }

    for d in g.circle_offsets() {
        let content = match u8::try_from(base as usize + d) {
            Ok(p) if d < dead && p <= 127 => note_name(p),
            _ => String::new(),
        };
        elements.push(
            Element::new(
                "fret",
                Shape::Text { x: g.label_x(d), y: g.center_line, content, font_size: g.text_height },
                "white",
            )
            .with_id(format!("s{i}-l{d}")),
        );
    }

    let (x, y, side) = g.open_rect();
    elements.push(
        Element::new("open", Shape::Rect { x, y, width: side, height: side }, color)
            .with_id(format!("s{i}-open"))
            .with_target(FretTarget { string: i, offset: 0 }),
    );
    elements.push(
        Element::new(
            "base",
            Shape::Text {
                x: g.fret_radius / 3.0,
                y: g.center_line,
                content: note_name(base.min(127)),
                font_size: g.text_height,
            },
            "white",
        )
        .with_id(format!("s{i}-open-label")),
    );
    elements
}

fn write_element(out: &mut String, e: &Element, indent: &str) {
    let mut attrs = String::new();
    if let Some(id) = &e.id {
        let _ = write!(attrs, r#" id="{id}""#);
    }
    let class = if e.target.is_some() {
        format!("{} target", e.class)
    } else {
        e.class.clone()
    };
    let _ = write!(attrs, r#" class="{}" fill="{}""#, escape(&class), escape(&e.fill));
    if let Some(stroke) = &e.stroke {
        let _ = write!(attrs, r#" stroke="{}" stroke-width="0""#, escape(stroke));
    }
    if let Some(t) = e.target {
        let _ = write!(attrs, r#" data-string="{}" data-fret="{}""#, t.string, t.offset);
    }

    let _ = match &e.shape {
        Shape::Circle { cx, cy, r } => writeln!(
            out,
            r#"{indent}<circle{attrs} cx="{}" cy="{}" r="{}"/>"#,
            num(*cx),
            num(*cy),
            num(*r)
        ),
        Shape::Rect { x, y, width, height } => writeln!(
            out,
            r#"{indent}<rect{attrs} x="{}" y="{}" width="{}" height="{}"/>"#,
            num(*x),
            num(*y),
            num(*width),
            num(*height)
        ),
        Shape::Text { x, y, content, font_size } => writeln!(
            out,
            r#"{indent}<text{attrs} x="{}" y="{}" dy=".35em" style="font-size: {}px; pointer-events: none">{}</text>"#,
            num(*x),
            num(*y),
            num(*font_size),
            escape(content)
        ),
    };
}

/// Up to three decimals, trailing zeros dropped.
fn num(v: f64) -> String {
    let s = format!("{v:.3}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// Safe for both text content and double-quoted attribute values.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
