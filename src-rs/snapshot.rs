//! Captured page model: an arena of nodes with text, geometry and resolved style.

use crate::color::{parse_color, Color};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Builds a rect from its edges. Returns `None` unless every value is finite.
    pub fn from_edges(left: f64, top: f64, right: f64, bottom: f64) -> Option<Rect> {
        let rect = Rect {
            top,
            left,
            right,
            bottom,
            width: right - left,
            height: bottom - top,
        };
        rect.is_finite().then_some(rect)
    }

    pub fn is_finite(&self) -> bool {
        [
            self.top,
            self.left,
            self.right,
            self.bottom,
            self.width,
            self.height,
        ]
        .iter()
        .all(|v| v.is_finite())
    }

    /// True when both rects share part of the same visual row.
    pub fn overlaps_vertically(&self, other: &Rect) -> bool {
        self.top < other.bottom && other.top < self.bottom
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Style {
    pub color: Option<Color>,
    pub background_color: Option<Color>,
    pub fill: Option<Color>,
    pub stroke: Option<Color>,
}

/// Everything captured about one element, before it is linked into a tree.
#[derive(Debug, Clone, Default)]
pub struct NodeData {
    pub tag: String,
    pub text: String,
    pub rect: Option<Rect>,
    pub style: Style,
    pub class_name: String,
    /// Raw SVG `fill` attribute, consulted when no resolved fill exists.
    pub fill_attr: Option<String>,
    /// Raw SVG `stroke` attribute, consulted when no resolved stroke exists.
    pub stroke_attr: Option<String>,
}

impl NodeData {
    pub fn new(tag: &str, text: &str) -> NodeData {
        NodeData {
            tag: tag.to_string(),
            text: text.trim().to_string(),
            ..NodeData::default()
        }
    }

    pub fn with_rect(mut self, rect: Rect) -> NodeData {
        self.rect = rect.is_finite().then_some(rect);
        self
    }

    pub fn with_color(mut self, color: Color) -> NodeData {
        self.style.color = Some(color);
        self
    }

    pub fn with_background(mut self, color: Color) -> NodeData {
        self.style.background_color = Some(color);
        self
    }

    pub fn with_fill(mut self, color: Color) -> NodeData {
        self.style.fill = Some(color);
        self
    }

    pub fn with_class(mut self, class_name: &str) -> NodeData {
        self.class_name = class_name.to_string();
        self
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub data: NodeData,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn text(&self) -> &str {
        &self.data.text
    }

    pub fn rect(&self) -> Option<&Rect> {
        self.data.rect.as_ref()
    }

    pub fn style(&self) -> &Style {
        &self.data.style
    }

    pub fn class_name(&self) -> &str {
        &self.data.class_name
    }

    pub fn fill(&self) -> Option<Color> {
        self.data
            .style
            .fill
            .or_else(|| self.data.fill_attr.as_deref().and_then(parse_color))
    }

    pub fn stroke(&self) -> Option<Color> {
        self.data
            .style
            .stroke
            .or_else(|| self.data.stroke_attr.as_deref().and_then(parse_color))
    }

    /// Text length in characters, not bytes.
    pub fn text_len(&self) -> usize {
        self.data.text.chars().count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl Snapshot {
    pub fn new() -> Snapshot {
        Snapshot::default()
    }

    /// Links a node under `parent` (or as a new root). An unknown parent id
    /// makes the node a root.
    pub fn add_node(&mut self, parent: Option<NodeId>, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        let parent = parent.filter(|p| p.0 < self.nodes.len());
        self.nodes.push(Node {
            data,
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(p) => self.nodes[p.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    /// Every node in document order.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            out.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Ancestors of `id`, nearest first, at most `max_levels` of them.
    pub fn ancestors(&self, id: NodeId, max_levels: usize) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.parent(id);
        while let Some(p) = cur {
            if out.len() >= max_levels {
                break;
            }
            out.push(p);
            cur = self.parent(p);
        }
        out
    }

    /// Breadth-first descendants of `id` (excluding `id`), stopping after `cap` nodes.
    pub fn descendants(&self, id: NodeId, cap: usize) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut queue: VecDeque<NodeId> = match self.node(id) {
            Some(node) => node.children.iter().copied().collect(),
            None => return out,
        };
        while let Some(next) = queue.pop_front() {
            if out.len() >= cap {
                break;
            }
            let Some(node) = self.node(next) else {
                continue;
            };
            out.push(next);
            queue.extend(node.children.iter().copied());
        }
        out
    }

    /// Siblings before `id`, nearest first, at most `max` of them.
    pub fn preceding_siblings(&self, id: NodeId, max: usize) -> Vec<NodeId> {
        let siblings = match self.parent(id).and_then(|p| self.node(p)) {
            Some(parent) => parent.children.as_slice(),
            None => self.roots.as_slice(),
        };
        let Some(pos) = siblings.iter().position(|s| *s == id) else {
            return Vec::new();
        };
        siblings[..pos].iter().rev().take(max).copied().collect()
    }

    pub fn from_json_str(raw: &str) -> Result<Snapshot> {
        // Each DOM level nests an object and a children array, so real pages
        // exceed serde_json's default depth limit. Building and dropping a
        // `Value` both recurse, hence the explicit cap checked up front.
        let depth = json_depth(raw);
        if depth > MAX_JSON_DEPTH {
            bail!("snapshot nests {depth} levels deep (limit {MAX_JSON_DEPTH})");
        }
        let mut de = serde_json::Deserializer::from_str(raw);
        de.disable_recursion_limit();
        let value = Value::deserialize(&mut de).context("snapshot is not valid JSON")?;
        de.end().context("trailing data after snapshot JSON")?;
        Ok(Snapshot::from_json(&value))
    }

    /// Builds a snapshot from capture JSON.
    ///
    /// Accepts a single root object, a bare array of roots, or an object with a
    /// `roots`/`nodes` array. Malformed members degrade per node instead of
    /// failing the whole document.
    pub fn from_json(value: &Value) -> Snapshot {
        let roots: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            Value::Object(map) => match map.get("roots").or_else(|| map.get("nodes")) {
                Some(Value::Array(items)) => items.iter().collect(),
                _ => vec![value],
            },
            _ => Vec::new(),
        };

        let mut snapshot = Snapshot::new();
        let mut stack: Vec<(Option<NodeId>, &Value)> =
            roots.into_iter().rev().map(|v| (None, v)).collect();
        while let Some((parent, raw)) = stack.pop() {
            let Value::Object(obj) = raw else {
                continue;
            };
            let id = snapshot.add_node(parent, node_data_from_json(obj));
            if let Some(Value::Array(children)) = obj.get("children") {
                stack.extend(children.iter().rev().map(|c| (Some(id), c)));
            }
        }
        snapshot
    }
}

/// Deepest array/object nesting accepted from capture JSON (two per DOM level).
pub const MAX_JSON_DEPTH: usize = 512;

/// Maximum bracket nesting of `raw`, ignoring brackets inside strings.
fn json_depth(raw: &str) -> usize {
    let mut depth = 0usize;
    let mut max = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for b in raw.bytes() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' | b'{' => {
                depth += 1;
                max = max.max(depth);
            }
            b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max
}

fn value_to_f64(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_end_matches("px").parse::<f64>().ok(),
        _ => None,
    }
}

fn value_to_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => {
            let v = s.trim();
            if v.is_empty() {
                None
            } else {
                Some(v.to_string())
            }
        }
        _ => None,
    }
}

fn first_of<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

fn rect_from_json(value: Option<&Value>) -> Option<Rect> {
    let Value::Object(r) = value? else {
        return None;
    };
    let left = value_to_f64(first_of(r, &["left", "x"]))?;
    let top = value_to_f64(first_of(r, &["top", "y"]))?;
    let right = value_to_f64(r.get("right"))
        .or_else(|| Some(left + value_to_f64(first_of(r, &["width", "w"]))?))?;
    let bottom = value_to_f64(r.get("bottom"))
        .or_else(|| Some(top + value_to_f64(first_of(r, &["height", "h"]))?))?;
    Rect::from_edges(left, top, right, bottom)
}

fn color_from_json(value: Option<&Value>) -> Option<Color> {
    value_to_string(value).as_deref().and_then(parse_color)
}

fn style_from_json(value: Option<&Value>) -> Style {
    let Some(Value::Object(s)) = value else {
        return Style::default();
    };
    Style {
        color: color_from_json(s.get("color")),
        background_color: color_from_json(first_of(
            s,
            &["backgroundColor", "background_color", "background-color"],
        )),
        fill: color_from_json(s.get("fill")),
        stroke: color_from_json(s.get("stroke")),
    }
}

fn class_from_json(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        // SVG elements expose className as an SVGAnimatedString
        Some(Value::Object(o)) => value_to_string(o.get("baseVal")).unwrap_or_default(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}

fn node_data_from_json(obj: &Map<String, Value>) -> NodeData {
    let attrs = match obj.get("attrs").or_else(|| obj.get("attributes")) {
        Some(Value::Object(a)) => Some(a),
        _ => None,
    };
    let attr = |key: &str| value_to_string(attrs.and_then(|a| a.get(key)));

    NodeData {
        tag: value_to_string(first_of(obj, &["tag", "tagName"]))
            .unwrap_or_default()
            .to_ascii_lowercase(),
        text: value_to_string(first_of(obj, &["text", "innerText", "textContent"]))
            .unwrap_or_default(),
        rect: rect_from_json(first_of(obj, &["rect", "bounds"])),
        style: style_from_json(obj.get("style")),
        class_name: class_from_json(first_of(obj, &["className", "class"])),
        fill_attr: attr("fill"),
        stroke_attr: attr("stroke"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use serde_json::json;

    fn sample() -> Snapshot {
        Snapshot::from_json(&json!({
            "tag": "DIV",
            "className": "timeline",
            "children": [
                {"tag": "span", "text": " 12 mar ", "rect": {"left": 0, "top": 10, "right": 40, "bottom": 30}},
                {"tag": "span", "text": "Em trânsito", "rect": {"x": 50, "y": 10, "w": 90, "h": 20},
                 "style": {"color": "rgb(10, 150, 20)", "backgroundColor": "rgba(0, 0, 0, 0)"}},
                "not a node",
                {"tag": "svg", "className": {"baseVal": "icon"}, "attrs": {"fill": "#00aa00"},
                 "children": [{"tag": "path"}]}
            ]
        }))
    }

    #[test]
    fn loads_nested_json_in_document_order() {
        let snap = sample();
        assert_eq!(snap.len(), 5);
        assert_eq!(snap.roots(), &[NodeId(0)]);
        let order: Vec<&str> = snap
            .preorder()
            .into_iter()
            .map(|id| snap.node(id).unwrap().data.tag.as_str())
            .collect();
        assert_eq!(order, vec!["div", "span", "span", "svg", "path"]);

        let date = snap.node(NodeId(1)).unwrap();
        assert_eq!(date.text(), "12 mar");
        assert_eq!(date.rect().unwrap().width, 40.0);

        let status = snap.node(NodeId(2)).unwrap();
        assert_eq!(status.rect().unwrap().right, 140.0);
        assert_eq!(status.style().color, Some(Rgb([10, 150, 20])));
        assert_eq!(status.style().background_color, None);
    }

    #[test]
    fn svg_fill_falls_back_to_raw_attribute() {
        let snap = sample();
        let svg = snap.node(NodeId(3)).unwrap();
        assert_eq!(svg.class_name(), "icon");
        assert_eq!(svg.style().fill, None);
        assert_eq!(svg.fill(), Some(Rgb([0, 170, 0])));
    }

    #[test]
    fn non_finite_or_partial_geometry_is_dropped() {
        let snap = Snapshot::from_json(&json!([
            {"text": "a", "rect": {"left": 0, "top": 0}},
            {"text": "b", "rect": {"left": -1.7e308, "top": 0, "right": 1.7e308, "bottom": 5}}
        ]));
        assert_eq!(snap.roots().len(), 2);
        assert!(snap.node(NodeId(0)).unwrap().rect().is_none());
        assert!(snap.node(NodeId(1)).unwrap().rect().is_none());
        let inf = Rect::from_edges(0.0, 0.0, f64::INFINITY, 1.0);
        assert!(inf.is_none());
    }

    #[test]
    fn relations_are_bounded() {
        let mut snap = Snapshot::new();
        let root = snap.add_node(None, NodeData::new("div", ""));
        let mut chain = root;
        for _ in 0..10 {
            chain = snap.add_node(Some(chain), NodeData::new("div", ""));
        }
        assert_eq!(snap.ancestors(chain, 4).len(), 4);
        assert_eq!(snap.ancestors(root, 4).len(), 0);
        assert_eq!(snap.descendants(root, 3).len(), 3);
        assert_eq!(snap.descendants(root, 100).len(), 10);

        let list = snap.add_node(None, NodeData::new("ul", ""));
        let items: Vec<NodeId> = (0..5)
            .map(|i| snap.add_node(Some(list), NodeData::new("li", &i.to_string())))
            .collect();
        assert_eq!(snap.preceding_siblings(items[4], 2), vec![items[3], items[2]]);
        assert!(snap.preceding_siblings(items[0], 6).is_empty());
    }

    #[test]
    fn deep_documents_load() {
        let depth = 120;
        let snap = Snapshot::from_json_str(&nested_dom(depth)).unwrap();
        assert_eq!(snap.len(), depth + 1);
        assert_eq!(snap.ancestors(NodeId(depth), usize::MAX).len(), depth);
    }

    fn nested_dom(depth: usize) -> String {
        let mut raw = String::new();
        for _ in 0..depth {
            raw.push_str(r#"{"tag": "div", "children": ["#);
        }
        raw.push_str(r#"{"tag": "span", "text": "Entregue"}"#);
        for _ in 0..depth {
            raw.push_str("]}");
        }
        raw
    }

    #[test]
    fn pathologically_deep_documents_are_rejected() {
        let arrays = format!("{}{}", "[".repeat(200_000), "]".repeat(200_000));
        let err = Snapshot::from_json_str(&arrays).unwrap_err();
        assert!(err.to_string().contains("limit 512"), "{err}");

        assert!(Snapshot::from_json_str(&nested_dom(60_000)).is_err());
        // one DOM level past the cap
        assert!(Snapshot::from_json_str(&nested_dom(MAX_JSON_DEPTH / 2)).is_err());
    }

    #[test]
    fn brackets_inside_strings_do_not_count() {
        assert_eq!(json_depth(r#"{"text": "[[[{{\"]]"}"#), 1);
        assert_eq!(json_depth("[[1], [2, [3]]]"), 3);
        assert_eq!(json_depth("]]][["), 2);
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(Snapshot::from_json_str("<html>").is_err());
        assert!(Snapshot::from_json_str("null").unwrap().is_empty());
    }
}
