use std::collections::HashMap;

use crate::config::CanvasConfig;
use crate::fonts::{TextMeasure, wrap_words};
use crate::theme::CanvasTheme;
use crate::xml::{escape_xml, sanitize_color};

use super::edge_render::EdgeLayer;
use super::edges::derive_graph_edges;
use super::geometry::{Point, Rect, Size};
use super::layout::LayoutEngine;
use super::registry::{NodeHandle, NodeHandlers, NodeRegistry};
use super::types::{Edge, Node, NodeStatus};

const HEADER_HEIGHT: f32 = 20.0;
const CHIP_PADDING_X: f32 = 8.0;
const SECTION_GAP: f32 = 8.0;
const PULSE_RADIUS: f32 = 4.0;
const CARD_BORDER_WIDTH: f32 = 1.5;
const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone)]
pub struct SceneOptions {
    /// Re-run the layout for every node, ignoring stored positions.
    pub organize: bool,
    /// Blank space around the drawing.
    pub padding: f32,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            organize: false,
            padding: 24.0,
        }
    }
}

/// Rendered canvas.
#[derive(Debug, Clone)]
pub struct Scene {
    pub svg: String,
    pub width: f32,
    pub height: f32,
    /// Final top-left of every card, in input order.
    pub positions: Vec<(String, Point)>,
    pub edges_drawn: usize,
}

/// Card size and the title broken into lines.
#[derive(Debug, Clone, PartialEq)]
pub struct CardMetrics {
    pub size: Size,
    pub title_lines: Vec<String>,
}

fn display_title(node: &Node) -> &str {
    let title = node.title.trim();
    if title.is_empty() { UNTITLED } else { title }
}

/// Sizes a node card the way the node view lays itself out. A measured
/// size on the node wins; otherwise the width follows the title, clamped to
/// the theme's card range.
pub fn measure_card<T: TextMeasure + ?Sized>(node: &Node, theme: &CanvasTheme, measure: &mut T) -> CardMetrics {
    let padding = theme.card_padding;
    let min_width = theme.card_min_width;
    let max_width = theme.card_max_width.max(min_width);
    let title = display_title(node);
    let supplied = node.size.filter(Size::is_measured);

    let width = match supplied {
        Some(size) => size.width,
        None => {
            let (natural, _) = measure.measure_text(title, theme.font_size_title, true, None);
            (natural + 2.0 * padding).max(min_width).min(max_width)
        }
    };

    let text_width = (width - 2.0 * padding).max(1.0);
    let title_lines = wrap_words(measure, title, theme.font_size_title, true, text_width);

    let height = match supplied {
        Some(size) => size.height,
        None => {
            let title_height = theme.font_size_title * theme.line_height * title_lines.len() as f32;
            padding + HEADER_HEIGHT + SECTION_GAP + title_height + footer_height(node, theme) + padding
        }
    };

    CardMetrics {
        size: Size::new(width, height),
        title_lines,
    }
}

fn footer_height(node: &Node, theme: &CanvasTheme) -> f32 {
    if node.attachments > 0 {
        SECTION_GAP + theme.font_size_meta * theme.line_height
    } else {
        0.0
    }
}

/// Places and draws every node and the edges derived from them.
///
/// Nodes keep their stored position unless `organize` is set; nodes without
/// one are laid out and placed below the positioned part of the canvas.
pub fn render_canvas<T: TextMeasure + ?Sized>(
    nodes: &[Node],
    theme: &CanvasTheme,
    config: &CanvasConfig,
    measure: &mut T,
    options: &SceneOptions,
) -> Scene {
    let edges = derive_graph_edges(nodes);
    let cards: Vec<CardMetrics> = nodes
        .iter()
        .map(|node| measure_card(node, theme, measure))
        .collect();

    let origins = place_nodes(nodes, &cards, &edges, config, options.organize);

    // Mount the cards exactly as the live canvas would, then let the edge
    // layer draw against the registry.
    let registry = NodeRegistry::new();
    let handles: Vec<NodeHandle> = nodes
        .iter()
        .zip(&cards)
        .zip(&origins)
        .map(|((node, card), origin)| registry.mount_with(node.id.clone(), *origin, card.size, NodeHandlers::NONE))
        .collect();
    let mut layer = EdgeLayer::new(registry.clone(), edges, config.edges.clone());
    let frame = layer.frame();

    let padding = if options.padding.is_finite() { options.padding.max(0.0) } else { 0.0 };
    let bounds = bounding_rect(cards.iter().zip(&origins).map(|(card, origin)| Rect::from_parts(*origin, card.size)));
    let width = bounds.w + 2.0 * padding;
    let height = bounds.h + 2.0 * padding;

    let colors: HashMap<&str, &str> = nodes
        .iter()
        .map(|node| (node.id.as_str(), sanitize_color(node.color.as_deref(), &theme.primary)))
        .collect();

    let mut content = String::new();
    content.push_str(&format!(
        r#"<g transform="translate({:.2} {:.2})">"#,
        padding - bounds.x,
        padding - bounds.y
    ));

    content.push_str(r#"<g class="edges">"#);
    let mut edges_drawn = 0;
    for geometry in frame.iter().filter(|g| !g.is_empty()) {
        let color = colors.get(geometry.to.as_str()).copied().unwrap_or(&theme.primary);
        content.push_str(&format!(
            r#"<path id="{}" d="{}" fill="none" stroke="{}" stroke-width="{:.2}" stroke-linecap="round" stroke-linejoin="round" opacity="{:.2}" />"#,
            escape_xml(&geometry.id),
            geometry.path,
            escape_xml(color),
            config.edges.stroke_width,
            geometry.opacity,
        ));
        if !geometry.arrow.is_empty() {
            content.push_str(&format!(
                r#"<path d="{}" fill="{}" opacity="{:.2}" />"#,
                geometry.arrow,
                escape_xml(color),
                geometry.opacity,
            ));
        }
        edges_drawn += 1;
    }
    content.push_str("</g>");

    content.push_str(r#"<g class="nodes">"#);
    for ((node, card), origin) in nodes.iter().zip(&cards).zip(&origins) {
        draw_card(&mut content, node, card, *origin, theme);
    }
    content.push_str("</g></g>");

    drop(layer);
    drop(handles);

    log::debug!(
        "scene: {} nodes, {} of {} edges drawn, {:.0}x{:.0}",
        nodes.len(),
        edges_drawn,
        frame.len(),
        width,
        height
    );

    let svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {:.2} {:.2}" width="{:.2}" height="{:.2}"><rect width="100%" height="100%" fill="{}" />{}</svg>"#,
        width,
        height,
        width,
        height,
        escape_xml(&theme.background),
        content,
    );

    Scene {
        svg,
        width,
        height,
        positions: nodes
            .iter()
            .zip(&origins)
            .map(|(node, origin)| (node.id.clone(), *origin))
            .collect(),
        edges_drawn,
    }
}

fn place_nodes(
    nodes: &[Node],
    cards: &[CardMetrics],
    edges: &[Edge],
    config: &CanvasConfig,
    organize: bool,
) -> Vec<Point> {
    let stored: Vec<Option<Point>> = nodes
        .iter()
        .map(|node| if organize { None } else { node.position.filter(Point::is_finite) })
        .collect();

    if stored.iter().all(Option::is_some) {
        return stored.into_iter().flatten().collect();
    }

    let sized: Vec<Node> = nodes
        .iter()
        .zip(cards)
        .map(|(node, card)| {
            let mut node = node.clone();
            node.size = Some(card.size);
            node
        })
        .collect();
    let engine = LayoutEngine::new(&config.layout);
    let layout = engine.layout(&sized, edges);

    // Laid-out nodes go underneath whatever already has a place.
    let positioned_bottom = stored
        .iter()
        .zip(cards)
        .filter_map(|(origin, card)| origin.map(|p| p.y + card.size.height))
        .fold(None, |acc: Option<f32>, bottom| Some(acc.map_or(bottom, |a| a.max(bottom))));
    let shift_y = positioned_bottom.map_or(0.0, |bottom| bottom + engine.rank_separation - engine.margin);

    stored
        .iter()
        .zip(&layout.nodes)
        .map(|(origin, placed)| origin.unwrap_or(Point::new(placed.rect.x, placed.rect.y + shift_y)))
        .collect()
}

fn bounding_rect(rects: impl Iterator<Item = Rect>) -> Rect {
    let mut min = Point::new(f32::INFINITY, f32::INFINITY);
    let mut max = Point::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
    for rect in rects {
        min.x = min.x.min(rect.x);
        min.y = min.y.min(rect.y);
        max.x = max.x.max(rect.right());
        max.y = max.y.max(rect.bottom());
    }
    if min.x > max.x || min.y > max.y {
        return Rect::default();
    }
    Rect::new(min.x, min.y, max.x - min.x, max.y - min.y)
}

fn draw_card(out: &mut String, node: &Node, card: &CardMetrics, origin: Point, theme: &CanvasTheme) {
    let padding = theme.card_padding;
    let status_color = node.status.map(|status| theme.status_color(status));
    let accent = sanitize_color(node.color.as_deref(), status_color.unwrap_or(&theme.border));

    out.push_str(&format!(
        r#"<g class="node" data-id="{}"><rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" rx="{:.2}" fill="{}" stroke="{}" stroke-width="{:.2}" />"#,
        escape_xml(&node.id),
        origin.x,
        origin.y,
        card.size.width,
        card.size.height,
        theme.card_radius,
        escape_xml(&theme.card),
        escape_xml(accent),
        CARD_BORDER_WIDTH,
    ));

    let header_top = origin.y + padding;
    let header_mid = header_top + HEADER_HEIGHT / 2.0;

    if let (Some(status), Some(color)) = (node.status, status_color) {
        let label = status.label();
        // Chip width from a plain per-character estimate; the chip only
        // needs to enclose a short fixed label.
        let chip_width = label.chars().count() as f32 * theme.font_size_meta * 0.6 + 2.0 * CHIP_PADDING_X;
        out.push_str(&format!(
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" rx="{:.2}" fill="{}" fill-opacity="0.15" />"#,
            origin.x + padding,
            header_top,
            chip_width,
            HEADER_HEIGHT,
            HEADER_HEIGHT / 2.0,
            escape_xml(color),
        ));
        draw_text(
            out,
            origin.x + padding + CHIP_PADDING_X,
            header_mid + theme.font_size_meta * 0.35,
            label,
            theme.font_size_meta,
            color,
            &theme.font_family,
            false,
        );

        if status == NodeStatus::InProgress {
            let cx = origin.x + card.size.width - padding - PULSE_RADIUS;
            out.push_str(&format!(
                r#"<circle class="pulse" cx="{:.2}" cy="{:.2}" r="{:.2}" fill="{}" fill-opacity="0.25" /><circle cx="{:.2}" cy="{:.2}" r="{:.2}" fill="{}" />"#,
                cx,
                header_mid,
                PULSE_RADIUS * 2.0,
                escape_xml(color),
                cx,
                header_mid,
                PULSE_RADIUS,
                escape_xml(color),
            ));
        }
    }

    let line_height = theme.font_size_title * theme.line_height;
    let mut baseline = header_top + HEADER_HEIGHT + SECTION_GAP + theme.font_size_title;
    for line in &card.title_lines {
        draw_text(
            out,
            origin.x + padding,
            baseline,
            line,
            theme.font_size_title,
            &theme.text,
            &theme.font_family,
            true,
        );
        baseline += line_height;
    }

    if node.attachments > 0 {
        let label = if node.attachments == 1 {
            "1 attachment".to_string()
        } else {
            format!("{} attachments", node.attachments)
        };
        let y = baseline - line_height + SECTION_GAP + theme.font_size_meta * theme.line_height;
        draw_text(
            out,
            origin.x + padding,
            y,
            &label,
            theme.font_size_meta,
            &theme.text_secondary,
            &theme.font_family,
            false,
        );
    }

    out.push_str("</g>");
}

#[allow(clippy::too_many_arguments)]
fn draw_text(out: &mut String, x: f32, y: f32, text: &str, font_size: f32, fill: &str, font_family: &str, bold: bool) {
    let weight_attr = if bold { " font-weight=\"600\"" } else { "" };
    out.push_str(&format!(
        r#"<text x="{:.2}" y="{:.2}" font-family="{}" font-size="{:.2}" fill="{}"{}>{}</text>"#,
        x,
        y,
        escape_xml(font_family),
        font_size,
        escape_xml(fill),
        weight_attr,
        escape_xml(text),
    ));
}
