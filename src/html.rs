//! Helpers over `scraper` shared by the splitter and the section
//! parsers: text extraction, attribute-stripped re-serialization,
//! anchor collection and logical table grids with rowspan expansion.

use std::collections::HashMap;

use anyhow::{bail, Result};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

use crate::model::{TextValue, UrlLink};
use crate::textutil::collapse_ws;

static BODY_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());
static TABLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static TR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td, th").unwrap());
static A_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static BOLD_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("b, strong").unwrap());

/// Inline attributes removed during fragment re-serialization.
const STRIPPED_ATTRS: &[&str] = &["style", "class", "id", "rel", "target"];

const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "meta", "link", "wbr"];

pub fn parse_document(markup: &str) -> Html {
    Html::parse_document(markup)
}

/// Element children of `<body>`, in document order. A page without a
/// usable body cannot even be split; that is the one fatal condition.
pub fn body_children(doc: &Html) -> Result<Vec<ElementRef<'_>>> {
    let Some(body) = doc.select(&BODY_SEL).next() else {
        bail!("page has no <body> element");
    };
    let children: Vec<ElementRef> = body
        .children()
        .filter_map(ElementRef::wrap)
        .collect();
    if children.is_empty() {
        bail!("page <body> is empty");
    }
    Ok(children)
}

/// Whitespace-collapsed text content of one element.
pub fn element_text(el: ElementRef) -> String {
    collapse_ws(&el.text().collect::<String>())
}

/// Text content with `<br>` and block boundaries as newlines. Used for
/// cells that carry multiple values separated by line breaks.
pub fn element_text_with_breaks(el: ElementRef) -> String {
    let mut out = String::new();
    collect_text_with_breaks(el, &mut out);
    out.lines()
        .map(collapse_ws)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text_with_breaks(el: ElementRef, out: &mut String) {
    for node in el.children() {
        if let Some(text) = node.value().as_text() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(node) {
            let name = child.value().name();
            if name == "br" {
                out.push('\n');
            } else {
                if is_block_element(name) && !out.ends_with('\n') && !out.is_empty() {
                    out.push('\n');
                }
                collect_text_with_breaks(child, out);
                if is_block_element(name) {
                    out.push('\n');
                }
            }
        }
    }
}

fn is_block_element(name: &str) -> bool {
    matches!(
        name,
        "p" | "div" | "li" | "tr" | "table" | "ul" | "ol" | "h1" | "h2" | "h3" | "h4" | "h5"
            | "h6"
    )
}

/// Re-serialize one element keeping tag structure but dropping
/// style/class/id/rel/target attributes.
pub fn sanitized_html(el: ElementRef) -> String {
    let mut out = String::new();
    write_sanitized(el, &mut out);
    out
}

fn write_sanitized(el: ElementRef, out: &mut String) {
    let name = el.value().name();
    out.push('<');
    out.push_str(name);
    for (attr, value) in el.value().attrs() {
        if STRIPPED_ATTRS.contains(&attr) {
            continue;
        }
        out.push(' ');
        out.push_str(attr);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    out.push('>');
    if VOID_ELEMENTS.contains(&name) {
        return;
    }
    for node in el.children() {
        if let Some(text) = node.value().as_text() {
            out.push_str(&escape_text(text));
        } else if let Some(child) = ElementRef::wrap(node) {
            write_sanitized(child, out);
        }
    }
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

/// Build a `TextValue` (collapsed text + sanitized fragment) from one
/// element.
pub fn text_value(el: ElementRef) -> TextValue {
    TextValue {
        text: element_text(el),
        raw_html: sanitized_html(el),
    }
}

/// All `{text, href}` anchor pairs under `el`, skipping href-less
/// anchors.
pub fn anchors(el: ElementRef) -> Vec<UrlLink> {
    el.select(&A_SEL)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            Some(UrlLink {
                text: element_text(a),
                href: href.to_string(),
            })
        })
        .collect()
}

/// Descendant `<table>` elements of `el`, in document order. If `el`
/// itself is a table it is returned alone.
pub fn descendant_tables(el: ElementRef) -> Vec<ElementRef<'_>> {
    if el.value().name() == "table" {
        return vec![el];
    }
    el.select(&TABLE_SEL).collect()
}

/// First `<b>`/`<strong>` descendant, used for label routing.
pub fn first_bold(el: ElementRef) -> Option<ElementRef<'_>> {
    el.select(&BOLD_SEL).next()
}

pub fn is_heading_tag(el: ElementRef) -> bool {
    matches!(el.value().name(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// Expand a `<table>` into a logical grid. A cell with `rowspan=N` is
/// virtually duplicated into every row it spans, so callers can read
/// rows positionally without span arithmetic. Column positions honor
/// pending spans from earlier rows.
pub fn table_grid(table: ElementRef) -> Vec<Vec<ElementRef<'_>>> {
    let mut grid: Vec<Vec<ElementRef>> = Vec::new();
    // col index -> (cell, rows it still occupies)
    let mut pending: HashMap<usize, (ElementRef, usize)> = HashMap::new();

    for row in table.select(&TR_SEL) {
        let mut cells = row.select(&CELL_SEL).peekable();
        let mut out_row: Vec<ElementRef> = Vec::new();
        let mut col = 0usize;

        while cells.peek().is_some() || pending.contains_key(&col) {
            if let Some((cell, remaining)) = pending.get(&col).copied() {
                out_row.push(cell);
                if remaining <= 1 {
                    pending.remove(&col);
                } else {
                    pending.insert(col, (cell, remaining - 1));
                }
                col += 1;
                continue;
            }
            let Some(cell) = cells.next() else { break };
            let rowspan = cell
                .value()
                .attr("rowspan")
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(1);
            if rowspan > 1 {
                pending.insert(col, (cell, rowspan - 1));
            }
            out_row.push(cell);
            col += 1;
        }

        if !out_row.is_empty() {
            grid.push(out_row);
        }
    }

    grid
}
