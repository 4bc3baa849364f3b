//! Document color handler for color-literal previews.
//!
//! `float3`/`float4`/`half3`/`half4` constructors whose arguments are all
//! numeric literals in `[0, 1]` are reported as colors. A presentation is
//! written back in the same constructor family.

use std::sync::OnceLock;

use lsp_types::{
    Color, ColorInformation, ColorPresentation, ColorPresentationParams, DocumentColorParams,
    TextEdit,
};
use metalls_syntax::{mask, Span};
use regex::Regex;

use crate::vfs::Document;

fn constructor_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(float|half)([34])\s*\(([^()]*)\)").ok())
        .as_ref()
}

/// Handle a document color request.
pub fn handle_document_color(
    _params: &DocumentColorParams,
    doc: &Document,
) -> Option<Vec<ColorInformation>> {
    let re = constructor_regex()?;
    let masked = mask(doc.text());

    let colors: Vec<ColorInformation> = re
        .captures_iter(&masked)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let arity: usize = caps.get(2)?.as_str().parse().ok()?;
            let args = caps.get(3)?.as_str();
            let color = parse_color(args, arity)?;
            Some(ColorInformation {
                range: doc.line_index().range(Span::new(whole.start(), whole.end())),
                color,
            })
        })
        .collect();

    if colors.is_empty() {
        None
    } else {
        Some(colors)
    }
}

/// Parse `arity` comma-separated literals in `[0, 1]` into a color.
fn parse_color(args: &str, arity: usize) -> Option<Color> {
    let values: Vec<f32> = args
        .split(',')
        .map(|arg| {
            let literal = arg.trim().trim_end_matches(['f', 'F', 'h', 'H']);
            literal.parse::<f32>().ok().filter(|v| (0.0..=1.0).contains(v))
        })
        .collect::<Option<_>>()?;

    match (arity, values.as_slice()) {
        (3, &[red, green, blue]) => Some(Color {
            red,
            green,
            blue,
            alpha: 1.0,
        }),
        (4, &[red, green, blue, alpha]) => Some(Color {
            red,
            green,
            blue,
            alpha,
        }),
        _ => None,
    }
}

/// Handle a color presentation request.
pub fn handle_color_presentation(
    params: &ColorPresentationParams,
    doc: &Document,
) -> Vec<ColorPresentation> {
    let span = doc.line_index().span(params.range);
    let original = span.text(doc.text()).trim_start();
    let family = if original.starts_with("half") {
        "half"
    } else {
        "float"
    };
    let three = original
        .strip_prefix(family)
        .is_some_and(|rest| rest.starts_with('3'));

    let c = &params.color;
    let label = if three && (c.alpha - 1.0).abs() < f32::EPSILON {
        format!(
            "{family}3({}, {}, {})",
            component(c.red),
            component(c.green),
            component(c.blue)
        )
    } else {
        format!(
            "{family}4({}, {}, {}, {})",
            component(c.red),
            component(c.green),
            component(c.blue),
            component(c.alpha)
        )
    };

    vec![ColorPresentation {
        label: label.clone(),
        text_edit: Some(TextEdit {
            range: params.range,
            new_text: label,
        }),
        additional_text_edits: None,
    }]
}

/// Format a component with up to three decimals, always as a float literal.
fn component(value: f32) -> String {
    let rounded = (value.clamp(0.0, 1.0) * 1000.0).round() / 1000.0;
    let text = rounded.to_string();
    if text.contains('.') {
        text
    } else {
        format!("{text}.0")
    }
}
