//! Right-to-left mirroring
//!
//! Property names containing a `left`/`right` component are swapped first.
//! Names that survive unchanged are looked up in a static handler table that
//! rewrites their values. `@noflip` subtrees are skipped.

use crate::ast::visit::{Context, ModVisitor, PropertyContext, accept_with_insert_remove};
use crate::ast::{Node, NodeKind, Property, Stylesheet, Value};
use crate::result::Result;
use regex::Regex;
use std::sync::LazyLock;

static RESIZE_CURSOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([ns]?)([ew])-resize$").unwrap());

const ROOT_SELECTORS: &[&str] = &["body", "html", ":root"];

type Handler = fn(&mut Vec<Value>, &PropertyContext<'_>) -> bool;

const HANDLERS: &[(&str, Handler)] = &[
    ("background", flip_background_position),
    ("background-position", flip_background_position),
    ("background-position-x", flip_background_position),
    ("border-color", swap_four_values),
    ("border-style", swap_four_values),
    ("border-width", swap_four_values),
    ("clear", flip_first_keyword),
    ("cursor", flip_cursor),
    ("direction", flip_direction),
    ("float", flip_first_keyword),
    ("margin", swap_four_values),
    ("padding", swap_four_values),
    ("page-break-after", flip_first_keyword),
    ("page-break-before", flip_first_keyword),
    ("text-align", flip_first_keyword),
];

/// Mirrored property name, if the name has a horizontal component
fn flip_name(name: &str) -> Option<String> {
    let name = name.to_ascii_lowercase();
    let name = name.as_str();
    match name {
        "left" => return Some("right".to_string()),
        "right" => return Some("left".to_string()),
        _ => {}
    }
    if let Some(stem) = name.strip_suffix("-left") {
        return Some(format!("{stem}-right"));
    }
    if let Some(stem) = name.strip_suffix("-right") {
        return Some(format!("{stem}-left"));
    }
    if name.contains("-right-") {
        return Some(name.replace("-right-", "-left-"));
    }
    if name.contains("-left-") {
        return Some(name.replace("-left-", "-right-"));
    }
    None
}

fn flip_keyword(value: &mut Value) -> bool {
    let flipped = if value.is_ident("left") {
        "right"
    } else if value.is_ident("right") {
        "left"
    } else {
        return false;
    };
    *value = Value::ident(flipped);
    true
}

fn flip_first_keyword(values: &mut Vec<Value>, _ctx: &PropertyContext<'_>) -> bool {
    values.first_mut().is_some_and(flip_keyword)
}

/// `top right bottom left` becomes `top left bottom right`
fn swap_four_values(values: &mut Vec<Value>, _ctx: &PropertyContext<'_>) -> bool {
    if values.len() != 4 || values.iter().any(Value::is_operator) {
        return false;
    }
    values.swap(1, 3);
    true
}

fn flip_background_position(values: &mut Vec<Value>, _ctx: &PropertyContext<'_>) -> bool {
    let mut changed = false;
    let mut seen_horizontal = false;
    for value in values.iter_mut() {
        if flip_keyword(value) {
            changed = true;
            seen_horizontal = true;
            continue;
        }
        if value.is_ident("center") {
            seen_horizontal = true;
            continue;
        }
        if seen_horizontal {
            continue;
        }
        if let Value::Number { value: number, unit } = value {
            seen_horizontal = true;
            if unit.as_str() == "%" {
                *number = 100.0 - *number;
                changed = true;
                break;
            }
        }
    }
    changed
}

fn flip_cursor(values: &mut Vec<Value>, _ctx: &PropertyContext<'_>) -> bool {
    let Some(Value::Ident(cursor)) = values.first_mut() else {
        return false;
    };
    let lower = cursor.to_ascii_lowercase();
    let Some(captures) = RESIZE_CURSOR.captures(&lower) else {
        return false;
    };
    let east_west = if &captures[2] == "e" { "w" } else { "e" };
    *cursor = format!("{}{east_west}-resize", &captures[1]);
    true
}

/// `direction` only flips on the document root
fn flip_direction(values: &mut Vec<Value>, ctx: &PropertyContext<'_>) -> bool {
    let on_root = match ctx.selectors {
        [selector] => ROOT_SELECTORS
            .iter()
            .any(|root| selector.text.trim().eq_ignore_ascii_case(root)),
        _ => false,
    };
    if !on_root {
        return false;
    }
    let Some(value) = values.first_mut() else {
        return false;
    };
    let flipped = if value.is_ident("ltr") {
        "rtl"
    } else if value.is_ident("rtl") {
        "ltr"
    } else {
        return false;
    };
    *value = Value::ident(flipped);
    true
}

struct Mirror {
    flipped: usize,
}

impl ModVisitor for Mirror {
    fn visit(&mut self, node: &mut Node, _ctx: &mut Context) -> Result<bool> {
        Ok(!matches!(node.kind, NodeKind::NoFlip(_)))
    }

    fn property(&mut self, property: &mut Property, ctx: &PropertyContext) -> Result<()> {
        if let Some(name) = flip_name(&property.name) {
            tracing::trace!("Mirrored property {} -> {}", property.name, name);
            property.name = name;
            self.flipped += 1;
            return Ok(());
        }
        let name = property.name.to_ascii_lowercase();
        if let Some((_, handler)) = HANDLERS.iter().find(|(n, _)| *n == name) {
            if handler(&mut property.values, ctx) {
                tracing::trace!("Mirrored {} value", property.name);
                self.flipped += 1;
            }
        }
        Ok(())
    }
}

/// Rewrite a stylesheet for right-to-left presentation, returning the number
/// of declarations changed
pub fn mirror(sheet: &mut Stylesheet) -> Result<usize> {
    let mut mirror = Mirror { flipped: 0 };
    accept_with_insert_remove(&mut mirror, &mut sheet.nodes)?;
    tracing::debug!("Mirrored {} declarations", mirror.flipped);
    Ok(mirror.flipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_stylesheet;
    use crate::serialize::{RenderOptions, render};

    fn flip(text: &str) -> String {
        let mut sheet = parse_stylesheet("test.css", text).unwrap().stylesheet;
        mirror(&mut sheet).unwrap();
        render(&sheet, &RenderOptions::default()).unwrap().text
    }

    #[test]
    fn test_property_names() {
        assert_eq!(
            flip(".a { left: 1px; margin-right: 2px; border-left-color: red; border-right-width: 0; }"),
            ".a{right:1px;margin-left:2px;border-right-color:red;border-left-width:0;}"
        );
    }

    #[test]
    fn test_property_names_ignore_case() {
        assert_eq!(
            flip(".a { Margin-Left: 1px; LEFT: 2px; Border-Right-Style: none; }"),
            ".a{margin-right:1px;right:2px;border-left-style:none;}"
        );
    }

    #[test]
    fn test_four_value_shorthands_are_involutions() {
        let once = flip(".a { margin: 1px 2px 3px 4px; }");
        assert_eq!(once, ".a{margin:1px 4px 3px 2px;}");
        assert_eq!(flip(&once), ".a{margin:1px 2px 3px 4px;}");

        for name in ["padding", "border-color", "border-style", "border-width"] {
            let source = format!(".a {{ {name}: a b c d; }}");
            assert_eq!(flip(&source), format!(".a{{{name}:a d c b;}}"));
            assert_eq!(flip(&flip(&source)), format!(".a{{{name}:a b c d;}}"));
        }

        assert_eq!(flip(".a { margin: 1px 2px 3px; }"), ".a{margin:1px 2px 3px;}");
    }

    #[test]
    fn test_keyword_flips() {
        assert_eq!(
            flip(".a { float: left; clear: right; text-align: LEFT; page-break-after: left; }"),
            ".a{float:right;clear:left;text-align:right;page-break-after:right;}"
        );
        assert_eq!(flip(".a { float: none; }"), ".a{float:none;}");
    }

    #[test]
    fn test_background_position() {
        assert_eq!(
            flip(".a { background-position: 25% 50%; }"),
            ".a{background-position:75% 50%;}"
        );
        assert_eq!(
            flip(".a { background: url(x.png) left top no-repeat; }"),
            ".a{background:url(x.png) right top no-repeat;}"
        );
        assert_eq!(
            flip(".a { background-position: center 20%; }"),
            ".a{background-position:center 20%;}"
        );
        assert_eq!(
            flip(".a { background-position: 10px 0; }"),
            ".a{background-position:10px 0;}"
        );
    }

    #[test]
    fn test_cursor() {
        assert_eq!(flip(".a { cursor: ne-resize; }"), ".a{cursor:nw-resize;}");
        assert_eq!(flip(".a { cursor: W-Resize; }"), ".a{cursor:e-resize;}");
        assert_eq!(flip(".a { cursor: n-resize; }"), ".a{cursor:n-resize;}");
    }

    #[test]
    fn test_direction_only_on_root() {
        assert_eq!(flip("body { direction: ltr; }"), "body{direction:rtl;}");
        assert_eq!(flip(".a { direction: ltr; }"), ".a{direction:ltr;}");
        assert_eq!(
            flip("body, .a { direction: ltr; }"),
            "body,.a{direction:ltr;}"
        );
    }

    #[test]
    fn test_noflip_is_skipped() {
        assert_eq!(
            flip("@noflip { .a { float: left; } } .b { float: left; }"),
            ".a{float:left;}.b{float:right;}"
        );
    }
}
