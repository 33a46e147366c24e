//! [`Group`] to Liberty text.

use super::*;
use std::fmt::Write;

#[inline]
fn is_nameless(kind: &str) -> bool {
    NAMELESS_GROUPS.contains(&kind)
}

fn encode_attribute(key: &str, value: &AttrValue, indent: usize, out: &mut Vec<String>) {
    let mut s = String::new();
    match value {
        _ if key == CALL_ATTRIBUTE => {
            write!(s, "{} ({});", key, value).unwrap();
        },
        AttrValue::List(items) => {
            write!(s, "{} (\"", key).unwrap();
            write_joined(&mut s, items).unwrap();
            s.push_str("\");");
        },
        AttrValue::Table(rows) => {
            out.push(format!("{} ( \\", key));
            for (i, row) in rows.iter().enumerate() {
                s.clear();
                s.extend(std::iter::repeat(' ').take(indent));
                s.push('"');
                write_joined(&mut s, row).unwrap();
                s.push('"');
                s.push_str(if i + 1 < rows.len() { ", \\" } else { " \\" });
                out.push(s.clone());
            }
            out.push(");".to_string());
            return;
        },
        AttrValue::Str(v) => {
            write!(s, "{} : \"{}\";", key, v).unwrap();
        },
        scalar => {
            write!(s, "{} : {};", key, scalar).unwrap();
        }
    }
    out.push(s);
}

/// `current` is the kind this group was reached through; it names
/// the headers of a name layer.
fn encode_lines(group: &Group, current: &str, indent: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut has_attributes = false;
    for (key, value) in &group.attributes {
        if key.as_str() == COMMENT_KEY { continue; }
        has_attributes = true;
        encode_attribute(key, value, indent, &mut out);
    }

    for (kind, instances) in &group.groups {
        for child in instances {
            let header = if !has_attributes {
                Some(format!("{} ({}) {{", current, kind))
            } else if is_nameless(kind) {
                Some(format!("{} () {{", kind))
            } else {
                None
            };
            let inner = encode_lines(child, kind, indent);
            match header {
                Some(header) => {
                    out.push(header);
                    out.extend(inner.into_iter().map(|line| {
                        let mut l = " ".repeat(indent);
                        l.push_str(&line);
                        l
                    }));
                    out.push("}".to_string());
                },
                None => out.extend(inner)
            }
        }
    }
    out
}

/// Encode a tree with the default indentation.
#[inline]
pub fn encode(root: &Group) -> String {
    encode_with_indent(root, DEFAULT_INDENT)
}

/// Encode every `library` entry of the root mapping.
/// Pure: the same tree always gives the same text.
pub fn encode_with_indent(root: &Group, indent: usize) -> String {
    let mut lines = Vec::new();
    for layer in root.groups("library") {
        lines.extend(encode_lines(layer, "library", indent));
    }
    lines.join("\n")
}
