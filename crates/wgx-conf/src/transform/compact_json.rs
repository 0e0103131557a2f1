//! Compact pretty-printing for JSON
//!
//! Like `serde_json::to_string_pretty`, except that any object or array
//! whose one-line form fits in the remaining width stays on one line
//! (with a space after each `:` and `,`).

use serde_json::Value;

/// Render `value` with `indent` spaces per level, wrapping only what exceeds `max_width`
pub(crate) fn to_string_compact(value: &Value, indent: usize, max_width: usize) -> String {
    let unit = " ".repeat(indent);
    render(value, "", 0, &unit, max_width)
}

fn render(value: &Value, current: &str, reserved: usize, unit: &str, max_width: usize) -> String {
    let flat = value.to_string();
    let available = max_width.saturating_sub(current.chars().count() + reserved);

    if flat.chars().count() <= available {
        let spaced = space_separators(&flat);
        if spaced.chars().count() <= available {
            return spaced;
        }
    }

    let next = format!("{}{}", current, unit);
    let (open, close, items) = match value {
        Value::Array(items) if !items.is_empty() => {
            let last = items.len() - 1;
            let rendered = items
                .iter()
                .enumerate()
                .map(|(i, item)| render(item, &next, usize::from(i != last), unit, max_width))
                .collect::<Vec<_>>();
            ('[', ']', rendered)
        }
        Value::Object(map) if !map.is_empty() => {
            let last = map.len() - 1;
            let rendered = map
                .iter()
                .enumerate()
                .map(|(i, (key, item))| {
                    let key = format!("{}: ", Value::String(key.clone()));
                    let reserve = key.chars().count() + usize::from(i != last);
                    format!("{}{}", key, render(item, &next, reserve, unit, max_width))
                })
                .collect::<Vec<_>>();
            ('{', '}', rendered)
        }
        _ => return flat,
    };

    format!(
        "{}\n{}{}\n{}{}",
        open,
        next,
        items.join(&format!(",\n{}", next)),
        current,
        close
    )
}

/// Add a space after every `:` and `,` outside of string literals
fn space_separators(flat: &str) -> String {
    let mut out = String::with_capacity(flat.len() + flat.len() / 4);
    let mut in_string = false;
    let mut escaped = false;

    for c in flat.chars() {
        out.push(c);
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
        } else {
            match c {
                '"' => in_string = true,
                ':' | ',' => out.push(' '),
                _ => {}
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_short_value_stays_inline() {
        let value = json!({"a": 1, "b": [1, 2], "c": "x:y,z"});
        assert_eq!(
            to_string_compact(&value, 2, 80),
            r#"{"a": 1, "b": [1, 2], "c": "x:y,z"}"#
        );
    }

    #[test]
    fn test_long_value_wraps_one_level() {
        let value = json!({
            "type": "wireguard",
            "tag": "wireguard-out",
            "local_address": ["10.0.0.1/24", "fd00::1/64"],
        });
        let expected = r#"{
  "type": "wireguard",
  "tag": "wireguard-out",
  "local_address": ["10.0.0.1/24", "fd00::1/64"]
}"#;
        assert_eq!(to_string_compact(&value, 2, 80), expected);
    }

    #[test]
    fn test_nested_wrapping() {
        let long = "x".repeat(70);
        let value = json!({"outer": [{"key": long}]});
        let expected = format!(
            "{{\n  \"outer\": [\n    {{\n      \"key\": \"{}\"\n    }}\n  ]\n}}",
            long
        );
        assert_eq!(to_string_compact(&value, 2, 80), expected);
    }

    #[test]
    fn test_empty_containers() {
        assert_eq!(to_string_compact(&json!({}), 2, 80), "{}");
        assert_eq!(to_string_compact(&json!([]), 2, 0), "[]");
    }

    #[test]
    fn test_escaped_quotes_in_strings() {
        assert_eq!(space_separators(r#"["a\",b",1]"#), r#"["a\",b", 1]"#);
    }

    #[test]
    fn test_output_is_valid_json() {
        let value = json!({
            "peers": [{"server": "vpn.example.com", "server_port": 51820,
                       "allowed_ips": ["0.0.0.0/0", "::/0"], "reserved": [1, 2, "abc"]}],
        });
        let out = to_string_compact(&value, 2, 40);
        let back: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(back, value);
    }
}
