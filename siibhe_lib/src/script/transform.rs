//! Text rewrites that turn a report script into something the evaluator accepts.

use std::sync::OnceLock;

use regex::Regex;

use super::locate::declaration;

fn format_miles_regex() -> Result<&'static Regex, regex::Error> {
    static RE: OnceLock<Regex> = OnceLock::new();
    if let Some(re) = RE.get() {
        return Ok(re);
    }
    let re = Regex::new(r"formatMiles\(([^,]+),[^)]+\)")?;
    Ok(RE.get_or_init(|| re))
}

/// Rewrites a located script so that evaluating it yields the JSON text of
/// the object named `name`.
///
/// 1. `var <name> = new Array();` becomes `var <name> = {};` so that string
///    keys survive serialization.
/// 2. `formatMiles(<expr>, <sep>)` becomes `<expr>`.
/// 3. `JSON.stringify(<name>);` is appended as the final expression.
///
/// No parsing happens here. Unexpected shapes pass through untouched and
/// fail in the evaluator.
pub fn transform(script: &str, name: &str) -> String {
    let rewritten = script.replace(&declaration(name), &format!("var {} = {{}};", name));
    let stripped = strip_format_miles(&rewritten);
    format!("{}\nJSON.stringify({});", stripped, name)
}

/// Drops the thousands-separator display helper, keeping its first argument.
pub fn strip_format_miles(script: &str) -> String {
    match format_miles_regex() {
        Ok(re) => re.replace_all(script, "$1").into_owned(),
        Err(e) => {
            tracing::error!("regex compile error: {}", e);
            script.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutralizes_array_declaration() {
        let out = transform("var xml_values = new Array();\nxml_values['a'] = '1';", "xml_values");
        assert!(out.starts_with("var xml_values = {};"));
        assert!(out.ends_with("\nJSON.stringify(xml_values);"));
        assert!(!out.contains("new Array()"));
    }

    #[test]
    fn leaves_other_arrays_alone() {
        let out = transform("var a = new Array();\nvar b = new Array();", "b");
        assert!(out.contains("var a = new Array();"));
        assert!(out.contains("var b = {};"));
    }

    #[test]
    fn strips_format_miles() {
        assert_eq!(
            strip_format_miles("x['t'] = formatMiles('1234567', '.');"),
            "x['t'] = '1234567';"
        );
        assert_eq!(
            strip_format_miles("a = formatMiles(n1,'.') + formatMiles(n2, \".\");"),
            "a = n1 + n2;"
        );
    }

    #[test]
    fn rewrite_is_purely_textual() {
        // `[^,]+` stops at the first comma, so a call argument is cut short
        // and the broken call is left for the evaluator to reject.
        assert_eq!(
            strip_format_miles("x = formatMiles(f(a, b), '.');"),
            "x = f(a, '.');"
        );
    }
}
