//! Finds the report script inside a page.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ExtractionError;

fn script_regex() -> Result<&'static Regex, regex::Error> {
    static RE: OnceLock<Regex> = OnceLock::new();
    if let Some(re) = RE.get() {
        return Ok(re);
    }
    let re = Regex::new(r"(?is)<script\b[^>]*>(.*?)</script\s*>")?;
    Ok(RE.get_or_init(|| re))
}

/// Marker that identifies the script declaring `name`.
pub fn declaration(name: &str) -> String {
    format!("var {} = new Array();", name)
}

/// Returns the body of the first `<script>` element, in document order, that
/// declares `var <name> = new Array();`.
pub fn find_script<'a>(html: &'a str, name: &str) -> Result<&'a str, ExtractionError> {
    let re = script_regex().map_err(|e| ExtractionError::Syntax(format!("regex compile error: {}", e)))?;
    let marker = declaration(name);

    re.captures_iter(html)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str())
        .find(|body| body.contains(&marker))
        .ok_or_else(|| ExtractionError::ScriptNotFound {
            name: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_the_script_with_the_marker() {
        let html = r#"<html><head>
<script src="/js/util.js"></script>
<script type="text/javascript">function formatMiles(n, s) { return n; }</script>
</head><body>
<SCRIPT language="JavaScript">var xml_values = new Array();
xml_values['a'] = '1';</SCRIPT>
</body></html>"#;
        let body = find_script(html, "xml_values").unwrap();
        assert!(body.starts_with("var xml_values = new Array();"));
        assert!(body.contains("xml_values['a'] = '1';"));
    }

    #[test]
    fn first_match_wins() {
        let html = "<script>var v = new Array(); v['n'] = 'first';</script>\
                    <script>var v = new Array(); v['n'] = 'second';</script>";
        assert!(find_script(html, "v").unwrap().contains("first"));
    }

    #[test]
    fn name_must_match_exactly() {
        let html = "<script>var xml_values_old = new Array();</script>";
        assert!(matches!(
            find_script(html, "xml_values"),
            Err(ExtractionError::ScriptNotFound { name }) if name == "xml_values"
        ));
    }

    #[test]
    fn missing_script_is_an_error() {
        let err = find_script("<html><body>Sin datos</body></html>", "arr_informe_mensual")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "script not found for variable `arr_informe_mensual`"
        );
    }
}
