//! Sexagesimal and printf-style number formatting.
//!
//! INDI number elements carry a C-style `format` attribute. A format
//! containing the `m` marker requests sexagesimal display, where a decimal
//! value is rendered as colon-separated degrees (or hours), minutes, and
//! seconds. Textual input is accepted in either form.

/// Whether a number format string requests sexagesimal display.
pub fn is_sexagesimal(format: &str) -> bool {
    format.contains('m')
}

/// Render a decimal value as `D:M:S.ss`.
///
/// Minutes and seconds are the base-60 fractional expansion of the value;
/// seconds keep two decimal places.
///
/// # Example
///
/// ```
/// assert_eq!(indi_protocol::sexagesimal::to_sexagesimal(1.5), "1:30:0.00");
/// ```
pub fn to_sexagesimal(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let mut rest = value.abs();
    let whole = rest.floor();
    rest = (rest - whole) * 60.0;
    let minutes = rest.floor();
    let seconds = (rest - minutes) * 60.0;
    format!("{sign}{}:{}:{seconds:.2}", whole as i64, minutes as i64)
}

/// Parse a number from either decimal or sexagesimal text.
///
/// Accepts a plain float (`"1.5"`) or up to three colon-separated fields
/// (`"1:30"`, `"1:30:00"`). Each field after the first contributes at the
/// next base-60 position. Returns `None` for empty input, more than three
/// fields, or any unparseable field.
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let (sign, text) = match text.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, text),
    };
    let fields: Vec<&str> = text.split(':').collect();
    if fields.len() > 3 {
        return None;
    }
    let mut value = 0.0;
    let mut scale = 1.0;
    for field in fields {
        value += field.trim().parse::<f64>().ok()? * scale;
        scale /= 60.0;
    }
    Some(sign * value)
}

/// Render a value according to an INDI number format string.
///
/// Sexagesimal formats go through [`to_sexagesimal`]. Fixed-point formats
/// (`%6.2f` and friends) honor the requested precision; field width is a
/// display nicety the protocol does not depend on and is ignored. Anything
/// else falls back to the shortest faithful decimal rendering.
pub fn format_number(format: &str, value: f64) -> String {
    if is_sexagesimal(format) {
        return to_sexagesimal(value);
    }
    if let Some(body) = format.strip_prefix('%').and_then(|s| s.strip_suffix('f')) {
        let precision = body
            .split('.')
            .nth(1)
            .and_then(|p| p.parse::<usize>().ok())
            .unwrap_or(6);
        return format!("{value:.precision$}");
    }
    if format.starts_with('%') && format.ends_with('d') {
        return format!("{}", value.round() as i64);
    }
    value.to_string()
}
