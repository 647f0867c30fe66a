//! PDF Content Stream Operators.

/// Content stream operators used by appearance streams.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    // Graphics state operators
    /// q - Save graphics state
    SaveState,
    /// Q - Restore graphics state
    RestoreState,

    // Text object operators
    /// BT - Begin text object
    BeginText,
    /// ET - End text object
    EndText,

    // Text state operators
    /// TL - Set leading
    SetLeading(f64),
    /// Tf - Set font and size
    SetFont(String, f64),

    // Text positioning operators
    /// Td - Move text position
    MoveText(f64, f64),
    /// Tm - Set text matrix
    SetTextMatrix(f64, f64, f64, f64, f64, f64),
    /// T* - Move to start of next line
    NextLine,

    // Text showing operators
    /// Tj - Show text string
    ShowText(String),
    /// ' - Move to next line and show text
    NextLineShowText(String),

    // Raw operator (for custom operators)
    Raw(String),
}

impl Operator {
    /// Converts the operator to its PDF string representation.
    pub fn to_pdf_string(&self) -> String {
        match self {
            // Graphics state
            Operator::SaveState => "q".into(),
            Operator::RestoreState => "Q".into(),

            // Text object
            Operator::BeginText => "BT".into(),
            Operator::EndText => "ET".into(),

            // Text state
            Operator::SetLeading(l) => format!("{} TL", fmt(l)),
            Operator::SetFont(name, size) => format!("/{} {} Tf", name, fmt(size)),

            // Text positioning
            Operator::MoveText(x, y) => format!("{} {} Td", fmt(x), fmt(y)),
            Operator::SetTextMatrix(a, b, c, d, e, f) => {
                format!(
                    "{} {} {} {} {} {} Tm",
                    fmt(a),
                    fmt(b),
                    fmt(c),
                    fmt(d),
                    fmt(e),
                    fmt(f)
                )
            }
            Operator::NextLine => "T*".into(),

            // Text showing
            Operator::ShowText(s) => format!("({}) Tj", escape_string(s)),
            Operator::NextLineShowText(s) => format!("({}) '", escape_string(s)),

            // Raw
            Operator::Raw(s) => s.clone(),
        }
    }
}

/// Formats a float for PDF output.
fn fmt(v: &f64) -> String {
    if *v == 0.0 {
        "0".into()
    } else if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        (*v as i64).to_string()
    } else {
        let s = format!("{:.4}", v);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Escapes special characters in a PDF string.
fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '(' => result.push_str("\\("),
            ')' => result.push_str("\\)"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_restore() {
        assert_eq!(Operator::SaveState.to_pdf_string(), "q");
        assert_eq!(Operator::RestoreState.to_pdf_string(), "Q");
    }

    #[test]
    fn test_text_operators() {
        assert_eq!(Operator::BeginText.to_pdf_string(), "BT");
        assert_eq!(Operator::EndText.to_pdf_string(), "ET");
        assert_eq!(
            Operator::SetFont("F1".to_string(), 12.0).to_pdf_string(),
            "/F1 12 Tf"
        );
        assert_eq!(
            Operator::ShowText("Hello".to_string()).to_pdf_string(),
            "(Hello) Tj"
        );
        assert_eq!(
            Operator::NextLineShowText("Next".to_string()).to_pdf_string(),
            "(Next) '"
        );
    }

    #[test]
    fn test_positioning_operators() {
        assert_eq!(Operator::MoveText(2.0, 48.5).to_pdf_string(), "2 48.5 Td");
        assert_eq!(Operator::SetLeading(12.0).to_pdf_string(), "12 TL");
        assert_eq!(Operator::NextLine.to_pdf_string(), "T*");
        assert_eq!(
            Operator::SetTextMatrix(1.0, 0.0, 0.0, 1.0, 72.0, 750.0).to_pdf_string(),
            "1 0 0 1 72 750 Tm"
        );
    }

    #[test]
    fn test_fmt_trims_decimals() {
        assert_eq!(fmt(&10.0), "10");
        assert_eq!(fmt(&9.6), "9.6");
        assert_eq!(fmt(&0.0), "0");
        assert_eq!(fmt(&2.5000), "2.5");
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("Hello"), "Hello");
        assert_eq!(escape_string("Hello (World)"), "Hello \\(World\\)");
        assert_eq!(escape_string("Line1\nLine2"), "Line1\\nLine2");
    }
}
