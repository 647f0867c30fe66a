//! PDF Content Stream building.
//!
//! Appearance streams are the only content this crate generates, so the
//! builder covers graphics-state bracketing and text blocks.

mod operator;
mod text;

pub use operator::Operator;
pub use text::TextBuilder;

/// Builder for PDF content streams.
///
/// Content streams contain operators that describe the appearance of a page
/// or form XObject.
#[derive(Debug, Default, Clone)]
pub struct ContentBuilder {
    operators: Vec<Operator>,
    state_depth: i32,
}

impl ContentBuilder {
    /// Creates a new content builder.
    pub fn new() -> Self {
        Self {
            operators: Vec::new(),
            state_depth: 0,
        }
    }

    // Graphics state

    /// Saves the current graphics state (q operator).
    pub fn save_state(mut self) -> Self {
        self.operators.push(Operator::SaveState);
        self.state_depth += 1;
        self
    }

    /// Restores the previous graphics state (Q operator).
    pub fn restore_state(mut self) -> Self {
        self.operators.push(Operator::RestoreState);
        self.state_depth -= 1;
        self
    }

    // Text

    /// Begins a text block with the given builder configuration.
    ///
    /// The text builder's operators are added to the content stream.
    pub fn text_block(mut self, builder: TextBuilder) -> Self {
        self.operators.extend(builder.end());
        self
    }

    /// Creates a simple text block.
    ///
    /// Convenience method for adding text at a position.
    pub fn text(self, font: &str, size: f64, x: f64, y: f64, text: &str) -> Self {
        let builder = TextBuilder::new().font(font, size).move_to(x, y).show(text);
        self.text_block(builder)
    }

    // Raw operator

    /// Adds a raw operator string.
    pub fn raw(mut self, op: impl Into<String>) -> Self {
        self.operators.push(Operator::Raw(op.into()));
        self
    }

    /// Builds the content stream as a string.
    pub fn build_string(&self) -> String {
        self.operators
            .iter()
            .map(|op| op.to_pdf_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Builds the content stream as bytes.
    pub fn build_bytes(&self) -> Vec<u8> {
        self.build_string().into_bytes()
    }

    /// Returns the current state depth (for debugging).
    pub fn state_depth(&self) -> i32 {
        self.state_depth
    }

    /// Returns the operators.
    pub fn operators(&self) -> &[Operator] {
        &self.operators
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_content() {
        let content = ContentBuilder::new()
            .text("F1", 12.0, 72.0, 750.0, "Hello, World!")
            .build_string();

        assert!(content.contains("BT"));
        assert!(content.contains("/F1 12 Tf"));
        assert!(content.contains("(Hello, World!) Tj"));
        assert!(content.contains("ET"));
    }

    #[test]
    fn test_state_depth_tracking() {
        let builder = ContentBuilder::new().save_state().save_state();
        assert_eq!(builder.state_depth(), 2);

        let builder = builder.restore_state();
        assert_eq!(builder.state_depth(), 1);
    }

    #[test]
    fn test_bracketed_text_block() {
        let content = ContentBuilder::new()
            .save_state()
            .text_block(
                TextBuilder::new()
                    .font("F1", 10.0)
                    .leading(12.0)
                    .move_to(2.0, 48.0)
                    .show("one")
                    .next_line_show("two"),
            )
            .restore_state()
            .build_string();

        assert!(content.starts_with("q\nBT"));
        assert!(content.ends_with("ET\nQ"));
        assert!(content.contains("12 TL"));
        assert!(content.contains("(one) Tj"));
        assert!(content.contains("(two) '"));
    }

    #[test]
    fn test_raw_operator_passthrough() {
        let content = ContentBuilder::new().raw("0.5 g").build_string();
        assert_eq!(content, "0.5 g");
    }
}
