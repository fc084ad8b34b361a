/// Tool returning a random quote
///
/// This module implements the getRandomQuote MCP tool.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::mcp::protocol::ToolDescriptor;
use crate::tools::{input_schema, text_result, Tool, ToolError};

pub const TOOL_NAME: &str = "getRandomQuote";

/// getRandomQuote takes no arguments
#[derive(Debug, Deserialize, JsonSchema)]
pub struct QuoteArgs {}

/// A quote and who said it
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub text: String,
    pub author: String,
}

impl Quote {
    pub fn new(text: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            author: author.into(),
        }
    }

    /// Text shown to the client
    pub fn render(&self) -> String {
        format!("\"{}\"\n\n- {}", self.text, self.author)
    }
}

const BUILTIN_QUOTES: &[(&str, &str)] = &[
    ("Well begun is half done.", "Aristotle"),
    ("A journey of a thousand miles begins with a single step.", "Lao Tzu"),
    ("Do not be afraid of falling; be afraid of not getting up again.", "Nelson Mandela"),
    ("Whatever you can do, or dream you can, begin it.", "Goethe"),
    ("Failure is the mother of success.", "Proverb"),
    ("After hardship comes relief.", "Proverb"),
    ("Seeing once is better than hearing a hundred times.", "Proverb"),
    ("Where there is a will, there is a way.", "Proverb"),
    ("Action is the foundational key to all success.", "Pablo Picasso"),
    ("There is no royal road to geometry.", "Euclid"),
    ("Small opportunities are often the beginning of great enterprises.", "Demosthenes"),
    ("If not now, when?", "Hillel the Elder"),
    ("Life is a tragedy when seen in close-up, but a comedy in long-shot.", "Charlie Chaplin"),
    ("They can because they think they can.", "Virgil"),
    ("If winter comes, can spring be far behind?", "Percy Bysshe Shelley"),
];

/// Picks one quote uniformly at random from its list
pub struct QuoteTool {
    quotes: Vec<Quote>,
}

impl QuoteTool {
    /// Tool backed by the built-in quote list
    pub fn new() -> Self {
        Self::with_quotes(
            BUILTIN_QUOTES
                .iter()
                .map(|(text, author)| Quote::new(*text, *author))
                .collect(),
        )
    }

    pub fn with_quotes(quotes: Vec<Quote>) -> Self {
        Self { quotes }
    }

    pub fn quotes(&self) -> &[Quote] {
        &self.quotes
    }

    fn pick(&self) -> Option<&Quote> {
        if self.quotes.is_empty() {
            return None;
        }
        self.quotes.get(fastrand::usize(..self.quotes.len()))
    }
}

impl Default for QuoteTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for QuoteTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: TOOL_NAME.to_string(),
            description: "Returns a random inspirational quote.".to_string(),
            input_schema: input_schema::<QuoteArgs>(),
        }
    }

    async fn invoke(&self, _arguments: Map<String, Value>) -> Result<Value, ToolError> {
        let quote = self.pick().ok_or_else(|| ToolError::new("No quotes are available"))?;
        text_result(quote.render())
    }
}
