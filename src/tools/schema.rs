/// Tool argument validation
///
/// Each tool's input schema is compiled once when the tool is registered and
/// every `tools/call` is checked against it before the tool runs. Nested
/// `properties`, `items`, `enum` and `additionalProperties` are all enforced.

use jsonschema::Validator;
use serde_json::{Map, Value};

/// Compiled input schema of one tool
pub struct ArgumentValidator {
    validator: Validator,
}

impl ArgumentValidator {
    /// Compile `schema`, describing why it is unusable if it is not
    pub fn new(schema: &Value) -> Result<Self, String> {
        let validator = Validator::new(schema).map_err(|e| e.to_string())?;
        Ok(Self { validator })
    }

    /// Check `arguments`, describing every mismatch
    pub fn validate(&self, arguments: &Map<String, Value>) -> Result<(), String> {
        let instance = Value::Object(arguments.clone());
        let problems: Vec<String> = self
            .validator
            .iter_errors(&instance)
            .map(|error| error.to_string())
            .collect();

        if problems.is_empty() {
            Ok(())
        } else {
            Err(format!("invalid arguments: {}", problems.join("; ")))
        }
    }
}

impl std::fmt::Debug for ArgumentValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgumentValidator").finish_non_exhaustive()
    }
}
