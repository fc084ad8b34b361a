/// Tool registry
///
/// Maps tool names to implementations and keeps their descriptors in
/// registration order. Filled once at startup, then shared read-only behind
/// an `Arc` for the lifetime of the server.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::mcp::protocol::ToolDescriptor;
use crate::tools::schema::ArgumentValidator;
use crate::tools::Tool;

/// Errors that can occur while building the registry
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("Tool name cannot be empty")]
    EmptyName,

    #[error("Tool '{tool}' has an invalid input schema: {reason}")]
    InvalidSchema { tool: String, reason: String },
}

struct Entry {
    tool: Arc<dyn Tool>,
    arguments: ArgumentValidator,
}

/// Name-to-tool mapping consulted by `tools/list` and `tools/call`
#[derive(Default)]
pub struct ToolRegistry {
    descriptors: Vec<ToolDescriptor>,
    tools: HashMap<String, Entry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under the name in its descriptor
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<(), RegistryError> {
        let descriptor = tool.descriptor();
        if descriptor.name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.tools.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateTool(descriptor.name));
        }

        let arguments = ArgumentValidator::new(&descriptor.input_schema).map_err(|reason| {
            RegistryError::InvalidSchema {
                tool: descriptor.name.clone(),
                reason,
            }
        })?;

        debug!("Registered tool '{}'", descriptor.name);
        self.tools.insert(
            descriptor.name.clone(),
            Entry {
                tool: Arc::new(tool),
                arguments,
            },
        );
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Find the implementation for `name`
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|entry| Arc::clone(&entry.tool))
    }

    /// Compiled input schema for `name`
    pub fn arguments(&self, name: &str) -> Option<&ArgumentValidator> {
        self.tools.get(name).map(|entry| &entry.arguments)
    }

    /// All descriptors, in registration order
    pub fn list(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.descriptors.iter().map(|d| &d.name).collect::<Vec<_>>())
            .finish()
    }
}
