//! Native error-message resolution.
//!
//! Codes are looked up through an ordered chain of named message tables; the
//! first table that knows the code wins. When no table does, the message is
//! [`FALLBACK_MESSAGE`].

use std::collections::HashMap;

use lazy_static::lazy_static;

#[cfg(windows)]
mod win32;

#[cfg(windows)]
pub use win32::{ModuleTable, SystemTable};

/// Message used when no table resolves a code.
pub const FALLBACK_MESSAGE: &str = "unspecified error";

/// A named source of human-readable messages for native status codes.
pub trait MessageTable: Send + Sync {
    fn name(&self) -> &str;

    /// Message for `code`, or `None` if this table does not know it.
    fn lookup(&self, code: i32) -> Option<String>;
}

/// In-memory table.
#[derive(Debug, Clone, Default)]
pub struct StaticTable {
    name: String,
    messages: HashMap<i32, String>,
}

impl StaticTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messages: HashMap::new(),
        }
    }

    pub fn with(mut self, code: i32, message: impl Into<String>) -> Self {
        self.messages.insert(code, message.into());
        self
    }
}

impl MessageTable for StaticTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, code: i32) -> Option<String> {
        self.messages.get(&code).cloned()
    }
}

/// Prioritized fallback chain over message tables.
#[derive(Default)]
pub struct MessageChain {
    tables: Vec<Box<dyn MessageTable>>,
}

impl MessageChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a table; earlier tables take precedence.
    pub fn with_table(mut self, table: impl MessageTable + 'static) -> Self {
        self.tables.push(Box::new(table));
        self
    }

    /// The host platform's tables: the system table, then the ntdll table.
    #[cfg(windows)]
    pub fn platform() -> Self {
        let chain = Self::new().with_table(SystemTable);
        match ModuleTable::ntdll() {
            Some(ntdll) => chain.with_table(ntdll),
            None => {
                log::warn!("[INTEROP] ntdll message table unavailable");
                chain
            }
        }
    }

    #[cfg(not(windows))]
    pub fn platform() -> Self {
        Self::new()
    }

    /// Names of the tables in lookup order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name()).collect()
    }

    pub fn lookup(&self, code: i32) -> Option<String> {
        self.tables.iter().find_map(|table| {
            table
                .lookup(code)
                .map(|msg| msg.trim().to_string())
                .filter(|msg| !msg.is_empty())
        })
    }

    /// Resolve `code`, falling back to [`FALLBACK_MESSAGE`].
    pub fn resolve(&self, code: i32) -> String {
        self.lookup(code)
            .unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
    }
}

impl std::fmt::Debug for MessageChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageChain")
            .field("tables", &self.table_names())
            .finish()
    }
}

lazy_static! {
    static ref PLATFORM_CHAIN: MessageChain = MessageChain::platform();
}

/// Resolve `code` against the platform message tables.
pub fn resolve(code: i32) -> String {
    PLATFORM_CHAIN.resolve(code)
}
