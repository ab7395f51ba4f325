//! Evaluation configuration: the execution bindings a caller supplies.
//!
//! The sandbox sees exactly three caller-controlled inputs:
//! - a modules root directory that scopes `require`,
//! - an optional context-augmentation hook invoked with the sandbox
//!   environment before execution,
//! - an optional page-level state value shared across snippets of one page.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use mlua::{Lua, Table};

/// Hook invoked with the sandbox's global bindings prior to execution.
pub type ContextHook = Arc<dyn Fn(&Lua, &Table) -> mlua::Result<()> + Send + Sync>;

/// Caller-owned page-level state, visible to snippets as the `page` global.
///
/// The engine materialises it into the sandbox before a run and writes it
/// back afterwards; lifecycle and reset are the caller's responsibility.
pub type PageState = Arc<Mutex<serde_json::Value>>;

/// Execution bindings for [`crate::Snippet::annotate`].
#[derive(Clone, Default)]
pub struct EvalConfig {
    pub modules_root: Option<PathBuf>,
    pub augment: Option<ContextHook>,
    pub page: Option<PageState>,
}

impl EvalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope `require` to `root`. Without this, `require` is an error.
    pub fn with_modules_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.modules_root = Some(root.into());
        self
    }

    /// Install a hook that injects caller-specific globals into the sandbox.
    pub fn with_augment<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Lua, &Table) -> mlua::Result<()> + Send + Sync + 'static,
    {
        self.augment = Some(Arc::new(hook));
        self
    }

    /// Attach page-level state, exposed to snippets as `page`.
    pub fn with_page(mut self, page: PageState) -> Self {
        self.page = Some(page);
        self
    }

    /// A fresh, empty page state.
    pub fn fresh_page() -> PageState {
        Arc::new(Mutex::new(serde_json::Value::Object(Default::default())))
    }
}

impl fmt::Debug for EvalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalConfig")
            .field("modules_root", &self.modules_root)
            .field("augment", &self.augment.as_ref().map(|_| "<hook>"))
            .field("page", &self.page.is_some())
            .finish()
    }
}
