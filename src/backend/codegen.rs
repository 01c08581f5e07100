//! Code Generation trait - Backend abstraction
//!
//! Every text target (IR listing, C source) implements this.

use crate::middle::ir::IRModule;
use crate::utils::Result;

/// Code generation backend trait
pub trait CodeGen {
    /// Render a module in the backend's output format
    fn generate(&mut self, module: &IRModule) -> Result<String>;

    /// Get the backend name
    fn name(&self) -> &str;

    /// File extension for emitted output
    fn extension(&self) -> &str;
}
