//! Module registry: the static, ordered list of extraction modules run by
//! the module orchestrator (spec §4.D). Each entry names its own prompt and
//! schema files and output instance type, mirroring the Python source's
//! `module_registry.py` concept.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One entry in the module registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSpec {
    /// Stable identifier, e.g. `"study_identification"`.
    pub module_id: String,
    /// Human-readable name for logs and receipts.
    pub name: String,
    /// Path to the pass-1 (values) prompt template.
    pub pass1_prompt_path: PathBuf,
    /// Path to the pass-2 (provenance) prompt template.
    pub pass2_prompt_path: PathBuf,
    /// Path to the JSON Schema this module's output must satisfy.
    pub schema_path: PathBuf,
    /// The `instanceType` tag stamped onto this module's output, per the
    /// USDM-like typed-instance convention.
    pub instance_type: String,
    /// Whether this module runs on a fresh (non-resume) extraction.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl ModuleSpec {
    #[must_use]
    pub fn load_pass1_prompt(&self) -> std::io::Result<String> {
        std::fs::read_to_string(&self.pass1_prompt_path)
    }

    #[must_use]
    pub fn load_pass2_prompt(&self) -> std::io::Result<String> {
        std::fs::read_to_string(&self.pass2_prompt_path)
    }

    #[must_use]
    pub fn load_schema(&self) -> std::io::Result<String> {
        std::fs::read_to_string(&self.schema_path)
    }
}

/// Ordered module registry. Order is significant: spec §5 requires module
/// results to be written in declaration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleRegistry {
    pub modules: Vec<ModuleSpec>,
}

impl ModuleRegistry {
    #[must_use]
    pub fn enabled(&self) -> impl Iterator<Item = &ModuleSpec> {
        self.modules.iter().filter(|m| m.enabled)
    }

    #[must_use]
    pub fn get(&self, module_id: &str) -> Option<&ModuleSpec> {
        self.modules.iter().find(|m| m.module_id == module_id)
    }
}
