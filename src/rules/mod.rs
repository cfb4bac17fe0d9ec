//! 规则注册中心 (Rule Registry)
//!
//! Descriptive metadata for the built-in detectors: category, rationale and
//! fix suggestion. Matching logic lives in `scanner::rule_handlers`; this
//! registry only documents it (used by the `rules` command).

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

use crate::scanner::Severity;

pub mod definitions;

/// 规则类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    /// eval/exec, shell commands
    Injection,
    /// pickle / yaml object construction
    Deserialization,
    /// hardcoded credentials, weak randomness
    Secrets,
    /// weak hashes
    Crypto,
    /// TLS / SSH trust
    Transport,
    /// debug flags left on
    Configuration,
    /// temp files
    FileSystem,
    /// token verification
    Authentication,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Injection => "Injection",
            Category::Deserialization => "Deserialization",
            Category::Secrets => "Secrets",
            Category::Crypto => "Crypto",
            Category::Transport => "Transport",
            Category::Configuration => "Configuration",
            Category::FileSystem => "FileSystem",
            Category::Authentication => "Authentication",
        }
    }
}

/// 规则定义
#[derive(Debug, Clone, Serialize)]
pub struct RuleDefinition {
    /// 规则唯一标识符
    pub id: &'static str,
    pub category: Category,
    pub severity: Severity,
    /// 简短描述
    pub description: &'static str,
    /// 详细说明 (为什么是问题)
    pub rationale: &'static str,
    /// 修复建议
    pub fix_suggestion: &'static str,
}

/// 规则注册表 (keeps catalogue order)
pub struct RuleRegistry {
    rules: Vec<RuleDefinition>,
    index: HashMap<&'static str, usize>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        let rules = definitions::all_rules();
        let index = rules.iter().enumerate().map(|(i, r)| (r.id, i)).collect();
        Self { rules, index }
    }

    pub fn get(&self, id: &str) -> Option<&RuleDefinition> {
        self.index.get(id).map(|&i| &self.rules[i])
    }

    /// All rules in catalogue order
    pub fn all(&self) -> impl Iterator<Item = &RuleDefinition> {
        self.rules.iter()
    }

    pub fn by_category(&self, category: Category) -> Vec<&RuleDefinition> {
        self.rules.iter().filter(|r| r.category == category).collect()
    }

    pub fn stats(&self) -> RegistryStats {
        let count = |sev: Severity| self.rules.iter().filter(|r| r.severity == sev).count();
        RegistryStats {
            total: self.rules.len(),
            high_count: count(Severity::High),
            medium_count: count(Severity::Medium),
            low_count: count(Severity::Low),
        }
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// 注册表统计信息
#[derive(Debug, Serialize)]
pub struct RegistryStats {
    pub total: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
}

/// 全局规则注册表 (延迟初始化)
pub static REGISTRY: Lazy<RuleRegistry> = Lazy::new(RuleRegistry::new);

pub fn registry() -> &'static RuleRegistry {
    &REGISTRY
}
