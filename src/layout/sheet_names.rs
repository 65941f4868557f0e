use std::collections::HashSet;

use crate::config::PipelineConfig;
use crate::error::{Result, ToolError};

/// Highest numeric suffix tried before giving up on a name.
const MAX_DISAMBIGUATION_SUFFIX: u32 = 10_000;

/// Sheet naming rules of one workbook.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetNameRules {
    pub limit: usize,
    pub forbidden: Vec<char>,
    pub placeholder: String,
}

impl SheetNameRules {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            limit: config.sheet_name_limit,
            forbidden: config.forbidden_sheet_chars.clone(),
            placeholder: config.sheet_name_placeholder.clone(),
        }
    }
}

impl Default for SheetNameRules {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// Names already handed out within one workbook. Excel treats sheet names
/// case-insensitively, so lookups are case-folded.
#[derive(Debug, Default)]
pub struct SheetNameRegistry {
    rules: SheetNameRules,
    used: HashSet<String>,
}

impl SheetNameRegistry {
    pub fn new(rules: SheetNameRules) -> Self {
        Self {
            rules,
            used: HashSet::new(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.used.contains(&name.to_lowercase())
    }

    /// Sanitises `raw` and reserves a unique name for it. Collisions get a
    /// `_2`, `_3` ... suffix, with the base cut so the result stays within
    /// the length limit.
    pub fn assign(&mut self, raw: &str) -> Result<String> {
        let base = sanitize_sheet_name(raw, &self.rules);
        if self.reserve(&base) {
            return Ok(base);
        }

        for counter in 2..=MAX_DISAMBIGUATION_SUFFIX {
            let suffix = format!("_{counter}");
            if suffix.len() > self.rules.limit {
                break;
            }
            let keep = self.rules.limit - suffix.len();
            let prefix: String = base.chars().take(keep).collect();
            let candidate = format!("{prefix}{suffix}");
            if self.reserve(&candidate) {
                return Ok(candidate);
            }
        }

        Err(ToolError::SheetNameCollisionExhausted(base))
    }

    fn reserve(&mut self, name: &str) -> bool {
        self.used.insert(name.to_lowercase())
    }
}

/// Trims `raw`, replaces forbidden characters with `_`, strips apostrophes
/// from both ends (Excel rejects names that start or end with one),
/// substitutes the placeholder for an empty result and truncates to the
/// length limit.
pub fn sanitize_sheet_name(raw: &str, rules: &SheetNameRules) -> String {
    let replaced: String = raw
        .chars()
        .map(|ch| if rules.forbidden.contains(&ch) { '_' } else { ch })
        .collect();
    let trimmed = replaced.trim_matches(|ch: char| ch == '\'' || ch.is_whitespace());

    let sanitized = if trimmed.is_empty() {
        rules.placeholder.as_str()
    } else {
        trimmed
    };

    let truncated: String = sanitized.chars().take(rules.limit).collect();
    truncated.trim_end_matches('\'').to_string()
}
