use super::types::HiveConfig;
use crate::errors::HiveError;
use crate::infrastructure::template;
use regex::Regex;

fn validate_templates(key: &str, scripts: &[String]) -> Result<(), HiveError> {
    for (index, script) in scripts.iter().enumerate() {
        template::validate(script).map_err(|e| HiveError::config(&format!("{key}[{index}]"), e))?;
    }
    Ok(())
}

impl HiveConfig {
    /// Compile every rule pattern and parse every command template.
    pub fn validate(&self) -> Result<(), HiveError> {
        if self.git_path.trim().is_empty() {
            return Err(HiveError::config("git_path", "must not be empty"));
        }

        validate_templates("commands.recycle", &self.commands.recycle)?;
        validate_templates("commands.spawn", &self.commands.spawn)?;
        validate_templates("commands.batch_spawn", &self.commands.batch_spawn)?;

        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.pattern.is_empty() {
                Regex::new(&rule.pattern)
                    .map_err(|e| HiveError::config(&format!("rules[{index}].pattern"), e))?;
            }
            validate_templates(&format!("rules[{index}].commands"), &rule.commands)?;

            for (copy_index, pattern) in rule.copy.iter().enumerate() {
                if pattern.trim().is_empty() {
                    return Err(HiveError::config(
                        &format!("rules[{index}].copy[{copy_index}]"),
                        "must not be empty",
                    ));
                }
            }
        }

        Ok(())
    }
}
