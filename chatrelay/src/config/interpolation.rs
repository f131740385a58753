// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

use super::error::ConfigError;

/// Replace `${VAR_NAME}` references with environment values.
///
/// An unterminated `${` or an empty name is kept literally. A well-formed
/// reference to an unset variable is an error.
pub fn resolve_variables(input: &str) -> Result<String, ConfigError> {
    resolve_with(input, |name| std::env::var(name).ok())
}

fn resolve_with<F>(input: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(0) | None => {
                // Not a reference; keep the marker and move on.
                result.push_str("${");
                rest = after;
            }
            Some(end) => {
                let name = &after[..end];
                let value = lookup(name).ok_or_else(|| ConfigError::UndefinedVariable {
                    name: name.to_string(),
                })?;
                result.push_str(&value);
                rest = &after[end + 1..];
            }
        }
    }
    result.push_str(rest);

    Ok(result)
}
