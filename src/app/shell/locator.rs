use std::path::Path;

pub fn normalize_command_path(value: &str) -> String {
    let trimmed = value.trim();
    if let Some(inner) = trimmed
        .strip_prefix('"')
        .and_then(|candidate| candidate.strip_suffix('"'))
    {
        return inner.trim().to_string();
    }
    if let Some(inner) = trimmed
        .strip_prefix('\'')
        .and_then(|candidate| candidate.strip_suffix('\''))
    {
        return inner.trim().to_string();
    }
    trimmed.to_string()
}

/// Falls back to `default` (looked up on `PATH`) when nothing is configured.
pub fn resolve_program(configured: &str, default: &str) -> String {
    let normalized = normalize_command_path(configured);
    if normalized.is_empty() {
        default.to_string()
    } else {
        normalized
    }
}

/// Bare names are left to `PATH` lookup; explicit paths must exist.
pub fn validate_program(program: &str) -> Result<(), String> {
    if program.trim().is_empty() {
        return Err("Command is empty".to_string());
    }
    if !program.contains('/') && !program.contains('\\') {
        return Ok(());
    }
    let path = Path::new(program);
    if path.is_dir() {
        return Err(format!("{program} must point to an executable file"));
    }
    if !path.exists() {
        return Err(format!("{program} not found at the configured path"));
    }
    Ok(())
}

/// Quotes one argument for `su -c`, which hands its string to `sh`.
pub fn shell_quote(arg: &str) -> String {
    let is_plain = !arg.is_empty()
        && arg
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || "-_./:=".contains(ch));
    if is_plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

pub fn shell_join(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(shell_quote)
        .collect::<Vec<_>>()
        .join(" ")
}
