//! Interactive prompts for the auth flow.

use std::io::Write;

/// Prompts on stdout and reads one trimmed line; an empty answer falls
/// back to the default.
pub fn prompt(label: &str, default: &str) -> std::io::Result<String> {
    let mut stdout = std::io::stdout();
    if default.is_empty() {
        write!(stdout, "{label}: ")?;
    } else {
        write!(stdout, "{label} [{default}]: ")?;
    }
    stdout.flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let trimmed = input.trim();
    if trimmed.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

/// Prompts for a sensitive value without echoing input.
pub fn prompt_secret(label: &str) -> std::io::Result<String> {
    let value = rpassword::prompt_password(format!("{label}: "))?;
    Ok(value.trim().to_string())
}
