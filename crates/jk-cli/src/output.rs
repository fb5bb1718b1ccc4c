//! Output sink: JSON or YAML when requested, otherwise the command's
//! human renderer.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn from_flags(json: bool, yaml: bool) -> Self {
        if json {
            OutputFormat::Json
        } else if yaml {
            OutputFormat::Yaml
        } else {
            OutputFormat::Human
        }
    }

    pub fn is_structured(&self) -> bool {
        !matches!(self, OutputFormat::Human)
    }
}

/// Serializes `value` as pretty JSON or YAML, or invokes the human
/// renderer for terminal output.
pub fn print_output<T, F>(format: OutputFormat, value: &T, human: F) -> anyhow::Result<()>
where
    T: Serialize,
    F: FnOnce() -> anyhow::Result<()>,
{
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
            Ok(())
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(value)?);
            Ok(())
        }
        OutputFormat::Human => human(),
    }
}

/// Compact human form of a millisecond duration: `45s`, `1h2m3s`, `0s`.
pub fn duration_string(ms: i64) -> String {
    if ms <= 0 {
        return "0s".to_string();
    }
    if ms < 1000 {
        return format!("{ms}ms");
    }

    let mut seconds = ms / 1000;
    let hours = seconds / 3600;
    seconds %= 3600;
    let minutes = seconds / 60;
    seconds %= 60;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if seconds > 0 || out.is_empty() {
        out.push_str(&format!("{seconds}s"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Yaml);
    }

    #[test]
    fn test_duration_string() {
        assert_eq!(duration_string(0), "0s");
        assert_eq!(duration_string(-10), "0s");
        assert_eq!(duration_string(450), "450ms");
        assert_eq!(duration_string(45_000), "45s");
        assert_eq!(duration_string(3_723_000), "1h2m3s");
        assert_eq!(duration_string(120_000), "2m");
    }
}
