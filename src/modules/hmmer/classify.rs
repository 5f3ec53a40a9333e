//! Picking the most useful line out of failed tool output

/// Returned when the output holds nothing but blank lines
pub const UNKNOWN_ERROR: &str = "unknown error";

const ERROR_PREFIX: &str = "Error:";

/// Most descriptive line of a failed run's output.
///
/// HMMER prints `Error: ...` and often continues the message on the next
/// line, so that line is joined on. Without an `Error:` line the first
/// non-blank line is used, trimmed.
pub fn classify<S: AsRef<str>>(lines: &[S]) -> String {
    for (i, line) in lines.iter().enumerate() {
        let line = line.as_ref();
        if line.starts_with(ERROR_PREFIX) {
            return match lines.get(i + 1) {
                Some(next) => format!("{} {}", line.trim(), next.as_ref().trim_end()),
                None => line.trim().to_string(),
            };
        }
    }

    lines
        .iter()
        .map(|line| line.as_ref().trim())
        .find(|line| !line.is_empty())
        .unwrap_or(UNKNOWN_ERROR)
        .to_string()
}

/// [`classify`] over raw process output
pub fn classify_output(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    classify(&lines)
}
