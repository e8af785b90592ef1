use std::fmt;

/// The user tried to generate with no usable prompt text. Recovered locally:
/// the presenter shows a warning and no request is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyPromptError;

impl fmt::Display for EmptyPromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prompt is empty after trimming whitespace")
    }
}

impl std::error::Error for EmptyPromptError {}

/// Builds the final prompt sent to the inference call.
///
/// The reference description, when non-blank, is prefixed before the base
/// prompt with a comma separator. The style suffix is appended verbatim; it
/// carries its own leading separator, or is empty for the "None" preset.
pub fn compose_prompt(
    base: &str,
    reference: Option<&str>,
    style_suffix: &str,
) -> Result<String, EmptyPromptError> {
    let base = base.trim();
    if base.is_empty() {
        return Err(EmptyPromptError);
    }

    let mut prompt = match reference.map(str::trim).filter(|text| !text.is_empty()) {
        Some(reference) => format!("{reference}, {base}"),
        None => base.to_string(),
    };
    prompt.push_str(style_suffix);
    Ok(prompt)
}
