use serde::Serialize;

use crate::presets::SizeOption;
use crate::prompt::EmptyPromptError;

/// One generation attempt's parameters, built fresh per attempt and never
/// mutated afterwards. `negative_prompt` is absent from the serialized form
/// when not set; the API must not see an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    pub width: u32,
    pub height: u32,
    pub model: String,
}

/// Maps the form selections onto a [`GenerationRequest`].
///
/// The composer already guarantees a non-empty prompt, but the builder
/// re-checks rather than trusting its caller.
pub fn build_request(
    final_prompt: &str,
    negative_raw: Option<&str>,
    size: &SizeOption,
    model: &str,
) -> Result<GenerationRequest, EmptyPromptError> {
    let prompt = final_prompt.trim();
    if prompt.is_empty() {
        return Err(EmptyPromptError);
    }

    let negative_prompt = negative_raw
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string);

    Ok(GenerationRequest {
        prompt: prompt.to_string(),
        negative_prompt,
        width: size.width,
        height: size.height,
        model: model.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::build_request;
    use crate::presets::SizeOption;
    use crate::prompt::EmptyPromptError;

    fn square() -> SizeOption {
        SizeOption {
            name: "Square (512x512)".to_string(),
            width: 512,
            height: 512,
        }
    }

    #[test]
    fn copies_dimensions_from_size_option() {
        let request = build_request("a boat", None, &square(), "test-model").unwrap();
        assert_eq!(request.width, 512);
        assert_eq!(request.height, 512);
        assert_eq!(request.model, "test-model");
    }

    #[test]
    fn blank_negative_prompt_is_dropped() {
        let request = build_request("a boat", Some("   "), &square(), "test-model").unwrap();
        assert_eq!(request.negative_prompt, None);

        let request = build_request("a boat", Some(""), &square(), "test-model").unwrap();
        assert_eq!(request.negative_prompt, None);
    }

    #[test]
    fn negative_prompt_is_trimmed_when_present() {
        let request =
            build_request("a boat", Some("  blurry, low quality "), &square(), "test-model")
                .unwrap();
        assert_eq!(request.negative_prompt.as_deref(), Some("blurry, low quality"));
    }

    #[test]
    fn absent_negative_prompt_is_not_serialized() {
        let request = build_request("a boat", None, &square(), "test-model").unwrap();
        let value = serde_json::to_value(&request).unwrap();
        let Value::Object(fields) = value else {
            panic!("request did not serialize to an object");
        };
        assert!(!fields.contains_key("negative_prompt"));

        let request = build_request("a boat", Some("blurry"), &square(), "test-model").unwrap();
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["negative_prompt"], Value::String("blurry".to_string()));
    }

    #[test]
    fn empty_final_prompt_is_rejected() {
        assert_eq!(
            build_request("  \n", Some("blurry"), &square(), "test-model"),
            Err(EmptyPromptError)
        );
    }
}
