use serde::{Deserialize, Serialize};

use super::GenerationConfig;
use crate::core::error::{GenerationError, Provider};
use crate::core::state::ImageRef;

// The catalog keeps the imagen-3.0 id but the serving endpoint moved to 4.0.
const IMAGEN_SERVING_MODEL: &str = "imagen-4.0-generate-001";

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<RequestGenerationConfig>,
}

#[derive(Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Serialize)]
struct RequestGenerationConfig {
    #[serde(rename = "imageConfig")]
    image_config: RequestImageConfig,
}

#[derive(Serialize)]
struct RequestImageConfig {
    #[serde(rename = "aspectRatio")]
    aspect_ratio: String,
    #[serde(rename = "imageSize")]
    image_size: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<ResponseCandidate>>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(rename = "inlineData")]
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: Option<String>,
    data: String,
}

#[derive(Deserialize)]
struct ApiError {
    code: Option<u16>,
    message: String,
}

fn gemini_request(prompt: &str, config: &GenerationConfig) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![RequestContent {
            parts: vec![RequestPart {
                text: prompt.to_string(),
            }],
        }],
        generation_config: config.image_size.as_ref().map(|size| RequestGenerationConfig {
            image_config: RequestImageConfig {
                aspect_ratio: config.aspect_ratio.clone(),
                image_size: size.clone(),
            },
        }),
    }
}

fn first_inline_image(response: &GenerateContentResponse) -> Option<ImageRef> {
    let candidates = response.candidates.as_ref()?;
    let content = candidates.first()?.content.as_ref()?;
    for part in &content.parts {
        if let Some(inline) = &part.inline_data {
            return Some(ImageRef::Inline {
                mime: inline
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| "image/png".to_string()),
                data: inline.data.clone(),
            });
        }
    }
    None
}

fn transport_error(err: reqwest::Error) -> GenerationError {
    GenerationError::provider(
        Provider::Google,
        err.status().map(|s| s.as_u16()),
        err.to_string(),
    )
}

pub(crate) async fn generate_gemini(
    client: &reqwest::Client,
    prompt: &str,
    config: &GenerationConfig,
) -> Result<ImageRef, GenerationError> {
    let url = format!(
        "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
        config.model, config.api_key
    );

    let resp = client
        .post(&url)
        .json(&gemini_request(prompt, config))
        .send()
        .await
        .map_err(transport_error)?;

    let status = resp.status();
    let response_text = resp.text().await.map_err(transport_error)?;

    if !status.is_success() {
        return Err(GenerationError::provider(
            Provider::Google,
            Some(status.as_u16()),
            response_text,
        ));
    }

    // Keep the raw body in the message so parse failures stay debuggable.
    let result: GenerateContentResponse = serde_json::from_str(&response_text).map_err(|e| {
        GenerationError::provider(
            Provider::Google,
            None,
            format!("unexpected response: {}. Body: {}", e, response_text),
        )
    })?;

    if let Some(err) = result.error {
        return Err(GenerationError::provider(
            Provider::Google,
            err.code,
            err.message,
        ));
    }

    first_inline_image(&result).ok_or(GenerationError::NoImageReturned)
}

#[derive(Serialize)]
struct PredictRequest {
    instances: Vec<PredictInstance>,
    parameters: PredictParameters,
}

#[derive(Serialize)]
struct PredictInstance {
    prompt: String,
}

#[derive(Serialize)]
struct PredictParameters {
    #[serde(rename = "sampleCount")]
    sample_count: u32,
    #[serde(rename = "aspectRatio")]
    aspect_ratio: String,
    #[serde(rename = "outputMimeType")]
    output_mime_type: String,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Prediction {
    #[serde(rename = "bytesBase64Encoded")]
    bytes_base64_encoded: Option<String>,
    #[serde(rename = "mimeType")]
    mime_type: Option<String>,
}

fn first_prediction_image(response: &PredictResponse) -> Option<ImageRef> {
    let prediction = response.predictions.first()?;
    let data = prediction.bytes_base64_encoded.clone()?;
    Some(ImageRef::Inline {
        mime: prediction
            .mime_type
            .clone()
            .unwrap_or_else(|| "image/jpeg".to_string()),
        data,
    })
}

pub(crate) async fn generate_imagen(
    client: &reqwest::Client,
    prompt: &str,
    config: &GenerationConfig,
) -> Result<ImageRef, GenerationError> {
    let url = format!(
        "https://generativelanguage.googleapis.com/v1beta/models/{}:predict?key={}",
        IMAGEN_SERVING_MODEL, config.api_key
    );

    let request_body = PredictRequest {
        instances: vec![PredictInstance {
            prompt: prompt.to_string(),
        }],
        parameters: PredictParameters {
            sample_count: 1,
            aspect_ratio: config.aspect_ratio.clone(),
            output_mime_type: "image/jpeg".to_string(),
        },
    };

    let resp = client
        .post(&url)
        .json(&request_body)
        .send()
        .await
        .map_err(transport_error)?;

    let status = resp.status();
    let response_text = resp.text().await.map_err(transport_error)?;

    if !status.is_success() {
        return Err(GenerationError::provider(
            Provider::Google,
            Some(status.as_u16()),
            response_text,
        ));
    }

    let result: PredictResponse = serde_json::from_str(&response_text).map_err(|e| {
        GenerationError::provider(
            Provider::Google,
            None,
            format!("unexpected response: {}. Body: {}", e, response_text),
        )
    })?;

    if let Some(err) = result.error {
        return Err(GenerationError::provider(
            Provider::Google,
            err.code,
            err.message,
        ));
    }

    first_prediction_image(&result).ok_or(GenerationError::NoImageReturned)
}

#[cfg(test)]
mod tests {
    use super::super::{find_model, GenerationConfig, GEMINI_PRO_IMAGE};
    use super::*;

    #[test]
    fn test_response_with_inline_image() {
        let json = r#"{
            "candidates": [
                {
                    "content": {
                        "parts": [
                            { "text": "Here is your panel" },
                            { "inlineData": { "mimeType": "image/png", "data": "aGVsbG8=" } }
                        ],
                        "role": "model"
                    },
                    "finishReason": "STOP"
                }
            ]
        }"#;

        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let image = first_inline_image(&response).unwrap();
        assert_eq!(
            image,
            ImageRef::Inline {
                mime: "image/png".to_string(),
                data: "aGVsbG8=".to_string(),
            }
        );
    }

    #[test]
    fn test_response_with_text_only_has_no_image() {
        let json = r#"{
            "candidates": [
                {
                    "content": {
                        "parts": [ { "text": "I cannot draw that" } ],
                        "role": "model"
                    },
                    "finishReason": "STOP"
                }
            ]
        }"#;

        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert!(first_inline_image(&response).is_none());
    }

    #[test]
    fn test_response_blocked_by_safety() {
        let json = r#"{
            "candidates": [
                { "finishReason": "SAFETY", "index": 0 }
            ]
        }"#;

        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert!(first_inline_image(&response).is_none());
    }

    #[test]
    fn test_error_payload_parses() {
        let json = r#"{
            "error": { "code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT" }
        }"#;

        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, Some(400));
        assert!(error.message.contains("API key not valid"));
    }

    #[test]
    fn test_pro_model_request_carries_image_config() {
        let model = find_model(GEMINI_PRO_IMAGE).unwrap();
        let config = GenerationConfig::new(model, "key".to_string(), "16:9".to_string());
        let body = serde_json::to_value(gemini_request("draw", &config)).unwrap();

        assert_eq!(body["contents"][0]["parts"][0]["text"], "draw");
        assert_eq!(body["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");
        assert_eq!(body["generationConfig"]["imageConfig"]["imageSize"], "1K");
    }

    #[test]
    fn test_flash_model_request_omits_image_config() {
        let model = find_model("gemini-2.5-flash-image").unwrap();
        let config = GenerationConfig::new(model, "key".to_string(), "16:9".to_string());
        let body = serde_json::to_value(gemini_request("draw", &config)).unwrap();

        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn test_prediction_image_defaults_to_jpeg() {
        let json = r#"{
            "predictions": [
                { "bytesBase64Encoded": "aW1n" }
            ]
        }"#;

        let response: PredictResponse = serde_json::from_str(json).unwrap();
        let image = first_prediction_image(&response).unwrap();
        assert_eq!(
            image,
            ImageRef::Inline {
                mime: "image/jpeg".to_string(),
                data: "aW1n".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_predictions_has_no_image() {
        let response: PredictResponse = serde_json::from_str(r#"{ "predictions": [] }"#).unwrap();
        assert!(first_prediction_image(&response).is_none());

        let response: PredictResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(first_prediction_image(&response).is_none());
    }
}
