use serde::{Deserialize, Serialize};

use super::GenerationConfig;
use crate::core::error::{GenerationError, Provider};
use crate::core::state::ImageRef;

#[derive(Serialize)]
struct ImagesRequest {
    model: String,
    prompt: String,
    n: u32,
    size: String,
    // gpt-image-1 rejects the response_format parameter, so it is never sent.
}

#[derive(Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
    b64_json: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

fn size_for_aspect_ratio(aspect_ratio: &str) -> &'static str {
    match aspect_ratio {
        "16:9" => "1536x1024",
        "9:16" => "1024x1536",
        _ => "1024x1024",
    }
}

fn image_from_response(response: &ImagesResponse) -> Option<ImageRef> {
    let first = response.data.first()?;
    if let Some(url) = &first.url {
        return Some(ImageRef::Remote { url: url.clone() });
    }
    first.b64_json.as_ref().map(|data| ImageRef::Inline {
        mime: "image/png".to_string(),
        data: data.clone(),
    })
}

fn transport_error(err: reqwest::Error) -> GenerationError {
    GenerationError::provider(
        Provider::OpenAi,
        err.status().map(|s| s.as_u16()),
        err.to_string(),
    )
}

pub(crate) async fn generate(
    client: &reqwest::Client,
    prompt: &str,
    config: &GenerationConfig,
) -> Result<ImageRef, GenerationError> {
    let request_body = ImagesRequest {
        model: config.model.clone(),
        prompt: prompt.to_string(),
        n: 1,
        size: size_for_aspect_ratio(&config.aspect_ratio).to_string(),
    };

    let resp = client
        .post("https://api.openai.com/v1/images/generations")
        .header("Authorization", format!("Bearer {}", config.api_key))
        .json(&request_body)
        .send()
        .await
        .map_err(transport_error)?;

    let status = resp.status();
    let response_text = resp.text().await.map_err(transport_error)?;

    if !status.is_success() {
        // Error bodies carry a structured message; fall back to the raw text.
        let message = serde_json::from_str::<ImagesResponse>(&response_text)
            .ok()
            .and_then(|r| r.error)
            .map(|e| e.message)
            .unwrap_or(response_text);
        return Err(GenerationError::provider(
            Provider::OpenAi,
            Some(status.as_u16()),
            message,
        ));
    }

    let result: ImagesResponse = serde_json::from_str(&response_text).map_err(|e| {
        GenerationError::provider(
            Provider::OpenAi,
            None,
            format!("unexpected response: {}. Body: {}", e, response_text),
        )
    })?;

    if let Some(err) = result.error {
        return Err(GenerationError::provider(Provider::OpenAi, None, err.message));
    }

    image_from_response(&result).ok_or(GenerationError::NoImageReturned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_response_becomes_remote_ref() {
        let json = r#"{
            "created": 1700000000,
            "data": [
                { "url": "https://oaidalleapiprodscus.blob.core.windows.net/img.png" }
            ]
        }"#;

        let response: ImagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            image_from_response(&response),
            Some(ImageRef::Remote {
                url: "https://oaidalleapiprodscus.blob.core.windows.net/img.png".to_string(),
            })
        );
    }

    #[test]
    fn test_b64_response_becomes_inline_ref() {
        let json = r#"{
            "created": 1700000000,
            "data": [
                { "b64_json": "aW1hZ2U=" }
            ]
        }"#;

        let response: ImagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            image_from_response(&response),
            Some(ImageRef::Inline {
                mime: "image/png".to_string(),
                data: "aW1hZ2U=".to_string(),
            })
        );
    }

    #[test]
    fn test_empty_data_has_no_image() {
        let response: ImagesResponse = serde_json::from_str(r#"{ "data": [] }"#).unwrap();
        assert!(image_from_response(&response).is_none());

        let response: ImagesResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(image_from_response(&response).is_none());
    }

    #[test]
    fn test_error_payload_parses() {
        let json = r#"{
            "error": {
                "message": "Incorrect API key provided: sk-xxx.",
                "type": "invalid_request_error",
                "code": "invalid_api_key"
            }
        }"#;

        let response: ImagesResponse = serde_json::from_str(json).unwrap();
        assert!(response
            .error
            .unwrap()
            .message
            .contains("Incorrect API key"));
    }

    #[test]
    fn test_size_mapping() {
        assert_eq!(size_for_aspect_ratio("16:9"), "1536x1024");
        assert_eq!(size_for_aspect_ratio("9:16"), "1024x1536");
        assert_eq!(size_for_aspect_ratio("1:1"), "1024x1024");
        assert_eq!(size_for_aspect_ratio("4:3"), "1024x1024");
    }

    #[test]
    fn test_request_body_shape() {
        let body = ImagesRequest {
            model: "gpt-image-1".to_string(),
            prompt: "a windmill".to_string(),
            n: 1,
            size: "1536x1024".to_string(),
        };
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["model"], "gpt-image-1");
        assert_eq!(value["n"], 1);
        assert_eq!(value["size"], "1536x1024");
        assert!(value.get("response_format").is_none());
    }
}
