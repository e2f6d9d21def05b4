//! Conversion layer between Petwise types and the Responses API wire format.

use petwise_core::{
    Content, FunctionCall, LlmRequest, LlmResponse, OutputItem, Part, PetwiseError, ROLE_ASSISTANT,
    Result, StreamEvent, ToolDeclaration,
};
use serde_json::{Map, Value, json};

/// Convert a conversation into Responses API `input` items.
///
/// Text and image parts of one message become a single `message` item; function
/// calls and function outputs become their own items so call ids line up.
pub fn contents_to_input(contents: &[Content]) -> Vec<Value> {
    let mut items = Vec::new();
    for content in contents {
        let text_type = if content.role == ROLE_ASSISTANT { "output_text" } else { "input_text" };
        let mut message_parts = Vec::new();

        for part in &content.parts {
            match part {
                Part::Text { text } => {
                    message_parts.push(json!({ "type": text_type, "text": text }));
                }
                Part::Image { url } => {
                    message_parts.push(json!({ "type": "input_image", "image_url": url }));
                }
                Part::FunctionCall { id, call_id, name, args } => {
                    let mut call = Map::new();
                    call.insert("type".into(), Value::String("function_call".into()));
                    if let Some(id) = id {
                        call.insert("id".into(), Value::String(id.clone()));
                    }
                    call.insert("call_id".into(), Value::String(call_id.clone()));
                    call.insert("name".into(), Value::String(name.clone()));
                    call.insert("arguments".into(), Value::String(args.to_string()));
                    items.push(Value::Object(call));
                }
                Part::FunctionResponse { call_id, output, .. } => {
                    items.push(json!({
                        "type": "function_call_output",
                        "call_id": call_id,
                        "output": output,
                    }));
                }
            }
        }

        if !message_parts.is_empty() {
            items.push(json!({ "role": content.role, "content": message_parts }));
        }
    }
    items
}

pub fn convert_tools(tools: &[ToolDeclaration]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters,
            })
        })
        .collect()
}

/// Build the request body for `POST /responses`.
pub fn build_request_body(request: &LlmRequest, default_model: &str, stream: bool) -> Value {
    let model = if request.model.is_empty() { default_model } else { request.model.as_str() };
    let mut body = Map::new();
    body.insert("model".into(), Value::String(model.to_string()));
    body.insert("input".into(), Value::Array(contents_to_input(&request.contents)));

    if !request.tools.is_empty() {
        body.insert("tools".into(), Value::Array(convert_tools(&request.tools)));
    }
    if let Some(temperature) = request.config.temperature {
        body.insert("temperature".into(), json!(temperature));
    }
    if let Some(max_tokens) = request.config.max_output_tokens {
        body.insert("max_output_tokens".into(), json!(max_tokens));
    }
    if request.config.json_object {
        body.insert("text".into(), json!({ "format": { "type": "json_object" } }));
    }
    if stream {
        body.insert("stream".into(), Value::Bool(true));
    }
    Value::Object(body)
}

/// Parse a non-streaming Responses API body.
pub fn parse_response(json: &Value) -> Result<LlmResponse> {
    let output = json
        .get("output")
        .and_then(Value::as_array)
        .ok_or_else(|| PetwiseError::Model("response is missing output array".into()))?;

    let mut items = Vec::with_capacity(output.len());
    for item in output {
        match item.get("type").and_then(Value::as_str) {
            Some("message") => {
                let text: String = item
                    .get("content")
                    .and_then(Value::as_array)
                    .map(|parts| {
                        parts
                            .iter()
                            .filter(|p| p.get("type").and_then(Value::as_str) == Some("output_text"))
                            .filter_map(|p| p.get("text").and_then(Value::as_str))
                            .collect()
                    })
                    .unwrap_or_default();
                items.push(OutputItem::Message { text });
            }
            Some("function_call") => {
                let field = |key: &str| {
                    item.get(key).and_then(Value::as_str).map(str::to_string).ok_or_else(|| {
                        PetwiseError::Model(format!("function_call item missing '{key}'"))
                    })
                };
                let call_id = field("call_id")?;
                items.push(OutputItem::FunctionCall(FunctionCall {
                    id: item
                        .get("id")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| call_id.clone()),
                    call_id,
                    name: field("name")?,
                    arguments_json: field("arguments")?,
                }));
            }
            // Reasoning and other item kinds carry nothing the caller consumes.
            _ => {}
        }
    }

    Ok(LlmResponse { output: items })
}

/// Map one SSE `data` payload onto a [`StreamEvent`]. Returns `None` for event
/// kinds the caller does not need.
pub fn parse_stream_event(data: &str) -> Option<StreamEvent> {
    let json: Value = match serde_json::from_str(data) {
        Ok(json) => json,
        Err(e) => return Some(StreamEvent::Error { message: format!("bad stream event: {e}") }),
    };
    match json.get("type").and_then(Value::as_str)? {
        "response.output_text.delta" => {
            let delta = json.get("delta").and_then(Value::as_str).unwrap_or_default();
            Some(StreamEvent::OutputTextDelta { delta: delta.to_string() })
        }
        "response.completed" => Some(StreamEvent::Completed),
        "response.failed" | "response.incomplete" | "error" => Some(StreamEvent::Error {
            message: error_message(&json).unwrap_or_else(|| "stream failed".to_string()),
        }),
        _ => None,
    }
}

fn error_message(json: &Value) -> Option<String> {
    json.get("message")
        .or_else(|| json.get("error").and_then(|e| e.get("message")))
        .or_else(|| json.pointer("/response/error/message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Extract the human-readable detail from an error body, falling back to the raw body.
pub fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| error_message(&json))
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use petwise_core::Content;

    #[test]
    fn function_call_and_output_become_separate_items() {
        let contents = vec![
            Content::user("puppy food"),
            Content::new(ROLE_ASSISTANT).with_part(Part::FunctionCall {
                id: Some("fc_1".into()),
                call_id: "call_1".into(),
                name: "search_products".into(),
                args: json!({"query": "puppy food"}),
            }),
            Content::new("tool").with_part(Part::FunctionResponse {
                call_id: "call_1".into(),
                name: "search_products".into(),
                output: "12 products returned".into(),
            }),
        ];
        let items = contents_to_input(&contents);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["content"][0]["type"], "input_text");
        assert_eq!(items[1]["type"], "function_call");
        assert_eq!(items[1]["arguments"], r#"{"query":"puppy food"}"#);
        assert_eq!(items[2]["type"], "function_call_output");
    }

    #[test]
    fn assistant_text_uses_output_text() {
        let items = contents_to_input(&[Content::assistant("Hello!")]);
        assert_eq!(items[0]["content"][0]["type"], "output_text");
    }

    #[test]
    fn body_uses_default_model_and_json_format() {
        let request = LlmRequest::new("", vec![Content::user("hi")]).with_json_object();
        let body = build_request_body(&request, "gpt-default", true);
        assert_eq!(body["model"], "gpt-default");
        assert_eq!(body["text"]["format"]["type"], "json_object");
        assert_eq!(body["stream"], true);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn parses_messages_and_function_calls() {
        let json = json!({
            "output": [
                { "type": "reasoning", "summary": [] },
                {
                    "type": "function_call",
                    "id": "fc_9",
                    "call_id": "call_9",
                    "name": "search_products",
                    "arguments": "{\"query\":\"dog bed\"}"
                },
                {
                    "type": "message",
                    "content": [{ "type": "output_text", "text": "Let me look." }]
                }
            ]
        });
        let response = parse_response(&json).unwrap();
        assert_eq!(response.function_calls().len(), 1);
        assert_eq!(response.function_calls()[0].call_id, "call_9");
        assert_eq!(response.text().as_deref(), Some("Let me look."));
    }

    #[test]
    fn missing_output_is_an_error() {
        assert!(parse_response(&json!({"id": "resp_1"})).is_err());
    }

    #[test]
    fn stream_events_map_to_kinds() {
        assert_eq!(
            parse_stream_event(r#"{"type":"response.output_text.delta","delta":"Hi"}"#),
            Some(StreamEvent::OutputTextDelta { delta: "Hi".into() })
        );
        assert_eq!(
            parse_stream_event(r#"{"type":"response.completed","response":{}}"#),
            Some(StreamEvent::Completed)
        );
        assert_eq!(
            parse_stream_event(r#"{"type":"error","message":"overloaded"}"#),
            Some(StreamEvent::Error { message: "overloaded".into() })
        );
        assert_eq!(parse_stream_event(r#"{"type":"response.created"}"#), None);
    }

    #[test]
    fn error_detail_prefers_message_field() {
        assert_eq!(error_detail(r#"{"error":{"message":"quota exceeded"}}"#), "quota exceeded");
        assert_eq!(error_detail("plain failure"), "plain failure");
    }
}
