use serde_json::Value;

pub fn value_to_json_text(value: &Value) -> Result<String, String> {
    serde_json::to_string(value).map_err(|error| error.to_string())
}

pub fn json_text_to_value(value: &str) -> Result<Value, String> {
    serde_json::from_str::<Value>(value).map_err(|error| error.to_string())
}
