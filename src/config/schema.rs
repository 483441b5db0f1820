use jsonschema::JSONSchema;
use serde_json::Value;

use crate::error::ConfigError;

/// included profile schema
static PROFILE_SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/schema/profile.json"));

pub fn load_schema() -> Result<JSONSchema, ConfigError> {
    let schema: Value = serde_json::from_str(PROFILE_SCHEMA)?;
    JSONSchema::compile(&schema).map_err(|err| ConfigError::ProfileInvalid(vec![format!("schema: {err}")]))
}

/// Every validation failure, with the JSON pointer of the offending value
pub fn validate(schema: &JSONSchema, json: &Value) -> Result<(), ConfigError> {
    match schema.validate(json) {
        Ok(_) => Ok(()),
        Err(errors) => {
            let messages: Vec<String> = errors
                .map(|err| format!("{}: {}", err.instance_path, err))
                .collect();
            Err(ConfigError::ProfileInvalid(messages))
        }
    }
}
