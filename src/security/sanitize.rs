//! Strips script injection patterns from JSON bodies and query values.
//!
//! Only string leaves are rewritten. Object keys, numbers, booleans and the
//! nesting shape are left alone.

use regex::Regex;
use serde_json::Value;

use crate::error::GatewayError;
use crate::security::context::RequestContext;
use crate::security::pipeline::Stage;

pub struct Sanitizer {
    script_tag: Regex,
    javascript_uri: Regex,
    event_handler: Regex,
}

impl Sanitizer {
    pub fn new() -> Self {
        Self {
            script_tag: Regex::new(r"(?is)<script\b.*?</script\s*>").expect("static pattern"),
            javascript_uri: Regex::new(r"(?i)javascript:").expect("static pattern"),
            event_handler: Regex::new(r"(?i)on\w+\s*=").expect("static pattern"),
        }
    }

    pub fn sanitize_str(&self, input: &str) -> String {
        let out = self.script_tag.replace_all(input, "");
        let out = self.javascript_uri.replace_all(&out, "");
        self.event_handler.replace_all(&out, "").into_owned()
    }

    /// Rewrite every string in `value` in place. Returns whether anything
    /// changed.
    pub fn sanitize_value(&self, value: &mut Value) -> bool {
        match value {
            Value::String(s) => {
                let cleaned = self.sanitize_str(s);
                if cleaned == *s {
                    false
                } else {
                    *s = cleaned;
                    true
                }
            }
            Value::Array(items) => items
                .iter_mut()
                .fold(false, |changed, item| self.sanitize_value(item) | changed),
            Value::Object(map) => map
                .values_mut()
                .fold(false, |changed, item| self.sanitize_value(item) | changed),
            _ => false,
        }
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for Sanitizer {
    fn name(&self) -> &'static str {
        "sanitize"
    }

    fn on_request(&self, ctx: &mut RequestContext) -> Result<(), GatewayError> {
        if let Some(json) = ctx.json.as_mut() {
            if self.sanitize_value(json) {
                ctx.json_modified = true;
            }
        }

        for (_, value) in ctx.query.iter_mut() {
            let cleaned = self.sanitize_str(value);
            if cleaned != *value {
                *value = cleaned;
                ctx.query_modified = true;
            }
        }

        if ctx.json_modified || ctx.query_modified {
            tracing::debug!(request_id = %ctx.request_id, path = %ctx.path, "Sanitized request input");
        }
        Ok(())
    }
}
