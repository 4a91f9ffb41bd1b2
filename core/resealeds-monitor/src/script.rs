//! Replay scripts: one JSON step per line, driven against a mounted view.
//!
//! ```text
//! {"step":"signed_in","identity":"alice"}
//! {"step":"add","name":"Kettle","img":"https://cdn/k.png","price":49.5}
//! {"step":"provider_error","reason":"network unreachable"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use resealeds_protocol::NewProduct;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    SignedIn { identity: String },
    SignedOut,
    TokenRefreshed,
    ProviderError { reason: String },
    Add { name: String, img: String, price: f64 },
    Reload,
}

impl Step {
    pub fn label(&self) -> &'static str {
        match self {
            Step::SignedIn { .. } => "signed_in",
            Step::SignedOut => "signed_out",
            Step::TokenRefreshed => "token_refreshed",
            Step::ProviderError { .. } => "provider_error",
            Step::Add { .. } => "add",
            Step::Reload => "reload",
        }
    }

    pub fn draft(&self) -> Option<NewProduct> {
        match self {
            Step::Add { name, img, price } => Some(NewProduct {
                name: name.clone(),
                img: img.clone(),
                price: *price,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("line {line}: {source}")]
pub struct ScriptError {
    pub line: usize,
    #[source]
    pub source: serde_json::Error,
}

pub fn parse_script(content: &str) -> Result<Vec<Step>, ScriptError> {
    let mut steps = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let step = serde_json::from_str(trimmed).map_err(|source| ScriptError {
            line: index + 1,
            source,
        })?;
        steps.push(step);
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_step_kind() {
        let script = r#"
# session lifecycle
{"step":"signed_in","identity":"alice"}
{"step":"token_refreshed"}
{"step":"add","name":"Kettle","img":"/k.png","price":49.5}
{"step":"reload"}
{"step":"provider_error","reason":"offline"}
{"step":"signed_out"}
"#;
        let steps = parse_script(script).expect("parse");
        let labels: Vec<_> = steps.iter().map(Step::label).collect();
        assert_eq!(
            labels,
            vec![
                "signed_in",
                "token_refreshed",
                "add",
                "reload",
                "provider_error",
                "signed_out"
            ]
        );
        assert_eq!(steps[2].draft().map(|d| d.price), Some(49.5));
        assert!(steps[0].draft().is_none());
    }

    #[test]
    fn reports_line_of_bad_step() {
        let script = "{\"step\":\"reload\"}\n\n{\"step\":\"teleport\"}\n";
        let err = parse_script(script).unwrap_err();
        assert_eq!(err.line, 3);
    }
}
