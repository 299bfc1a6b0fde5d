use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use clawmeter_core::types::ContextRequest;

/// Read a request document from a file, or stdin when the path is "-".
pub fn load_request(path: &Path) -> Result<ContextRequest> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };
    parse_request(&raw).with_context(|| format!("Invalid request in {}", path.display()))
}

pub fn parse_request(raw: &str) -> Result<ContextRequest> {
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_request() {
        let req = parse_request(
            r#"{
                "model": "openai/gpt-4o",
                "system_prompt": "You are Sam.",
                "memory_blocks": [{"label": "human", "content": "Chad"}],
                "tools": [{"type": "function", "function": {"name": "noop"}}],
                "messages": [{"role": "user", "content": "hi"}]
            }"#,
        )
        .unwrap();
        assert_eq!(req.model.as_deref(), Some("openai/gpt-4o"));
        assert_eq!(req.memory_blocks.len(), 1);
        assert_eq!(req.tools.len(), 1);
        assert_eq!(req.messages.len(), 1);
    }

    #[test]
    fn test_load_request_missing_file() {
        let err = load_request(Path::new("/nonexistent/request.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_load_request_invalid_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, "[1, 2").unwrap();
        let err = load_request(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid request"));
    }
}
