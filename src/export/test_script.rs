//! Playwright test scripts asserting that each recorded request succeeds

use super::{display_path, ExportError};
use crate::models::CompletedRequest;

const HEADER: &str = "import { test, expect } from '@playwright/test';\n\n";

fn test_block(req: &CompletedRequest) -> String {
    let data = match req.body_text() {
        Some(body) if !req.is_get() => {
            let literal = serde_json::to_string(body).unwrap_or_else(|_| "\"\"".to_string());
            format!(", {{\n      data: {}\n    }}", literal)
        }
        _ => String::new(),
    };
    format!(
        "test('Test {method} {path}', async ({{ request }}) => {{\n  const response = await request.{call}('{url}'{data});\n  expect(response.ok()).toBeTruthy();\n}});\n\n",
        method = req.method,
        path = display_path(&req.url),
        call = req.method.to_lowercase(),
        url = req.url,
        data = data,
    )
}

/// Render a spec file with one test per request.
pub fn to_test_script(requests: &[CompletedRequest]) -> Result<String, ExportError> {
    if requests.is_empty() {
        return Err(ExportError::NothingToExport);
    }
    let mut script = String::from(HEADER);
    for req in requests {
        script.push_str(&test_block(req));
    }
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_capture_is_an_error() {
        assert!(matches!(
            to_test_script(&[]),
            Err(ExportError::NothingToExport)
        ));
    }

    #[test]
    fn get_request_without_data() {
        let req = CompletedRequest::new("1", "GET", "https://api.example.com/items?x=1", Vec::new());
        let script = to_test_script(&[req]).unwrap();

        assert!(script.starts_with("import { test, expect } from '@playwright/test';\n\n"));
        assert!(script.contains("test('Test GET /items', async ({ request }) => {"));
        assert!(script.contains(
            "const response = await request.get('https://api.example.com/items?x=1');"
        ));
        assert!(script.contains("expect(response.ok()).toBeTruthy();"));
    }

    #[test]
    fn post_body_is_passed_as_json_string() {
        let mut req = CompletedRequest::new("2", "POST", "https://api.example.com/items", Vec::new());
        req.request_body = Some("{\"a\":1}".into());
        let script = to_test_script(&[req]).unwrap();

        assert!(script.contains(
            "request.post('https://api.example.com/items', {\n      data: \"{\\\"a\\\":1}\"\n    });"
        ));
    }

    #[test]
    fn one_block_per_request() {
        let reqs = vec![
            CompletedRequest::new("1", "GET", "https://example.com/a", Vec::new()),
            CompletedRequest::new("2", "DELETE", "https://example.com/b", Vec::new()),
        ];
        let script = to_test_script(&reqs).unwrap();
        assert_eq!(script.matches("test('Test ").count(), 2);
        assert!(script.contains("request.delete('https://example.com/b')"));
    }
}
