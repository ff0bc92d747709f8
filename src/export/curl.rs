//! Replay commands in `curl` syntax
//!
//! Values are inserted verbatim; quotes inside URLs, headers or bodies are
//! not escaped.

use crate::models::CompletedRequest;

const LINE_BREAK: &str = " \\\n  ";

/// Render one request as a multi-line `curl` command.
pub fn to_curl(request: &CompletedRequest) -> String {
    let mut command = format!("curl -X {} \"{}\"", request.method, request.url);
    for header in &request.headers {
        // curl computes the length itself
        if header.name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        command.push_str(LINE_BREAK);
        command.push_str(&format!("-H \"{}: {}\"", header.name, header.value));
    }
    if let Some(body) = request.body_text() {
        command.push_str(LINE_BREAK);
        command.push_str(&format!("-d '{}'", body));
    }
    command
}

/// One command per request, in capture order
pub fn to_curl_list(requests: &[CompletedRequest]) -> Vec<String> {
    requests.iter().map(to_curl).collect()
}

/// Commands separated by a blank line, as shown to the user
pub fn join_commands(commands: &[String]) -> String {
    commands.join("\n\n")
}
