// Dispatch response carrying the outcome as metadata

use crate::domain::StatusMessage;
use crate::port::StatusSurface;
use serde::Serialize;

pub const STATUS_HEADER: &str = "X-Status";
pub const STATUS_SEVERITY_HEADER: &str = "X-Status-Severity";

/// Minimal HTTP-like response a host can translate to its own framework
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResponse {
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Default for DispatchResponse {
    fn default() -> Self {
        Self {
            status_code: 200,
            headers: Vec::new(),
            body: String::new(),
        }
    }
}

impl DispatchResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value));
    }
}

/// Header values cannot carry line breaks
fn header_safe(text: &str) -> String {
    text.split(['\r', '\n'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl StatusSurface for DispatchResponse {
    fn attach(&mut self, status: &StatusMessage) {
        self.status_code = 200;
        self.set_header(STATUS_HEADER, header_safe(&status.text));
        self.set_header(STATUS_SEVERITY_HEADER, status.severity.to_string());
        self.body = status.text.clone();
    }
}
