//! Shared HTTP utilities for the employee records workspace.
//!
//! Provides framework-agnostic error bodies and path parsing used by HTTP
//! front ends.

use domain::EmployeeId;

// ============================================================================
// JSON Response Helpers (framework-agnostic)
// ============================================================================

/// Create a structured error JSON with a default message based on the code.
///
/// Returns: `{"error": {"code": "<code>", "message": "<default message>"}}`
pub fn json_err(code: &str) -> serde_json::Value {
    let message = match code {
        "not_found" => "Employee not found",
        "bad_request" | "invalid_request" => "Bad request",
        "invalid_id" => "Employee id must be a non-negative integer",
        "conflict" => "Employee already exists",
        "error" | "internal" => "Internal server error",
        _ => code, // Fallback to code as message for unknown codes
    };
    serde_json::json!({"error": {"code": code, "message": message}})
}

/// Create a structured error JSON with a custom message.
///
/// Returns: `{"error": {"code": "<code>", "message": "<message>"}}`
pub fn json_error_with_message(code: &str, message: &str) -> serde_json::Value {
    serde_json::json!({"error": {"code": code, "message": message}})
}

// ============================================================================
// Path Parsing
// ============================================================================

/// Parse an employee id from a path segment. Surrounding whitespace, signs
/// and anything outside the `u32` range are rejected.
pub fn parse_employee_id(segment: &str) -> Option<EmployeeId> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse::<u32>().ok().map(EmployeeId::new)
}
