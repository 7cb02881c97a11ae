//! Captured worker output and the single-photo stdout protocol.

use serde::{Deserialize, Serialize};

use super::error::WorkerError;

/// Bound applied to stdout/stderr before they are logged.
pub const LOG_EXCERPT_CHARS: usize = 3000;

/// Bound applied to stderr before it lands in a diagnostic message.
pub const DIAGNOSTIC_EXCERPT_CHARS: usize = 800;

const ELLIPSIS: &str = " ... ";

/// Keeps the head and tail of `text` so that the result is at most `max`
/// characters, joined by `" ... "`.
pub fn shorten(text: &str, max: usize) -> String {
    let total = text.chars().count();
    if total <= max {
        return text.to_string();
    }
    let sep = ELLIPSIS.chars().count();
    if max <= sep {
        return text.chars().take(max).collect();
    }

    let keep = max - sep;
    let head = keep.div_ceil(2);
    let tail = keep - head;

    let mut out: String = text.chars().take(head).collect();
    out.push_str(ELLIPSIS);
    out.extend(text.chars().skip(total - tail));
    out
}

/// Cuts `text` to at most `max` characters.
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// What a finished worker process left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOutput {
    /// Exit status was zero.
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
}

impl WorkerOutput {
    /// Batch-mode verdict: exit status only.
    pub fn into_result(self) -> Result<WorkerOutput, WorkerError> {
        if self.success {
            Ok(self)
        } else {
            Err(self.exit_failure())
        }
    }

    /// Single-photo verdict: exit status, then the JSON object on stdout.
    pub fn photo_response(&self) -> Result<PhotoWorkerResponse, WorkerError> {
        if !self.success {
            return Err(self.exit_failure());
        }

        let trimmed = self.stdout.trim();
        if trimmed.is_empty() {
            return Err(WorkerError::malformed("empty stdout"));
        }

        let response: PhotoWorkerResponse = serde_json::from_str(trimmed)
            .map_err(|e| WorkerError::malformed(format!("{e}")))?;

        if !response.success {
            return Err(WorkerError::Rejected {
                message: response
                    .message
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "Service reported a failure".to_string()),
            });
        }

        match response.processed_image.as_deref() {
            Some(name) if is_plain_file_name(name) => Ok(response),
            Some(name) => Err(WorkerError::malformed(format!(
                "processed_image is not a plain file name: {name}"
            ))),
            None => Err(WorkerError::malformed("missing processed_image")),
        }
    }

    fn exit_failure(&self) -> WorkerError {
        WorkerError::ExitFailure {
            exit_code: self.exit_code,
            stderr: shorten(self.stderr.trim(), DIAGNOSTIC_EXCERPT_CHARS),
        }
    }
}

/// The JSON object a single-photo worker prints on stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoWorkerResponse {
    pub success: bool,
    /// File name of the result inside the service's output directory.
    #[serde(default)]
    pub processed_image: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(success: bool, stdout: &str, stderr: &str, code: i32) -> WorkerOutput {
        WorkerOutput {
            success,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code: Some(code),
        }
    }

    #[test]
    fn test_shorten_short_text_unchanged() {
        assert_eq!(shorten("hello", 10), "hello");
        assert_eq!(shorten("", 10), "");
    }

    #[test]
    fn test_shorten_keeps_head_and_tail() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let short = shorten(text, 15);
        assert_eq!(short.chars().count(), 15);
        assert!(short.starts_with("abcde"));
        assert!(short.ends_with("vwxyz"));
        assert!(short.contains(" ... "));
    }

    #[test]
    fn test_shorten_multibyte_safe() {
        let text = "é".repeat(50);
        let short = shorten(&text, 11);
        assert_eq!(short.chars().count(), 11);
    }

    #[test]
    fn test_truncate_chars() {
        let long = "x".repeat(1500);
        assert_eq!(truncate_chars(&long, 1000).len(), 1000);
        assert_eq!(truncate_chars("abc", 1000), "abc");
    }

    #[test]
    fn test_batch_verdict_from_exit_status() {
        assert!(output(true, "", "", 0).into_result().is_ok());
        let err = output(false, "", "boom", 2).into_result().unwrap_err();
        assert!(matches!(err, WorkerError::ExitFailure { exit_code: Some(2), .. }));
    }

    #[test]
    fn test_photo_response_success() {
        let out = output(
            true,
            "{\"success\": true, \"processed_image\": \"out.png\", \"message\": \"ok\"}\n",
            "",
            0,
        );
        let response = out.photo_response().unwrap();
        assert_eq!(response.processed_image.as_deref(), Some("out.png"));
    }

    #[test]
    fn test_photo_response_logical_failure() {
        let out = output(true, r#"{"success": false, "message": "no face found"}"#, "", 0);
        match out.photo_response() {
            Err(WorkerError::Rejected { message }) => assert_eq!(message, "no face found"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_photo_response_not_json_is_failure() {
        let out = output(true, "Traceback (most recent call last):", "", 0);
        assert!(matches!(
            out.photo_response(),
            Err(WorkerError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_photo_response_missing_fields() {
        let out = output(true, r#"{"processed_image": "a.png"}"#, "", 0);
        assert!(matches!(
            out.photo_response(),
            Err(WorkerError::MalformedResponse { .. })
        ));

        let out = output(true, r#"{"success": true}"#, "", 0);
        assert!(matches!(
            out.photo_response(),
            Err(WorkerError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_photo_response_rejects_path_escape() {
        let out = output(
            true,
            r#"{"success": true, "processed_image": "../../etc/passwd"}"#,
            "",
            0,
        );
        assert!(matches!(
            out.photo_response(),
            Err(WorkerError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_photo_response_nonzero_exit_wins() {
        let out = output(false, r#"{"success": true, "processed_image": "a.png"}"#, "", 1);
        assert!(matches!(
            out.photo_response(),
            Err(WorkerError::ExitFailure { .. })
        ));
    }

    #[test]
    fn test_exit_failure_bounds_stderr() {
        let stderr = "e".repeat(5000);
        match output(false, "", &stderr, 1).into_result() {
            Err(WorkerError::ExitFailure { stderr, .. }) => {
                assert_eq!(stderr.chars().count(), DIAGNOSTIC_EXCERPT_CHARS)
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
