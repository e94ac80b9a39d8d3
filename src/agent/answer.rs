//! Final answer extraction
//!
//! A prediction is only taken from an explicit declaration: the last
//! non-empty line of the answer must read `Root cause service: <name>`.
//! Anything else yields [`UNKNOWN_PREDICTION`].

use lazy_static::lazy_static;
use regex::Regex;

use super::protocol::answer_block;

/// Prediction reported when no valid answer was given
pub const UNKNOWN_PREDICTION: &str = "unknown";

lazy_static! {
    static ref ROOT_CAUSE_LINE: Regex =
        Regex::new(r"^Root cause service:\s*([A-Za-z0-9][A-Za-z0-9._-]*)$")
            .expect("root cause pattern is valid");
}

/// Extract the declared root cause service from a model output.
///
/// The `<answer>` block is unwrapped when present; otherwise the whole text
/// is examined.
pub fn extract(text: &str) -> String {
    let body = answer_block(text).unwrap_or(text);
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .and_then(|line| ROOT_CAUSE_LINE.captures(line))
        .map(|captures| captures[1].to_string())
        .unwrap_or_else(|| UNKNOWN_PREDICTION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_final_line() {
        assert_eq!(
            extract("...\nRoot cause service: ts-food-service"),
            "ts-food-service"
        );
    }

    #[test]
    fn test_fenced_answer_with_trailing_whitespace() {
        let text = "Analysis done.\n<answer>\nThe food service failed first.\n\n   Root cause service: ts-food-service   \n\n</answer>\nThanks!";
        assert_eq!(extract(text), "ts-food-service");
    }

    #[test]
    fn test_missing_line_is_unknown() {
        assert_eq!(extract("I could not determine the cause."), UNKNOWN_PREDICTION);
        assert_eq!(extract(""), UNKNOWN_PREDICTION);
        assert_eq!(extract("<answer></answer>"), UNKNOWN_PREDICTION);
    }

    #[test]
    fn test_line_not_last_is_unknown() {
        let text = "Root cause service: ts-food-service\nbut maybe it was ts-order-service.";
        assert_eq!(extract(text), UNKNOWN_PREDICTION);

        let fenced = "<answer>\nRoot cause service: ts-food-service\nMore commentary\n</answer>";
        assert_eq!(extract(fenced), UNKNOWN_PREDICTION);
    }

    #[test]
    fn test_decorated_line_is_unknown() {
        assert_eq!(extract("**Root cause service: ts-food-service**"), UNKNOWN_PREDICTION);
        assert_eq!(extract("Root cause service: [ts-food-service]"), UNKNOWN_PREDICTION);
        assert_eq!(extract("root cause service: ts-food-service"), UNKNOWN_PREDICTION);
        assert_eq!(
            extract("Root cause service: ts-food-service because of errors"),
            UNKNOWN_PREDICTION
        );
    }
}
