//! Cleanup of chat-model replies

/// Contents of the first markdown code fence (```` ```json ````, ```` ```sql ````, ...)
///
/// Text before the opening fence and after the closing one is dropped. A reply
/// without a fence is returned trimmed.
pub fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();

    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };
    let rest = &trimmed[open + 3..];

    // drop the language tag on the opening line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };

    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_reply_is_trimmed() {
        assert_eq!(strip_code_fences("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn test_json_fence() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn test_sql_fence_without_closing() {
        assert_eq!(
            strip_code_fences("```sql\nSELECT * FROM invoices;"),
            "SELECT * FROM invoices;"
        );
    }

    #[test]
    fn test_bare_fence() {
        assert_eq!(strip_code_fences("```\nSELECT 1\n```"), "SELECT 1");
    }

    #[test]
    fn test_preamble_before_fence_is_dropped() {
        assert_eq!(
            strip_code_fences("Here is the extracted data:\n```json\n{\"a\": 1}\n```"),
            "{\"a\": 1}"
        );
    }

    #[test]
    fn test_text_after_closing_fence_is_dropped() {
        assert_eq!(
            strip_code_fences("```sql\nSELECT 1\n```\nThis counts the rows."),
            "SELECT 1"
        );
    }
}
