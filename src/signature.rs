//! Comment signature and metadata markers.
//!
//! Every comment the bot writes carries two markers: a human-visible
//! signature line and a machine-readable HTML comment tag. Readers prefer
//! the structured tag and fall back to signature-substring detection for
//! comments written by older bot versions or external actors.

use std::sync::LazyLock;

use regex::Regex;

pub const BOT_NAME: &str = "taproot";

/// Substring shared by every signature variant, used for fallback detection.
pub const SIGNATURE_MARKER: &str = "*This response was automatically generated by taproot";

const META_TAG_PREFIX: &str = "<!-- taproot:";
const META_TAG_SUFFIX: &str = " -->";

static TERMINATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bTERMINATE\b").expect("valid regex"));

static MODEL_SIGNATURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n*---\n\*This response was automatically generated by taproot using model [^*\n]+\*\s*")
        .expect("valid regex")
});

static BASIC_SIGNATURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n*---\n\*This response was automatically generated by taproot\*\s*")
        .expect("valid regex")
});

static META_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!-- taproot:[^>]*-->\s*").expect("valid regex"));

/// Terminal classification a bot comment reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentOutcome {
    Success,
    Error,
    None,
}

impl CommentOutcome {
    fn as_str(self) -> &'static str {
        match self {
            CommentOutcome::Success => "success",
            CommentOutcome::Error => "error",
            CommentOutcome::None => "none",
        }
    }
}

/// Metadata recovered from a comment body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentMeta {
    pub bot_authored: bool,
    pub outcome: CommentOutcome,
}

fn meta_tag(outcome: CommentOutcome) -> String {
    format!(
        "{META_TAG_PREFIX} kind=bot outcome={}{META_TAG_SUFFIX}",
        outcome.as_str()
    )
}

/// Parse comment metadata. Structured tag first; signature sniffing only as
/// the fallback for comments written before the tag existed.
pub fn comment_meta(body: &str) -> CommentMeta {
    if let Some(start) = body.find(META_TAG_PREFIX) {
        let rest = &body[start..];
        let tag = rest
            .find(META_TAG_SUFFIX)
            .map(|end| &rest[..end])
            .unwrap_or(rest);
        let outcome = if tag.contains("outcome=error") {
            CommentOutcome::Error
        } else if tag.contains("outcome=success") {
            CommentOutcome::Success
        } else {
            CommentOutcome::None
        };
        return CommentMeta {
            bot_authored: tag.contains("kind=bot"),
            outcome,
        };
    }

    // Legacy path: no tag, sniff the signature text.
    if body.contains(SIGNATURE_MARKER) {
        let outcome = if body.contains("ERROR:") {
            CommentOutcome::Error
        } else {
            CommentOutcome::Success
        };
        return CommentMeta {
            bot_authored: true,
            outcome,
        };
    }

    CommentMeta {
        bot_authored: false,
        outcome: CommentOutcome::None,
    }
}

pub fn is_bot_comment(body: &str) -> bool {
    comment_meta(body).bot_authored
}

/// Remove TERMINATE control tokens, prior signatures, and metadata tags so a
/// response can be re-signed without stacking markers.
pub fn clean_response(text: &str) -> String {
    let text = TERMINATE_RE.replace_all(text, "");
    let text = MODEL_SIGNATURE_RE.replace_all(&text, "");
    let text = BASIC_SIGNATURE_RE.replace_all(&text, "");
    let text = META_TAG_RE.replace_all(&text, "");
    text.trim().to_string()
}

/// Sign a response for publication: strip any prior markers, then append
/// exactly one signature and one metadata tag.
pub fn sign_response(text: &str, model: &str, outcome: CommentOutcome) -> String {
    let cleaned = clean_response(text);
    format!(
        "{cleaned}\n\n---\n*This response was automatically generated by {BOT_NAME} using model {model}*\n{}",
        meta_tag(outcome)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_then_detect() {
        let signed = sign_response("All good.", "gpt-4o", CommentOutcome::Success);
        let meta = comment_meta(&signed);
        assert!(meta.bot_authored);
        assert_eq!(meta.outcome, CommentOutcome::Success);
        assert!(signed.contains("using model gpt-4o"));
    }

    #[test]
    fn test_signing_is_idempotent() {
        let once = sign_response("Answer text.", "gpt-4o", CommentOutcome::Success);
        let twice = sign_response(&once, "gpt-4o", CommentOutcome::Success);
        assert_eq!(once, twice);
        assert_eq!(once.matches(SIGNATURE_MARKER).count(), 1);
        assert_eq!(once.matches(META_TAG_PREFIX).count(), 1);
    }

    #[test]
    fn test_clean_strips_terminate_tokens() {
        let cleaned = clean_response("Done with the task. TERMINATE");
        assert_eq!(cleaned, "Done with the task.");
        // case-insensitive, word-bounded
        let cleaned = clean_response("terminate\nreal content");
        assert_eq!(cleaned, "real content");
        assert_eq!(clean_response("EXTERMINATED"), "EXTERMINATED");
    }

    #[test]
    fn test_clean_strips_prior_model_signature() {
        let body = "Answer.\n\n---\n*This response was automatically generated by taproot using model gpt-4o*";
        assert_eq!(clean_response(body), "Answer.");
    }

    #[test]
    fn test_legacy_signature_fallback() {
        // A comment written by an older version: signature but no tag
        let body = "Hello\n\n---\n*This response was automatically generated by taproot*";
        let meta = comment_meta(body);
        assert!(meta.bot_authored);
        assert_eq!(meta.outcome, CommentOutcome::Success);
    }

    #[test]
    fn test_legacy_error_comment_fallback() {
        let body = "ERROR: push failed\n\n---\n*This response was automatically generated by taproot*";
        let meta = comment_meta(body);
        assert!(meta.bot_authored);
        assert_eq!(meta.outcome, CommentOutcome::Error);
    }

    #[test]
    fn test_human_comment_has_no_meta() {
        let meta = comment_meta("Please also fix the flaky test.");
        assert!(!meta.bot_authored);
        assert_eq!(meta.outcome, CommentOutcome::None);
    }

    #[test]
    fn test_error_tag_wins_over_success_text() {
        let signed = sign_response("ERROR: it broke", "gpt-4o", CommentOutcome::Error);
        assert_eq!(comment_meta(&signed).outcome, CommentOutcome::Error);
    }
}
