//! Prompt builders for the triage flows.

use crate::platform::types::Item;

fn format_thread(item: &Item) -> String {
    if item.comments.is_empty() {
        return "(no comments yet)".to_string();
    }
    item.comments
        .iter()
        .map(|c| format!("**@{}:** {}", c.author, c.body))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn new_response_system(repo_full_name: &str) -> String {
    format!(
        "You are taproot, a triage assistant for the repository `{repo_full_name}`. \
         Analyze the issue and respond with a helpful, technically grounded assessment: \
         likely causes, relevant code areas, and suggested next steps. \
         Be concise and concrete."
    )
}

pub fn new_response_user(item: &Item) -> String {
    format!(
        "## Issue #{number}: {title}\n\n{body}\n\n## Discussion\n\n{thread}",
        number = item.number,
        title = item.title,
        body = item.body,
        thread = format_thread(item),
    )
}

pub fn feedback_system(repo_full_name: &str) -> String {
    format!(
        "You are taproot, a triage assistant for the repository `{repo_full_name}`. \
         A user has responded to your previous answer. Produce an improved response \
         that directly addresses their feedback. Do not repeat the original answer \
         verbatim; revise it."
    )
}

pub fn feedback_user(item: &Item, original_response: &str, feedback_text: &str) -> String {
    format!(
        "## Issue #{number}: {title}\n\n{body}\n\n## Your previous response\n\n{original_response}\n\n## User feedback\n\n{feedback_text}",
        number = item.number,
        title = item.title,
        body = item.body,
    )
}

pub fn edit_command_system(repo_full_name: &str) -> String {
    format!(
        "You are taproot, preparing an instruction for an automated code-editing \
         tool working on the repository `{repo_full_name}`. From the issue \
         discussion, write a single self-contained instruction describing exactly \
         which changes to make: files, functions, and the intended behavior. \
         The tool cannot ask questions, so be explicit. Output only the instruction."
    )
}

pub fn edit_command_user(item: &Item, summarized_comments: Option<&str>) -> String {
    let mut prompt = format!(
        "## Issue #{number}: {title}\n\n{body}\n\n## Discussion\n\n{thread}",
        number = item.number,
        title = item.title,
        body = item.body,
        thread = format_thread(item),
    );
    if let Some(summary) = summarized_comments {
        prompt.push_str(&format!("\n\n## Summarized discussion\n\n{summary}"));
    }
    prompt
}

pub fn comment_summary_system() -> String {
    "You summarize one comment from an issue discussion. If the comment is \
     relevant to the latest request, reply with a short summary of its \
     technical content and the token IS_RELEVANT. If not, reply only with \
     NOT_RELEVANT."
        .to_string()
}

pub fn comment_summary_user(latest_request: &str, comment: &str) -> String {
    format!("## Latest request\n\n{latest_request}\n\n## Comment to summarize\n\n{comment}")
}
