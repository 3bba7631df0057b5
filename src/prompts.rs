//! Instructions sent to the vision model.
//!
//! Callers can override the system instruction via
//! [`crate::config::PipelineConfig::system_prompt`]; the constant here is used
//! only when no override is provided. The per-page instruction is not
//! configurable because it carries the page number.

/// Default system instruction for transcribing one page image to Markdown.
pub const SYSTEM_PROMPT: &str = "You are an expert at transcribing documents into clean, \
well-formatted markdown. Extract all text from the image and format it properly in markdown. \
Preserve headings, lists, tables, and other structural elements. \
If there are figures or images, describe them briefly in [square brackets].";

/// User instruction accompanying the image of page `page_num`.
pub fn page_instruction(page_num: usize) -> String {
    format!(
        "This is page {page_num} of a document. Please transcribe all the text from this \
image into clean markdown format."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_instruction_embeds_number() {
        assert!(page_instruction(7).starts_with("This is page 7 of a document."));
    }

    #[test]
    fn system_prompt_asks_for_structure_and_figures() {
        assert!(SYSTEM_PROMPT.contains("headings, lists, tables"));
        assert!(SYSTEM_PROMPT.contains("[square brackets]"));
    }
}
