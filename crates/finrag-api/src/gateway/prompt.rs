use finrag_core::types::RankedContext;

pub const FINANCE_SYSTEM: &str = "You are an expert finance assistant.\n\
Use the reference snippets if they are relevant, but also rely on your own finance knowledge.\n\
Never mention phrases like \"in the documents\" or \"not defined in documents\". \
Just answer naturally and clearly. If you truly don't know, say \"I'm not sure\".";

/// Wrap a user question with the finance instruction and, when present, the
/// retrieved snippets numbered from 1.
pub fn build_chat_prompt(contexts: &[RankedContext], question: &str) -> String {
    if contexts.is_empty() {
        return format!("{FINANCE_SYSTEM}\n\nUser question: {question}\nAnswer:");
    }
    let snippets = contexts
        .iter()
        .enumerate()
        .map(|(i, c)| format!("Snippet {} (id: {}):\n{}", i + 1, c.id, c.text))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{FINANCE_SYSTEM}\n\nHere are some reference snippets that may help:\n{snippets}\n\nUser question: {question}\nAnswer:")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(id: &str, text: &str) -> RankedContext {
        RankedContext { id: id.into(), text: text.into(), score: 0.5 }
    }

    #[test]
    fn no_contexts_skips_snippet_block() {
        let p = build_chat_prompt(&[], "What is EBITDA?");
        assert!(p.starts_with("You are an expert finance assistant.\n"));
        assert!(p.ends_with("\n\nUser question: What is EBITDA?\nAnswer:"));
        assert!(!p.contains("Snippet"));
    }

    #[test]
    fn snippets_are_numbered_in_rank_order() {
        let p = build_chat_prompt(&[ctx("doc1", "EBITDA text"), ctx("doc4", "margin text")], "q");
        assert!(p.contains("Here are some reference snippets that may help:\nSnippet 1 (id: doc1):\nEBITDA text\n\nSnippet 2 (id: doc4):\nmargin text\n\nUser question: q\nAnswer:"));
    }
}
