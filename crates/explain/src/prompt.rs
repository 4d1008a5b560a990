use bughunt_model::BugRecord;

pub const SYSTEM_PROMPT: &str = "You are a bug explainer for test-program source code. \
Given a located bug and a matching entry from a knowledge base of known bugs, explain \
in a few sentences why the code is wrong and how the corrected code fixes it. \
Only use the provided evidence.";

const MAX_EVIDENCE_CHARS: usize = 2_000;

/// User prompt for one bug record and its best knowledge evidence
pub fn build_prompt(record: &BugRecord, evidence: &str) -> String {
    let lines = record
        .sorted_lines()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    let mut prompt = String::new();
    prompt.push_str(&format!("Language: {}\n", record.language));
    prompt.push_str(&format!("Bug type: {}\n", record.bug_type));
    prompt.push_str(&format!("Lines: {lines}\n"));
    prompt.push_str(&format!("Buggy snippet:\n{}\n", record.snippet));
    if let Some(context) = record.context.as_deref() {
        prompt.push_str(&format!("\nContext:\n{context}\n"));
    }
    if let Some(reference) = record.correct_reference.as_deref() {
        prompt.push_str(&format!("\nCorrect code reference:\n{reference}\n"));
    }
    prompt.push_str(&format!(
        "\nKnowledge base evidence:\n{}\n",
        truncate_chars(evidence, MAX_EVIDENCE_CHARS)
    ));
    prompt
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_mentions_lines_and_evidence() {
        let record = BugRecord::new("API Misuse", "iclamp")
            .language("C++")
            .lines([7, 3])
            .snippet("rdi.dc().iClamp(50 mA);")
            .correct_reference("rdi.dc().iClamp(5 mA);");
        let prompt = build_prompt(&record, "Explanation:\nClamp too high");

        assert!(prompt.contains("Lines: 3, 7"));
        assert!(prompt.contains("Bug type: API Misuse"));
        assert!(prompt.contains("Correct code reference:\nrdi.dc().iClamp(5 mA);"));
        assert!(prompt.contains("Clamp too high"));
        assert!(!prompt.contains("Context:"));
    }

    #[test]
    fn evidence_is_truncated() {
        let record = BugRecord::new("T", "t").lines([1]);
        let prompt = build_prompt(&record, &"e".repeat(5_000));
        assert!(prompt.len() < 2_300);
    }
}
