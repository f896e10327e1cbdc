//! Terminal rendering for pipeline results

use lingua_core::translate::language_name;
use lingua_core::{LanguagePair, PipelineResult, ScoredRecord};

/// Print one processed sentence the way the interactive prompt shows it
pub fn print_result(result: &PipelineResult, languages: &LanguagePair) {
    print!("{}", render_result(result, languages));
}

pub fn print_recall(hits: &[ScoredRecord]) {
    print!("{}", render_recall(hits));
}

fn render_result(result: &PipelineResult, languages: &LanguagePair) -> String {
    let source_name = language_name(&languages.source);
    let target_name = language_name(&languages.target);
    let mut out = String::new();

    out.push_str(&format!("\nInput: {}\n", result.text));

    if !result.source_tokens.is_empty() {
        out.push_str(&format!("\n{} Tokens:\n", source_name));
        for token in &result.source_tokens {
            out.push_str(&format!("  • {} ({})\n", token.surface, token.category));
        }
    }

    out.push_str(&format!("\nTranslation ({}): {}\n", target_name, result.translation));

    if !result.alignment.is_empty() {
        out.push_str("\nNaive Alignment:\n");
        for pair in &result.alignment {
            out.push_str(&format!("  {} ↔ {}\n", pair.source, pair.target));
        }
    }

    if let Some(id) = result.record_id {
        out.push_str(&format!("\nStored as ID: {}\n", id));
    }

    for failure in &result.failures {
        out.push_str(&format!("\n! {}\n", failure.user_message()));
    }

    out
}

fn render_recall(hits: &[ScoredRecord]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<8} {:<38} {}\n", "SCORE", "ID", "SENTENCE"));
    out.push_str(&format!("{}\n", "-".repeat(80)));
    for hit in hits {
        out.push_str(&format!(
            "{:<8.3} {:<38} {}\n",
            hit.score, hit.record.id, hit.record.original_text
        ));
        if !hit.record.translation.is_empty() {
            out.push_str(&format!("{:<8} {:<38} → {}\n", "", "", hit.record.translation));
        }
    }
    out
}
