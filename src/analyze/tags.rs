// src/analyze/tags.rs
//! Technology tags from a fixed vocabulary.

use std::collections::BTreeSet;

use crate::relevance::tokenize;

const TECH_VOCABULARY: &[&str] = &[
    "python", "javascript", "typescript", "react", "vue", "angular", "node", "express", "fastapi",
    "django", "flask", "nextjs", "docker", "kubernetes", "aws", "azure", "gcp", "terraform", "ai",
    "ml", "machine learning", "llm", "gpt", "neural", "framework", "library", "tool", "api",
    "database", "sql", "git", "github", "ci/cd", "devops", "microservices",
];

/// Vocabulary entries found in `title` or `description`.
pub fn extract_tech_tags(title: &str, description: &str) -> BTreeSet<String> {
    let text = format!("{} {}", title, description).to_lowercase();
    let words: BTreeSet<String> = tokenize(&text).into_iter().collect();

    TECH_VOCABULARY
        .iter()
        .filter(|k| {
            if k.chars().count() <= 3 {
                words.contains(**k)
            } else {
                text.contains(**k)
            }
        })
        .map(|k| k.to_string())
        .collect()
}
