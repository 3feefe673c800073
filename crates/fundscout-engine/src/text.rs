//! Shared text cleanup and tokenization.

/// Strip HTML tags and decode the handful of entities that survive listing
/// extraction, then collapse whitespace.
pub fn clean_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                if in_tag {
                    in_tag = false;
                    out.push(' ');
                } else {
                    out.push(ch);
                }
            }
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }

    let decoded = out
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been",
    "before", "being", "between", "both", "but", "by", "can", "could", "do", "does", "each", "for",
    "from", "had", "has", "have", "how", "if", "in", "into", "is", "it", "its", "may", "more",
    "most", "must", "new", "no", "not", "of", "on", "or", "other", "our", "over", "per", "should",
    "so", "some", "such", "than", "that", "the", "their", "them", "there", "these", "they", "this",
    "those", "through", "to", "under", "up", "upon", "use", "used", "was", "we", "were", "what",
    "when", "where", "which", "while", "who", "will", "with", "within", "would", "your",
];

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Lowercase alphanumeric tokens with stopwords and single characters
/// removed. The "meaningful token" unit used by keyword extraction, the
/// classifier and the match engine.
pub fn tokenize(input: &str) -> Vec<String> {
    input
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1 && !is_stopword(t))
        .map(str::to_string)
        .collect()
}
