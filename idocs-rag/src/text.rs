//! Lexical helpers shared by the keyword scorer, the hashing embedder and the
//! answer composer.

const STOPWORDS: &[&str] = &[
    "a", "about", "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for", "from",
    "how", "i", "if", "in", "is", "it", "me", "my", "of", "on", "or", "should", "that", "the",
    "there", "this", "to", "was", "we", "what", "when", "where", "which", "who", "why", "will",
    "with", "you", "your",
];

/// Lowercased alphanumeric terms of `text`, stopwords removed.
pub(crate) fn content_terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// Split text into sentences, keeping terminal punctuation.
///
/// Blank lines and list lines also end a sentence so headings and bullet
/// items stand on their own.
pub(crate) fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    for line in text.lines() {
        let mut start = 0;
        let bytes = line.as_bytes();
        for (i, b) in bytes.iter().enumerate() {
            let terminal = matches!(b, b'.' | b'!' | b'?');
            let at_break = bytes.get(i + 1).is_none_or(|next| next.is_ascii_whitespace());
            if terminal && at_break {
                push_trimmed(&mut out, &line[start..=i]);
                start = i + 1;
            }
        }
        push_trimmed(&mut out, &line[start..]);
    }
    out
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, s: &'a str) {
    let s = s.trim().trim_start_matches(['-', '*']).trim_start();
    if !s.is_empty() {
        out.push(s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terms_drop_stopwords_and_punctuation() {
        assert_eq!(
            content_terms("What is the normal operating temperature?"),
            vec!["normal", "operating", "temperature"]
        );
        assert_eq!(content_terms("Alarm at 1000°C"), vec!["alarm", "1000", "c"]);
    }

    #[test]
    fn sentences_split_on_terminals_and_lines() {
        let text = "Verify fans. Start burners!\n- Check draft pressure\n\nSee 2.5 bar.";
        assert_eq!(
            sentences(text),
            vec!["Verify fans.", "Start burners!", "Check draft pressure", "See 2.5 bar."]
        );
    }
}
