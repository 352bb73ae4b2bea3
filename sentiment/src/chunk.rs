//! Splitting long text into classifier-sized chunks.

/// Texts under this many words go through the classifier whole.
pub const SINGLE_CHUNK_WORD_LIMIT: usize = 400;

/// Word ceiling per chunk when a long text has to be split.
pub const MAX_WORDS_PER_CHUNK: usize = 300;

/// Split text into sentences at `.`/`!`/`?` followed by whitespace. The
/// terminator stays with its sentence.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if matches!(bytes[i], b'.' | b'!' | b'?') {
            // Consume a run of terminators ("..." or "?!")
            let mut end = i + 1;
            while end < bytes.len() && matches!(bytes[end], b'.' | b'!' | b'?') {
                end += 1;
            }
            if end >= bytes.len() || bytes[end].is_ascii_whitespace() {
                let sentence = text[start..end].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = end;
            }
            i = end;
        } else {
            i += 1;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Split text into chunks of at most `max_words` words, keeping sentences
/// intact where possible. A single sentence longer than the limit is cut
/// at word boundaries.
pub fn split_into_chunks(text: &str, max_words: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_words = 0;

    for sentence in split_sentences(text) {
        let sentence_words = sentence.split_whitespace().count();

        if sentence_words > max_words {
            if !current.is_empty() {
                chunks.push(current.join(" "));
                current.clear();
                current_words = 0;
            }
            let words: Vec<&str> = sentence.split_whitespace().collect();
            for part in words.chunks(max_words) {
                chunks.push(part.join(" "));
            }
        } else if current_words + sentence_words > max_words && !current.is_empty() {
            chunks.push(current.join(" "));
            current = vec![sentence];
            current_words = sentence_words;
        } else {
            current.push(sentence);
            current_words += sentence_words;
        }
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }
    chunks
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
