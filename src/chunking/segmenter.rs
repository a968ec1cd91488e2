//! Sentence segmentation for the semantic chunker.

use unicode_segmentation::UnicodeSegmentation;

/// Splits text into sentences using Unicode sentence boundaries.
///
/// Returned slices are contiguous substrings of the input in document order,
/// so joining them reconstructs the original text exactly. The boundary rules
/// emit standalone segments for paragraph separators; those whitespace-only
/// segments are merged onto the preceding sentence (or the following one at
/// the start of the text) rather than returned on their own.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    let mut pending_start: Option<usize> = None;
    let mut cursor = 0;
    for segment in text.split_sentence_bounds() {
        let start = cursor;
        cursor += segment.len();
        if segment.trim().is_empty() {
            if let Some(last) = ranges.last_mut() {
                last.1 = cursor;
            } else if pending_start.is_none() {
                pending_start = Some(start);
            }
        } else {
            let begin = pending_start.take().unwrap_or(start);
            ranges.push((begin, cursor));
        }
    }
    ranges
        .into_iter()
        .map(|(start, end)| &text[start..end])
        .collect()
}

/// Joins consecutive sentences into units of `group_size` sentences each.
///
/// The trailing unit may be shorter. Units preserve document order and
/// together cover every non-empty sentence.
pub fn group_sentences(sentences: &[&str], group_size: usize) -> Vec<String> {
    let size = group_size.max(1);
    sentences
        .chunks(size)
        .map(|group| group.concat())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_sentence_boundaries() {
        let text = "Plants make food. They use sunlight. Roots absorb water.";
        let sentences = split_sentences(text);
        assert_eq!(sentences.len(), 3);
        assert!(sentences[0].starts_with("Plants"));
        assert!(sentences[2].starts_with("Roots"));
    }

    #[test]
    fn reconstruction_covers_input() {
        let text = "First sentence. Second sentence! Third?";
        let sentences = split_sentences(text);
        assert_eq!(sentences.concat(), text);
    }

    #[test]
    fn paragraph_breaks_are_kept_on_the_preceding_sentence() {
        let text = "Plants make food by photosynthesis.\n\nSunlight drives the \
                    reaction.\n\nRivers carry sediment downstream.";
        let sentences = split_sentences(text);
        assert_eq!(sentences.len(), 3);
        assert!(sentences[0].ends_with(".\n\n"));
        assert_eq!(sentences.concat(), text);
    }

    #[test]
    fn leading_and_trailing_whitespace_survive() {
        let text = "\n\nOne sentence. Another one.\n";
        let sentences = split_sentences(text);
        assert_eq!(sentences.concat(), text);
        assert!(sentences[0].starts_with("\n\n"));
    }

    #[test]
    fn whitespace_only_yields_nothing() {
        assert!(split_sentences("   \n\t  ").is_empty());
        assert!(split_sentences("").is_empty());
    }

    #[test]
    fn grouping_respects_size_and_order() {
        let sentences = vec!["A. ", "B. ", "C. ", "D. ", "E."];
        let groups = group_sentences(&sentences, 2);
        assert_eq!(groups, vec!["A. B. ", "C. D. ", "E."]);
    }
}
