use std::fs;

use histrag_core::chunker::RecursiveChunker;
use histrag_core::source::load_document;
use histrag_core::types::{Chunk, Query, QueryResponse};
use histrag_core::Error;
use proptest::prelude::*;
use tempfile::TempDir;

#[test]
fn document_file_into_numbered_chunks() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("history.txt");
    fs::write(&path, "Page 1 text\nPage 2 text").unwrap();

    let text = load_document(&path).expect("load");
    let chunker = RecursiveChunker::new(12, 0).unwrap();
    let chunks = Chunk::from_texts(chunker.split(&text));

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0], Chunk { id: 0, text: "Page 1 text".into() });
    assert_eq!(chunks[1], Chunk { id: 1, text: "Page 2 text".into() });
    assert!(chunks.iter().all(|c| c.text.chars().count() <= 12));
}

#[test]
fn query_rejects_non_positive_top_n() {
    assert!(matches!(Query::new("Who?", 0), Err(Error::InvalidArgument(_))));
    assert!(matches!(Query::new("Who?", -3), Err(Error::InvalidArgument(_))));
    assert_eq!(Query::new("Who?", 1_000_000_000).unwrap().top_n, 1_000_000_000);
}

#[test]
fn query_response_uses_service_field_names() {
    let response = QueryResponse {
        question: "Test?".into(),
        retrieved_chunks: vec!["Mock chunk".into()],
        answer: "Mock answer.".into(),
    };
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["question"], "Test?");
    assert_eq!(json["retrieved_chunks"][0], "Mock chunk");
    assert_eq!(json["llm_response"], "Mock answer.");
}

fn arb_document() -> impl Strategy<Value = String> {
    let word = prop_oneof![
        "[a-zA-Z]{1,12}",
        "[a-z]{20,40}",
        Just("José".to_string()),
        Just("1898".to_string()),
    ];
    let sep = prop_oneof![
        4 => Just(" ".to_string()),
        1 => Just(". ".to_string()),
        1 => Just("\n".to_string()),
        1 => Just("\n\n".to_string()),
    ];
    proptest::collection::vec((word, sep), 0..80)
        .prop_map(|parts| parts.into_iter().map(|(w, s)| w + &s).collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn chunks_respect_size_and_cover_every_visible_char(
        text in arb_document(),
        size in 8usize..64,
        overlap_ratio in 0.0f64..0.5,
    ) {
        let overlap = (size as f64 * overlap_ratio) as usize;
        let chunker = RecursiveChunker::new(size, overlap).unwrap();
        let spans = chunker.spans(&text);

        for span in &spans {
            let chunk = &text[span.clone()];
            prop_assert!(chunk.chars().count() <= size, "chunk {:?} exceeds {}", chunk, size);
            prop_assert!(!chunk.trim().is_empty());
        }
        for pair in spans.windows(2) {
            prop_assert!(pair[0].start <= pair[1].start && pair[0].end < pair[1].end);
        }
        for (offset, ch) in text.char_indices() {
            if ch.is_whitespace() { continue; }
            prop_assert!(
                spans.iter().any(|s| s.contains(&offset)),
                "char {:?} at {} not covered", ch, offset
            );
        }
    }

    #[test]
    fn chunking_is_deterministic(text in arb_document(), size in 8usize..64) {
        let chunker = RecursiveChunker::new(size, size / 4).unwrap();
        prop_assert_eq!(chunker.split(&text), chunker.split(&text));
    }
}
