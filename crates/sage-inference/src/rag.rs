//! Prompt construction for retrieval-augmented generation.

use sage_core::RankedChunk;

/// Build a stuffed-context prompt from the retrieved chunks.
///
/// Chunks are concatenated in rank order; the instruction tells the model to
/// refuse rather than invent when the context does not contain the answer.
pub fn build_prompt(question: &str, chunks: &[RankedChunk]) -> String {
    let context = chunks
        .iter()
        .map(|r| r.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Use the following pieces of context to answer the question at the end. \
         If you don't know the answer, just say that you don't know, don't try \
         to make up an answer.\n\n{context}\n\nQuestion: {question}\nHelpful Answer:"
    )
}
