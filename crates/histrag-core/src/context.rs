/// Format chunks as a quoted bullet list, one chunk per line, in the given order.
pub fn build_context<S: AsRef<str>>(chunks: &[S]) -> String {
    chunks
        .iter()
        .map(|chunk| format!("- \"{}\"", chunk.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}
