use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::{Tokenizer, TruncationParams};

/// Encoded batch ready for a BERT forward pass, each tensor shaped `[B, T]`.
pub struct EncodedBatch {
    pub input_ids: Tensor,
    pub token_type_ids: Tensor,
    pub attention_mask: Tensor,
}

/// Cap encodings at `max_len` tokens. The tokenizer reserves room for its
/// special tokens, so `[CLS]` and `[SEP]` survive on long inputs.
pub fn limit_length(tokenizer: &mut Tokenizer, max_len: usize) -> Result<()> {
    tokenizer
        .with_truncation(Some(TruncationParams { max_length: max_len, ..Default::default() }))
        .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;
    Ok(())
}

/// Tokenize `texts` and right-pad the batch to its longest member with `pad_id`.
pub fn tokenize_batch(tokenizer: &Tokenizer, texts: &[String], pad_id: u32, device: &Device) -> Result<EncodedBatch> {
    let mut rows = Vec::with_capacity(texts.len());
    for text in texts {
        let enc = tokenizer
            .encode(text.as_str(), true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        rows.push((enc.get_ids().to_vec(), enc.get_attention_mask().to_vec()));
    }
    let seq_len = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0).max(1);
    let batch = rows.len();
    let mut flat_ids = Vec::with_capacity(batch * seq_len);
    let mut flat_mask = Vec::with_capacity(batch * seq_len);
    for (ids, mask) in rows {
        let pad = seq_len - ids.len();
        flat_ids.extend(ids);
        flat_ids.extend(std::iter::repeat(pad_id).take(pad));
        flat_mask.extend(mask);
        flat_mask.extend(std::iter::repeat(0u32).take(pad));
    }
    let input_ids = Tensor::from_vec(flat_ids, (batch, seq_len), device)?;
    let attention_mask = Tensor::from_vec(flat_mask, (batch, seq_len), device)?;
    let token_type_ids = input_ids.zeros_like()?;
    Ok(EncodedBatch { input_ids, token_type_ids, attention_mask })
}
