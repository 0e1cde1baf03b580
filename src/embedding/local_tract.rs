//! Tract-based local sentence encoder (fallback for musl and Intel Mac).
//!
//! Pure-Rust path: loads the ONNX export of all-MiniLM-L6-v2 with tract-onnx,
//! tokenizes with the tokenizers crate, mean-pools token states into one
//! L2-normalized vector per sentence. Runs in spawn_blocking.
#![cfg_attr(
    all(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract"),
    allow(dead_code)
)]

use anyhow::{bail, Result};
use std::path::PathBuf;
use tract_onnx::prelude::*;

use super::normalize_l2;

const ALL_MINILM_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";
const ALL_MINILM_DIMS: usize = 384;
const DEFAULT_MAX_LEN: usize = 256;

/// Model manifest: name -> (onnx path in repo, tokenizer path in repo, dims).
fn model_manifest(model_name: &str) -> Result<(&'static str, &'static str, usize)> {
    match model_name {
        "all-minilm-l6-v2" => Ok(("onnx/model.onnx", "tokenizer.json", ALL_MINILM_DIMS)),
        _ => bail!(
            "Tract backend supports only all-minilm-l6-v2 for now. Requested: '{}'",
            model_name
        ),
    }
}

fn cache_dir() -> Result<PathBuf> {
    let base = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let dir = PathBuf::from(base)
        .join(".cache")
        .join("evidence-harness")
        .join("models");
    std::fs::create_dir_all(&dir).map_err(|e| anyhow::anyhow!("Create cache dir: {}", e))?;
    Ok(dir)
}

fn download_to_cache(repo: &str, path: &str, cache_path: &std::path::Path) -> Result<()> {
    if cache_path.exists() {
        return Ok(());
    }
    let url = format!(
        "https://huggingface.co/{}/resolve/main/{}",
        repo,
        path.replace(' ', "%20")
    );
    let resp = reqwest::blocking::get(&url)
        .map_err(|e| anyhow::anyhow!("Download {}: {}", url, e))?
        .error_for_status()
        .map_err(|e| anyhow::anyhow!("Download {}: {}", url, e))?;
    let bytes = resp
        .bytes()
        .map_err(|e| anyhow::anyhow!("Read body: {}", e))?;
    if let Some(parent) = cache_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow::anyhow!("Create cache parent: {}", e))?;
    }
    std::fs::write(cache_path, &bytes).map_err(|e| anyhow::anyhow!("Write cache: {}", e))?;
    Ok(())
}

/// Ensure model and tokenizer are in cache; return (onnx path, tokenizer path).
fn ensure_cached(model_name: &str) -> Result<(PathBuf, PathBuf)> {
    let (onnx_rel, tokenizer_rel, _) = model_manifest(model_name)?;
    let dir = cache_dir()?;
    let model_dir = dir.join(model_name);
    let onnx_path = model_dir.join(onnx_rel);
    let tokenizer_path = model_dir.join(tokenizer_rel);
    download_to_cache(ALL_MINILM_REPO, onnx_rel, &onnx_path)?;
    download_to_cache(ALL_MINILM_REPO, tokenizer_rel, &tokenizer_path)?;
    Ok((onnx_path, tokenizer_path))
}

/// Encode `texts` with the tract backend, `batch_size` sentences per forward pass.
pub async fn embed_local_tract(
    model_name: &str,
    batch_size: usize,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let model_name = model_name.to_string();
    let batch_size = batch_size.max(1);
    let texts = texts.to_vec();

    tokio::task::spawn_blocking(move || run_tract_embed(&model_name, batch_size, &texts)).await?
}

fn run_tract_embed(model_name: &str, batch_size: usize, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    let (_, _, dims) = model_manifest(model_name)?;
    let (onnx_path, tokenizer_path) = ensure_cached(model_name)?;

    let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| anyhow::anyhow!("Load tokenizer {}: {}", tokenizer_path.display(), e))?;

    let model = tract_onnx::onnx()
        .model_for_path(onnx_path)
        .map_err(|e| anyhow::anyhow!("Load ONNX: {}", e))?
        .into_optimized()
        .map_err(|e| anyhow::anyhow!("Optimize: {}", e))?
        .into_runnable()
        .map_err(|e| anyhow::anyhow!("Build tract runnable: {}", e))?;
    let wants_token_types = model.model().inputs.len() > 2;

    let mut all_embeddings = Vec::with_capacity(texts.len());

    for chunk in texts.chunks(batch_size) {
        let encodings: Vec<_> = chunk
            .iter()
            .map(|s| {
                tokenizer
                    .encode(s.as_str(), true)
                    .map_err(|e| anyhow::anyhow!("Tokenize: {}", e))
            })
            .collect::<Result<Vec<_>>>()?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(1)
            .min(DEFAULT_MAX_LEN);

        let batch_size_actual = encodings.len();
        let mut input_ids = vec![0i64; batch_size_actual * max_len];
        let mut attention_mask = vec![0i64; batch_size_actual * max_len];

        for (i, enc) in encodings.iter().enumerate() {
            let ids = enc.get_ids();
            let len = ids.len().min(max_len);
            for (j, &id) in ids.iter().take(len).enumerate() {
                input_ids[i * max_len + j] = id as i64;
                attention_mask[i * max_len + j] = 1;
            }
        }

        let shape = (batch_size_actual, max_len);
        let mut inputs: TVec<TValue> = tvec!(
            to_tensor(shape, input_ids)?.into(),
            to_tensor(shape, attention_mask)?.into()
        );
        // BERT-style exports also take segment ids; a single sentence is all zeros.
        if wants_token_types {
            inputs.push(to_tensor(shape, vec![0i64; batch_size_actual * max_len])?.into());
        }
        let result = model.run(inputs)?;

        let output = result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No output tensor"))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| anyhow::anyhow!("Output to array: {}", e))?;

        // [batch, seq_len, dims] is last_hidden_state and needs mean pooling;
        // [batch, dims] is already a sentence embedding.
        match view.shape() {
            [rows, _] => {
                for i in 0..*rows {
                    let vec: Vec<f32> = view.slice(ndarray::s![i, ..]).iter().copied().collect();
                    all_embeddings.push(normalize_l2(vec));
                }
            }
            [_, seq_len, _] => {
                let seq_len = *seq_len;
                for (i, enc) in encodings.iter().enumerate() {
                    let valid_len = enc.get_ids().len().min(seq_len).min(max_len);
                    let tokens = (0..valid_len).map(|j| view.slice(ndarray::s![i, j, ..]));
                    all_embeddings.push(normalize_l2(mean_pool(tokens, dims)));
                }
            }
            other => bail!("Unexpected output shape: {:?}", other),
        }
    }

    Ok(all_embeddings)
}

fn to_tensor(shape: (usize, usize), data: Vec<i64>) -> Result<Tensor> {
    let arr = ndarray::Array2::from_shape_vec(shape, data)
        .map_err(|e| anyhow::anyhow!("Input shape: {}", e))?;
    Ok(arr.into())
}

/// Average token vectors, truncating each to `dims`.
fn mean_pool<'a, I, T>(tokens: I, dims: usize) -> Vec<f32>
where
    I: Iterator<Item = T>,
    T: IntoIterator<Item = &'a f32>,
{
    let mut sum = vec![0f32; dims];
    let mut count = 0f32;
    for token in tokens {
        for (k, &v) in token.into_iter().take(dims).enumerate() {
            sum[k] += v;
        }
        count += 1.0;
    }
    if count > 0.0 {
        for x in &mut sum {
            *x /= count;
        }
    }
    sum
}
