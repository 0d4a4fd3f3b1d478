use std::{env, fs, io, path::Path, time::Instant};

use continuous_text_encoder::{
    AdaptationPolicy, ContinuousTextEncoder, EncoderParams, PersistencePaths, TextFrame,
};

// documents fed per update call
const BATCH_SIZE: usize = 64;

fn read_documents<P: AsRef<Path>>(dir: P) -> io::Result<Vec<String>> {
    let mut files: Vec<_> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files
        .iter()
        .filter_map(|p| fs::read_to_string(p).ok())
        .filter(|text| !text.trim().is_empty())
        .collect())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let Some(dir) = args.next() else {
        eprintln!("usage: continuous_update <docs-dir> [exact|blend]");
        return Ok(());
    };
    let policy = match args.next().as_deref() {
        Some("blend") => AdaptationPolicy::IncrementalBlend,
        _ => AdaptationPolicy::ExactRefit,
    };

    let params = EncoderParams {
        reduced_dimension: 16,
        default_policy: policy,
        ..EncoderParams::default()
    };
    // TEXT_ENCODER_LOAD / TEXT_ENCODER_SAVE
    let mut encoder = ContinuousTextEncoder::new(params, PersistencePaths::from_env())?;

    eprintln!("[stage] reading {dir} ...");
    let docs = read_documents(&dir)?;
    if docs.is_empty() {
        eprintln!("[warn] no documents found");
        return Ok(());
    }
    eprintln!("[stage] encoding {} docs in batches of {BATCH_SIZE} ({policy:?})", docs.len());

    let start = Instant::now();
    for (i, chunk) in docs.chunks(BATCH_SIZE).enumerate() {
        let batch = TextFrame::from_texts("text", chunk.iter().cloned());
        let encoded = encoder.fit_transform(&batch, None)?;
        let state = encoder.snapshot().ok_or("encoder has no state after an update")?;
        let vocab = state.columns.values().map(|c| c.width()).sum::<usize>();
        eprintln!(
            "[batch {i}] rows={} width={} docs={} vocab={} | {:.2}s",
            encoded.n_rows(),
            encoded.width(),
            state.doc_num,
            vocab,
            start.elapsed().as_secs_f64()
        );
    }

    let head_docs = TextFrame::from_texts("text", docs.iter().take(3).cloned());
    for (i, row) in encoder.transform(&head_docs)?.rows.iter().enumerate() {
        let head: Vec<String> = row.iter().take(4).map(|v| format!("{v:.4}")).collect();
        println!("doc{i}: [{} ...]", head.join(", "));
    }
    Ok(())
}
