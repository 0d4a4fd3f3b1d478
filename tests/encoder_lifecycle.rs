use continuous_text_encoder::{
    persistence, AdaptationPolicy, ContinuousTextEncoder, EncoderError, EncoderParams, EncoderPhase, PersistedState,
    PersistencePaths, TextFrame,
};

fn params(k: usize) -> EncoderParams {
    EncoderParams {
        reduced_dimension: k,
        ..EncoderParams::default()
    }
}

fn frame(texts: &[&str]) -> TextFrame {
    TextFrame::from_texts("text", texts.iter().copied())
}

fn saving_to(path: &std::path::Path) -> PersistencePaths {
    PersistencePaths::new(None, Some(path.to_path_buf()))
}

#[test]
fn state_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("encoder.cbor");

    let mut first = ContinuousTextEncoder::new(params(2), saving_to(&path)).unwrap();
    first.fit_transform(&frame(&["cat dog", "dog bird", "bird cat"]), None).unwrap();
    let before = first.transform(&frame(&["cat bird"])).unwrap();
    assert!(path.exists());
    assert!(!dir.path().join("encoder.cbor.tmp").exists());

    let resumed = ContinuousTextEncoder::new(params(2), PersistencePaths::new(Some(path.clone()), None)).unwrap();
    assert_eq!(resumed.phase(), EncoderPhase::Ready);
    assert_eq!(resumed.transform(&frame(&["cat bird"])).unwrap(), before);
}

#[test]
fn restart_then_update_continues_the_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("encoder.cbor");

    let mut first = ContinuousTextEncoder::new(params(2), saving_to(&path)).unwrap();
    first.fit_transform(&frame(&["cat dog", "dog bird"]), None).unwrap();

    let both = PersistencePaths::new(Some(path.clone()), Some(path.clone()));
    let mut second = ContinuousTextEncoder::new(params(2), both).unwrap();
    second.fit_transform(&frame(&["bird bird fish"]), None).unwrap();

    let Ok(PersistedState::Fresh(state)) = persistence::load(&path) else {
        panic!("expected a fresh blob");
    };
    let column = &state.columns["text"];
    assert_eq!(column.vocabulary.len(), 4);
    assert_eq!(column.stats.doc_num, 3);
    let fish = column.stats.idf[column.vocabulary.id("fish").unwrap()];
    assert!((fish - (2.0f64.ln() + 1.0)).abs() < 1e-12);
    assert_eq!(column.corpus.as_ref().unwrap().n_cols(), 4);
}

#[test]
fn restart_with_other_ngram_order_encodes_as_before() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("encoder.cbor");
    let bigrams = EncoderParams {
        max_ngram_order: 2,
        ..params(2)
    };

    let mut first = ContinuousTextEncoder::new(bigrams, saving_to(&path)).unwrap();
    first.fit(&frame(&["red apple pie", "green apple tart", "red cherry pie"]), None).unwrap();
    let before = first.transform(&frame(&["red apple pie"])).unwrap();

    let both = PersistencePaths::new(Some(path.clone()), Some(path));
    let mut resumed = ContinuousTextEncoder::new(params(2), both).unwrap();
    assert_eq!(resumed.params().max_ngram_order, 2);
    assert_eq!(resumed.transform(&frame(&["red apple pie"])).unwrap(), before);

    resumed.update(&frame(&["green cherry tart"]), None, AdaptationPolicy::ExactRefit).unwrap();
    let state = resumed.snapshot().unwrap();
    assert!(state.columns["text"].vocabulary.contains("cherry tart"));
}

#[test]
fn changed_dimension_rebuilds_the_basis_on_update() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("encoder.cbor");

    let mut old = ContinuousTextEncoder::new(params(2), saving_to(&path)).unwrap();
    old.fit(&frame(&["red apple", "green apple", "red car", "fast car"]), None).unwrap();

    let mut new = ContinuousTextEncoder::new(params(3), PersistencePaths::new(Some(path.clone()), Some(path))).unwrap();
    assert_eq!(new.phase(), EncoderPhase::Degraded);
    assert!(matches!(
        new.transform(&frame(&["red apple"])),
        Err(EncoderError::BasisUnavailable(_))
    ));

    let out = new.update(&frame(&["green car"]), None, AdaptationPolicy::ExactRefit).unwrap();
    assert_eq!(out.width(), 3);
    let state = new.snapshot().unwrap();
    let column = &state.columns["text"];
    assert_eq!(column.basis.as_ref().unwrap().k(), 3);
    assert_eq!(column.vocabulary.id("red"), Some(0));
    assert_eq!(column.stats.doc_num, 5);
}

#[test]
fn blend_step_bounds() {
    let base = ["cat dog", "dog bird", "bird cat", "cat fish"];
    let batch = frame(&["eel cat eel", "dog eel"]);

    let run = |step: f64| {
        let mut enc = ContinuousTextEncoder::new(
            EncoderParams {
                reduced_dimension: 2,
                blend_step_size: step,
                ..EncoderParams::default()
            },
            PersistencePaths::default(),
        )
        .unwrap();
        enc.fit(&frame(&base), None).unwrap();
        let before = enc.snapshot().unwrap();
        enc.update(&batch, None, AdaptationPolicy::IncrementalBlend).unwrap();
        (before, enc.snapshot().unwrap())
    };

    let (before, after) = run(0.0);
    let old = before.columns["text"].basis.as_ref().unwrap().components();
    let new = after.columns["text"].basis.as_ref().unwrap().components();
    for r in 0..old.rows() {
        for c in 0..old.cols() {
            assert!((old.get(r, c) - new.get(r, c)).abs() < 1e-12);
        }
    }
    assert_eq!(new.cols(), 5);

    let (_, after) = run(1.0);
    assert_eq!(after.columns["text"].basis.as_ref().unwrap().n_terms(), 5);
    assert!(after.columns["text"].corpus.is_none());
}

#[test]
fn oov_rows_encode_to_zero_after_updates() {
    let mut enc = ContinuousTextEncoder::new(params(2), PersistencePaths::default()).unwrap();
    enc.fit(&frame(&["alpha beta", "beta gamma", "gamma alpha"]), None).unwrap();
    enc.update(&frame(&["delta alpha"]), None, AdaptationPolicy::IncrementalBlend).unwrap();
    let out = enc.transform(&frame(&["omega psi"])).unwrap();
    assert_eq!(out.rows, vec![vec![0.0, 0.0]]);
}

#[test]
fn failed_save_keeps_previous_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("encoder.cbor");
    let mut enc = ContinuousTextEncoder::new(params(2), saving_to(&path)).unwrap();
    enc.fit(&frame(&["cat dog", "dog bird"]), None).unwrap();
    let before = enc.snapshot().unwrap();
    let on_disk = std::fs::read(&path).unwrap();

    // a directory in place of the blob makes the rename fail
    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir(&path).unwrap();
    std::fs::write(path.join("occupied"), b"x").unwrap();

    let err = enc.update(&frame(&["fish"]), None, AdaptationPolicy::ExactRefit).unwrap_err();
    assert!(matches!(err, EncoderError::PersistenceIo { .. }));
    assert_eq!(*enc.snapshot().unwrap(), *before);
    assert!(!dir.path().join("encoder.cbor.tmp").exists());
    assert!(!on_disk.is_empty());
}

#[test]
fn multi_column_frames_encode_side_by_side() {
    let mut enc = ContinuousTextEncoder::new(params(2), PersistencePaths::default()).unwrap();
    let batch = TextFrame::new()
        .with_column("title", vec![Some("red apple".into()), Some("green pear".into()), None])
        .with_column("body", vec![Some("sweet fruit".into()), Some("sour fruit".into()), Some("ripe pear".into())]);
    let out = enc.fit(&batch, None).unwrap();
    assert_eq!(out.feature_names, vec!["title_svd0", "title_svd1", "body_svd0", "body_svd1"]);
    assert_eq!(out.n_rows(), 3);
    assert_eq!(&out.rows[2][..2], &[0.0, 0.0]);

    let swapped = TextFrame::new().with_column("title", vec![Some("red".into())]);
    assert!(matches!(enc.transform(&swapped), Err(EncoderError::MalformedInput(_))));
}

#[test]
fn discard_removes_the_blob() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("encoder.cbor");
    let mut enc = ContinuousTextEncoder::new(params(2), saving_to(&path)).unwrap();
    enc.fit(&frame(&["cat dog", "dog bird"]), None).unwrap();
    enc.discard().unwrap();
    assert!(!path.exists());
    assert_eq!(enc.phase(), EncoderPhase::Uninitialized);
}

#[test]
fn missing_load_path_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let paths = PersistencePaths::new(Some(dir.path().join("absent.cbor")), None);
    assert!(matches!(
        ContinuousTextEncoder::new(params(2), paths),
        Err(EncoderError::PersistenceIo { .. })
    ));
}
