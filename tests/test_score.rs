use qrseval::{
    accuracy_from_outcomes, evaluate_record, evaluate_records, qrs_accuracy, qrs_accuracy_with,
    RecordOutcome, ScoreError, DEFAULT_TOLERANCE,
};

const FS: f64 = 500.0;

#[test]
fn perfect_predictions_score_one() {
    let truth: Vec<Vec<u32>> = (0..20_u32)
        .map(|r| (1..=9).map(|k| k * 500 + r * 7).collect())
        .collect();
    let acc = qrs_accuracy(&truth, &truth, FS).unwrap();
    assert_eq!(acc, 1.0);
}

#[test]
fn mismatched_record_counts_fail() {
    let truth = vec![vec![1_u32, 2]];
    let pred: Vec<Vec<u32>> = vec![];
    let err = qrs_accuracy(&truth, &pred, FS).unwrap_err();
    assert_eq!(err, ScoreError::RecordCountMismatch { truth: 1, pred: 0 });
}

#[test]
fn non_uniform_mix_aggregates_to_half() {
    // Flags 1.0, 0.3, 0.7, 0.0 in order.
    let truth: Vec<Vec<u32>> = vec![
        vec![1000, 2000, 3000], // clean
        vec![1000],             // one miss
        vec![1000],             // one stray at 1200
        vec![1000, 2000],       // two misses
    ];
    let pred: Vec<Vec<u32>> = vec![
        vec![1000, 2000, 3000],
        vec![],
        vec![1000, 1200],
        vec![],
    ];
    let acc = qrs_accuracy(&truth, &pred, FS).unwrap();
    assert_eq!(acc, 0.5);
}

#[test]
fn widening_tolerance_never_hurts() {
    // At ±37.5 samples the 2060 beat is a miss plus a stray (flag 0);
    // at ±75 it is a hit (flag 1).
    let truth = vec![vec![1000_u32, 2000, 3000]];
    let pred = vec![vec![1030_u32, 2060, 3000]];

    let narrow = qrs_accuracy_with(&truth, &pred, FS, DEFAULT_TOLERANCE).unwrap();
    let wide = qrs_accuracy_with(&truth, &pred, FS, 0.15).unwrap();
    assert_eq!(narrow, 0.0);
    assert_eq!(wide, 1.0);

    let o_narrow = evaluate_record(&truth[0], &pred[0], FS, DEFAULT_TOLERANCE);
    let o_wide = evaluate_record(&truth[0], &pred[0], FS, 0.15);
    assert!(o_wide.true_positive >= o_narrow.true_positive);
    assert!(o_wide.false_negative <= o_narrow.false_negative);
}

#[test]
fn outcomes_follow_input_order() {
    let truth = vec![vec![1000_u32], vec![1000, 2000], vec![]];
    let pred = vec![vec![], vec![1000, 2000], vec![700]];
    let outs = evaluate_records(&truth, &pred, FS, DEFAULT_TOLERANCE).unwrap();

    assert_eq!(outs.len(), 3);
    assert_eq!(outs[0].false_negative, 1);
    assert_eq!(outs[1].true_positive, 2);
    // Empty truth scores clean whatever was predicted.
    assert_eq!(outs[2], RecordOutcome::default());

    // (0.3 + 1 + 1) / 3 = 0.76666…
    approx::assert_abs_diff_eq!(accuracy_from_outcomes(&outs), 0.7667, epsilon = 1e-12);
}

#[test]
fn empty_record_sets_score_nan() {
    let truth: Vec<Vec<u32>> = vec![];
    let pred: Vec<Vec<u32>> = vec![];
    let outs = evaluate_records(&truth, &pred, FS, DEFAULT_TOLERANCE).unwrap();
    assert!(outs.is_empty());
    assert!(qrs_accuracy(&truth, &pred, FS).unwrap().is_nan());
}

#[test]
fn borrowed_and_owned_record_sequences_agree() {
    let truth = vec![vec![1000_u32, 2000], vec![1500]];
    let pred = vec![vec![1005_u32, 1995], vec![]];
    let as_slices: Vec<&[u32]> = truth.iter().map(|v| v.as_slice()).collect();
    let pred_slices: Vec<&[u32]> = pred.iter().map(|v| v.as_slice()).collect();

    let a = qrs_accuracy(&truth, &pred, FS).unwrap();
    let b = qrs_accuracy(&as_slices, &pred_slices, FS).unwrap();
    assert_eq!(a, b);
    assert_eq!(a, 0.65); // (1.0 + 0.3) / 2
}
