//! Property-based tests for splitting, pivoting and factorization using proptest.

use std::collections::BTreeSet;

use ndarray::Array2;
use proptest::prelude::*;

use recolab_core::{Interaction, InteractionDataset, RatingScale};
use recolab_ml::{Factorizer, KFold, Nmf, NmfParams, NmfSolver, PivotTable, train_test_split};

/// Interactions with unique (user, product) keys and ratings on the 1..=5 scale.
fn interactions(max_len: usize) -> impl Strategy<Value = Vec<Interaction>> {
    prop::collection::btree_map((0i64..20, 0i64..20), 1u8..=5, 2..max_len).prop_map(|cells| {
        cells
            .into_iter()
            .map(|((user, product), rating)| Interaction::new(user, product, f64::from(rating)))
            .collect()
    })
}

fn dataset(records: Vec<Interaction>) -> InteractionDataset {
    InteractionDataset::new(records, RatingScale::default()).unwrap()
}

fn keys(records: &[Interaction]) -> Vec<(i64, i64)> {
    let mut keys: Vec<_> = records
        .iter()
        .map(|r| (r.user_id.0, r.product_id.0))
        .collect();
    keys.sort_unstable();
    keys
}

// --- Split properties ---

proptest! {
    #[test]
    fn split_is_deterministic(records in interactions(60), seed in any::<u64>()) {
        let ds = dataset(records);
        let a = train_test_split(&ds, 0.3, seed).unwrap();
        let b = train_test_split(&ds, 0.3, seed).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn split_partitions_the_dataset(records in interactions(60), seed in any::<u64>()) {
        let ds = dataset(records.clone());
        let split = train_test_split(&ds, 0.25, seed).unwrap();

        let expected_test = (0.25 * records.len() as f64).ceil() as usize;
        prop_assert_eq!(split.test.len(), expected_test);

        let train: BTreeSet<_> = keys(&split.train).into_iter().collect();
        let test: BTreeSet<_> = keys(&split.test).into_iter().collect();
        prop_assert!(train.is_disjoint(&test));

        let mut union = split.train.clone();
        union.extend(split.test.iter().copied());
        prop_assert_eq!(keys(&union), keys(&records));
    }

    #[test]
    fn kfold_test_folds_cover_the_dataset(records in interactions(40), k in 2usize..5) {
        prop_assume!(records.len() >= k);
        let ds = dataset(records.clone());
        let folds = KFold::new(k).split(&ds).unwrap();
        prop_assert_eq!(folds.len(), k);

        let sizes: Vec<usize> = folds.iter().map(|f| f.test.len()).collect();
        let (min, max) = (sizes.iter().min().unwrap(), sizes.iter().max().unwrap());
        prop_assert!(max - min <= 1);

        let all_tests: Vec<Interaction> = folds.iter().flat_map(|f| f.test.clone()).collect();
        prop_assert_eq!(keys(&all_tests), keys(&records));
        for fold in &folds {
            prop_assert_eq!(fold.train.len() + fold.test.len(), records.len());
        }
    }
}

// --- Pivot properties ---

proptest! {
    #[test]
    fn pivot_shape_matches_unique_ids(records in interactions(60)) {
        let users: BTreeSet<_> = records.iter().map(|r| r.user_id).collect();
        let products: BTreeSet<_> = records.iter().map(|r| r.product_id).collect();
        let pivot = PivotTable::from_dataset(&dataset(records.clone())).unwrap();
        prop_assert_eq!(pivot.shape(), (users.len(), products.len()));
        prop_assert_eq!(
            pivot.shape().0 * pivot.shape().1 - pivot.n_missing(),
            records.len()
        );
    }

    #[test]
    fn pivot_ignores_row_order(records in interactions(60)) {
        let mut reversed = records.clone();
        reversed.reverse();
        let a = PivotTable::from_dataset(&dataset(records)).unwrap().fill_missing(0.0);
        let b = PivotTable::from_dataset(&dataset(reversed)).unwrap().fill_missing(0.0);
        prop_assert_eq!(a, b);
    }
}

// --- Factorization properties ---

fn small_matrix() -> impl Strategy<Value = Array2<f64>> {
    (1usize..6, 1usize..6).prop_flat_map(|(rows, cols)| {
        prop::collection::vec(0.0f64..5.0, rows * cols).prop_map(move |values| {
            Array2::from_shape_vec((rows, cols), values).unwrap()
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn nmf_factors_are_non_negative(x in small_matrix(), mu in any::<bool>()) {
        let k = x.nrows().min(x.ncols());
        let solver = if mu {
            NmfSolver::MultiplicativeUpdate
        } else {
            NmfSolver::CoordinateDescent
        };
        let nmf = Nmf::new(NmfParams {
            n_components: k,
            max_iter: 50,
            solver,
            ..NmfParams::default()
        })
        .unwrap();
        let f = nmf.factorize(x.view()).unwrap();
        prop_assert_eq!(f.user_factors.dim(), (x.nrows(), k));
        prop_assert_eq!(f.product_factors.dim(), (k, x.ncols()));
        prop_assert!(f.user_factors.iter().all(|v| *v >= 0.0 && v.is_finite()));
        prop_assert!(f.product_factors.iter().all(|v| *v >= 0.0 && v.is_finite()));
        prop_assert!(f.reconstruction_err.is_finite());
    }

    #[test]
    fn nmf_rejects_rank_above_bound(x in small_matrix()) {
        let k = x.nrows().min(x.ncols()) + 1;
        let nmf = Nmf::new(NmfParams::with_components(k)).unwrap();
        prop_assert!(nmf.factorize(x.view()).is_err());
    }
}
