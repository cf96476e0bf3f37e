// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property-based invariants for the correction, block construction, and
//! shuffle primitives.

use std::collections::BTreeSet;

use ncpd_core::{StableRng, shuffled_indices};
use ncpd_detect::{benjamini_hochberg, enclosing_blocks};
use proptest::prelude::*;

fn raw_p_values() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0f64..=1.0, 0..20)
}

/// Strictly ascending interior split times for a series of `n_rows`.
fn interior_times() -> impl Strategy<Value = (Vec<usize>, usize)> {
    (20usize..200).prop_flat_map(|n_rows| {
        prop::collection::btree_set(1..n_rows - 1, 0..6)
            .prop_map(move |set| (set.into_iter().collect(), n_rows))
    })
}

proptest! {
    #[test]
    fn bh_adjusted_never_drops_below_raw(raw in raw_p_values()) {
        let adjusted = benjamini_hochberg(&raw);
        prop_assert_eq!(adjusted.len(), raw.len());
        for (r, a) in raw.iter().zip(adjusted.iter()) {
            prop_assert!(a >= r, "adjusted {} below raw {}", a, r);
            prop_assert!(*a <= 1.0, "adjusted {} above 1", a);
        }
    }

    #[test]
    fn bh_is_monotone_in_raw_order(raw in raw_p_values()) {
        let adjusted = benjamini_hochberg(&raw);

        let mut order: Vec<usize> = (0..raw.len()).collect();
        order.sort_by(|&a, &b| raw[a].total_cmp(&raw[b]));
        for pair in order.windows(2) {
            prop_assert!(
                adjusted[pair[0]] <= adjusted[pair[1]],
                "adjusted sequence not non-decreasing in raw order: {:?}",
                adjusted
            );
        }
    }

    #[test]
    fn enclosing_blocks_partition_the_series((times, n_rows) in interior_times()) {
        let blocks = enclosing_blocks(&times, n_rows).expect("interior ascending times");
        prop_assert_eq!(blocks.len(), times.len());

        if let (Some(&(first_start, _)), Some(&(_, last_end))) = (blocks.first(), blocks.last()) {
            prop_assert_eq!(first_start, 0);
            prop_assert_eq!(last_end, n_rows);
        }
        for pair in blocks.windows(2) {
            prop_assert_eq!(pair[0].1, pair[1].0, "blocks must tile contiguously");
        }
        for (&time, &(start, end)) in times.iter().zip(blocks.iter()) {
            prop_assert!(start < end);
            prop_assert!(
                start <= time && time <= end,
                "split {} outside its block [{}, {})",
                time,
                start,
                end
            );
        }
    }

    #[test]
    fn shuffles_are_permutations(seed in any::<u64>(), len in 0usize..200) {
        let mut rng = StableRng::new(seed);
        let order = shuffled_indices(&mut rng, len).expect("shuffle should succeed");
        prop_assert_eq!(order.len(), len);

        let seen: BTreeSet<usize> = order.iter().copied().collect();
        prop_assert_eq!(seen.len(), len, "duplicate indices in shuffle");
        if let (Some(&min), Some(&max)) = (seen.first(), seen.last()) {
            prop_assert_eq!(min, 0);
            prop_assert_eq!(max, len - 1);
        }
    }
}
