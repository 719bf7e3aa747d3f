use rand::prelude::*;

use crate::data::{Dataset, FeatureColumn};

/// Additive effect of each `state` code in [`synthetic_additive`].
pub const STATE_EFFECTS: [f64; 4] = [0.0, 5.0, -3.0, 10.0];

/// Row indices `0..rows` in a seeded random order.
pub fn shuffled_rows(rows: usize, seed: u64) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    idx.shuffle(&mut rng);
    idx
}

/// Dataset with a known additive response.
///
/// Columns:
/// - `x1`: integers `0..10` (numeric)
/// - `x2`: integers `0..5` (numeric)
/// - `state`: codes `0..4` (categorical)
///
/// Response: `x1² + 2·x2 + STATE_EFFECTS[state]` plus uniform noise in
/// `[-noise, noise]`. Rows enumerate the full 200-cell grid cyclically before
/// shuffling, so any `rows >= 200` contains every combination. The partial
/// dependence of `x1` is `x1²`, of `x2` is `2·x2`, and of `state` is
/// `STATE_EFFECTS` relative to code 0.
pub fn synthetic_additive(rows: usize, seed: u64, noise: f64) -> Dataset {
    assert!(noise >= 0.0);
    let mut rng = StdRng::seed_from_u64(seed);

    let mut x1 = Vec::with_capacity(rows);
    let mut x2 = Vec::with_capacity(rows);
    let mut state = Vec::with_capacity(rows);
    let mut y = Vec::with_capacity(rows);

    for i in shuffled_rows(rows, seed) {
        let a = (i % 10) as f64;
        let b = ((i / 10) % 5) as f64;
        let s = (i / 50) % 4;
        let eps = if noise > 0.0 {
            (rng.r#gen::<f64>() * 2.0 - 1.0) * noise
        } else {
            0.0
        };
        x1.push(a);
        x2.push(b);
        state.push(s as i64);
        y.push(a * a + 2.0 * b + STATE_EFFECTS[s] + eps);
    }

    let columns = vec![
        FeatureColumn::numeric("x1", x1),
        FeatureColumn::numeric("x2", x2),
        FeatureColumn::categorical("state", state),
    ];
    match Dataset::new(columns, y) {
        Ok(ds) => ds,
        Err(e) => unreachable!("synthetic columns are consistent: {e}"),
    }
}
