use std::collections::BTreeMap;

/// Sums rows sharing a key element-wise. This is how separately reported
/// subgroups (one row per sex) collapse into one row per township.
pub fn group_sum<I>(rows: I) -> BTreeMap<String, Vec<f64>>
where
    I: IntoIterator<Item = (String, Vec<f64>)>,
{
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (key, values) in rows {
        let sums = groups.entry(key).or_default();
        if sums.len() < values.len() {
            sums.resize(values.len(), 0.0);
        }
        for (sum, value) in sums.iter_mut().zip(values) {
            *sum += value;
        }
    }
    groups
}

pub fn ratio_percent(subgroup: f64, total: f64) -> f64 {
    if total == 0.0 {
        0.0
    } else {
        subgroup / total * 100.0
    }
}

/// Tertile (1..=3) of every value, cutting the ranks at their one- and
/// two-third quantiles. Ties are broken by position, so equal inputs may land
/// in different bins.
pub fn tertile_ranks(values: &[f64]) -> Vec<u8> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]).then(a.cmp(&b)));

    // 1-based rank r lands in bin 1 up to 1 + (n-1)/3 and in bin 2 up to
    // 1 + 2(n-1)/3, both inclusive; with 0-based ranks that is 3r <= k(n-1).
    let mut bins = vec![0u8; n];
    for (rank, &index) in order.iter().enumerate() {
        bins[index] = if 3 * rank <= n - 1 {
            1
        } else if 3 * rank <= 2 * (n - 1) {
            2
        } else {
            3
        };
    }
    bins
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuantileScheme {
    /// Inclusive upper bound of each class, ascending.
    pub breaks: Vec<f64>,
    pub classes: Vec<usize>,
    pub min: f64,
}

impl QuantileScheme {
    pub fn class_count(&self) -> usize {
        self.breaks.len()
    }

    /// `(lower, upper)` of every class; the first class starts at the minimum.
    pub fn bounds(&self) -> Vec<(f64, f64)> {
        let mut lower = self.min;
        self.breaks
            .iter()
            .map(|&upper| {
                let bound = (lower, upper);
                lower = upper;
                bound
            })
            .collect()
    }
}

/// Quantile classification into at most `k` classes. The class count drops
/// to the number of distinct values when there are fewer.
pub fn quantile_scheme(values: &[f64], k: usize) -> QuantileScheme {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mut distinct = sorted.clone();
    distinct.dedup();

    let k = k.min(distinct.len()).max(1);
    let mut breaks: Vec<f64> = (1..=k)
        .map(|i| percentile(&sorted, i as f64 / k as f64))
        .collect();
    breaks.dedup();

    let classes = values
        .iter()
        .map(|v| {
            breaks
                .iter()
                .position(|b| v <= b)
                .unwrap_or(breaks.len().saturating_sub(1))
        })
        .collect();

    QuantileScheme {
        breaks,
        classes,
        min: sorted.first().copied().unwrap_or(0.0),
    }
}

fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let position = q * (n - 1) as f64;
            let lower = position.floor() as usize;
            let upper = position.ceil() as usize;
            let weight = position - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}

pub fn bivariate_class(first: u8, second: u8) -> String {
    format!("{first}{second}")
}

/// 3x3 palette: the first digit grows red, the second grows blue.
pub const BIVARIATE_PALETTE: [(&str, &str); 9] = [
    ("11", "#e8e8e8"),
    ("21", "#e4acac"),
    ("31", "#c85a5a"),
    ("12", "#b0d5df"),
    ("22", "#ad9ea5"),
    ("32", "#985356"),
    ("13", "#64acbe"),
    ("23", "#627f8c"),
    ("33", "#574249"),
];

pub fn bivariate_color(class: &str) -> Option<&'static str> {
    BIVARIATE_PALETTE
        .iter()
        .find(|(key, _)| *key == class)
        .map(|(_, color)| *color)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str, values: &[f64]) -> (String, Vec<f64>) {
        (key.to_string(), values.to_vec())
    }

    #[test]
    fn group_sum_combines_subgroup_rows() {
        let groups = group_sum(vec![
            row("員林市", &[10.0, 2.0]),
            row("鹿港鎮", &[5.0, 1.0]),
            row("員林市", &[12.0, 3.0]),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["員林市"], vec![22.0, 5.0]);
        assert_eq!(groups["鹿港鎮"], vec![5.0, 1.0]);
    }

    #[test]
    fn group_sum_ignores_input_order() {
        let rows = vec![
            row("A", &[1.0, 7.0]),
            row("B", &[2.0, 0.0]),
            row("A", &[3.0, 1.0]),
            row("C", &[4.0, 4.0]),
            row("B", &[5.0, 9.0]),
        ];
        let forward = group_sum(rows.clone());
        let mut reversed = rows.clone();
        reversed.reverse();
        let mut rotated = rows;
        rotated.rotate_left(2);
        assert_eq!(forward, group_sum(reversed));
        assert_eq!(forward, group_sum(rotated));
    }

    #[test]
    fn ratio_guards_zero_total() {
        assert_eq!(ratio_percent(0.0, 0.0), 0.0);
        assert_eq!(ratio_percent(5.0, 0.0), 0.0);
        assert_eq!(ratio_percent(40.0, 40.0), 100.0);
        assert_eq!(ratio_percent(1.0, 4.0), 25.0);
    }

    #[test]
    fn tertiles_are_balanced_and_monotonic() {
        for n in 3..=20 {
            let values: Vec<f64> = (0..n).map(|i| ((i * 37) % 101) as f64).collect();
            let bins = tertile_ranks(&values);

            let mut sizes = [0usize; 3];
            for &bin in &bins {
                assert!((1..=3).contains(&bin));
                sizes[(bin - 1) as usize] += 1;
            }
            let max = sizes.iter().max().unwrap();
            let min = sizes.iter().min().unwrap();
            assert!(max - min <= 1, "n={n} sizes={sizes:?}");

            for i in 0..n {
                for j in 0..n {
                    if values[i] > values[j] {
                        assert!(bins[i] >= bins[j], "n={n} {} vs {}", values[i], values[j]);
                    }
                }
            }
        }
    }

    #[test]
    fn tertile_cuts_follow_rank_quantiles() {
        let five: Vec<f64> = (1..=5).map(f64::from).collect();
        assert_eq!(tertile_ranks(&five), vec![1, 1, 2, 3, 3]);

        let townships: Vec<f64> = (0..26).map(|i| ((i * 11) % 26) as f64).collect();
        let bins = tertile_ranks(&townships);
        let sizes: Vec<usize> = (1..=3u8)
            .map(|bin| bins.iter().filter(|&&b| b == bin).count())
            .collect();
        assert_eq!(sizes, vec![9, 8, 9]);
        // the 18th smallest value is 17
        let eighteenth = townships.iter().position(|&v| v == 17.0).unwrap();
        assert_eq!(bins[eighteenth], 3);
    }

    #[test]
    fn tertile_ties_break_by_first_occurrence() {
        assert_eq!(tertile_ranks(&[5.0, 5.0, 5.0]), vec![1, 2, 3]);
    }

    #[test]
    fn quantiles_shrink_to_distinct_values() {
        let scheme = quantile_scheme(&[10.0, 20.0, 30.0], 5);
        assert_eq!(scheme.class_count(), 3);
        assert_eq!(scheme.classes, vec![0, 1, 2]);
        assert_eq!(scheme.bounds()[0].0, 10.0);
        assert_eq!(scheme.bounds()[2].1, 30.0);
    }

    #[test]
    fn quantiles_are_monotonic_with_five_classes() {
        let values: Vec<f64> = (1..=20).map(|v| v as f64).collect();
        let scheme = quantile_scheme(&values, 5);
        assert_eq!(scheme.class_count(), 5);
        assert!(scheme.classes.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(scheme.classes.iter().filter(|&&c| c == 0).count(), 4);
    }

    #[test]
    fn bivariate_classes_map_to_palette() {
        assert_eq!(bivariate_class(2, 3), "23");
        assert_eq!(bivariate_color("23"), Some("#627f8c"));
        assert_eq!(bivariate_color("11"), Some("#e8e8e8"));
        assert_eq!(bivariate_color("40"), None);
    }
}
