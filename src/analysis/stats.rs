//! Rank correlation and descriptive statistics over plain `f64` columns.

use serde::Serialize;

/// Significance level for the `significant` flag.
pub const ALPHA: f64 = 0.05;

/// Spearman's ρ with its two-sided p-value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Correlation {
    pub coefficient: f64,
    pub p_value: f64,
    pub significant: bool,
    pub n: usize,
}

/// Spearman rank correlation between two equally long columns.
///
/// Returns `None` for fewer than three pairs or when either column is
/// constant, where ρ is undefined.
pub fn spearman(x: &[f64], y: &[f64]) -> Option<Correlation> {
    let n = x.len().min(y.len());
    if n < 3 {
        return None;
    }
    let rx = average_ranks(&x[..n]);
    let ry = average_ranks(&y[..n]);
    let rho = pearson(&rx, &ry)?;
    let p_value = t_test_p_value(rho, n);

    Some(Correlation {
        coefficient: rho,
        p_value,
        significant: p_value < ALPHA,
        n,
    })
}

/// 1-based ranks, ties sharing the mean of the positions they span.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }
        let rank = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            ranks[idx] = rank;
        }
        start = end + 1;
    }
    ranks
}

fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mean_x, b - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some((cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0))
}

/// Two-sided p-value of ρ under H0 using the t approximation with n - 2
/// degrees of freedom.
fn t_test_p_value(rho: f64, n: usize) -> f64 {
    let df = (n - 2) as f64;
    let denom = 1.0 - rho * rho;
    if denom <= f64::EPSILON {
        return 0.0;
    }
    let t2 = rho * rho * df / denom;
    regularized_incomplete_beta(df / 2.0, 0.5, df / (df + t2))
}

/// I_x(a, b) via the continued fraction expansion.
pub fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let front = (ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln()).exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITERATIONS: usize = 200;
    const EPS: f64 = 3e-14;
    const TINY: f64 = 1e-300;

    let guard = |v: f64| if v.abs() < TINY { TINY } else { v };
    let (qab, qap, qam) = (a + b, a + 1.0, a - 1.0);

    let mut c = 1.0;
    let mut d = 1.0 / guard(1.0 - qab * x / qap);
    let mut h = d;

    for m in 1..=MAX_ITERATIONS {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Lanczos approximation of ln Γ(x) for x > 0.
fn ln_gamma(x: f64) -> f64 {
    const COEFFICIENTS: [f64; 6] = [
        76.180_091_729_471_46,
        -86.505_320_329_416_77,
        24.014_098_240_830_91,
        -1.231_739_572_450_155,
        0.120_865_097_386_617_9e-2,
        -0.539_523_938_495_3e-5,
    ];
    let mut tmp = x + 5.5;
    tmp -= (x + 0.5) * tmp.ln();
    let mut series = 1.000_000_000_190_015;
    let mut y = x;
    for c in COEFFICIENTS {
        y += 1.0;
        series += c / y;
    }
    -tmp + (2.506_628_274_631_000_5 * series / x).ln()
}

/// Count, mean, median and range of a column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

pub fn summarize(values: &[f64]) -> Option<Summary> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let count = sorted.len();
    let median = if count % 2 == 1 {
        sorted[count / 2]
    } else {
        (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
    };
    Some(Summary {
        count,
        mean: sorted.iter().sum::<f64>() / count as f64,
        median,
        min: sorted[0],
        max: sorted[count - 1],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_average_ranks_with_ties() {
        assert_eq!(average_ranks(&[10.0, 20.0, 20.0, 30.0]), vec![1.0, 2.5, 2.5, 4.0]);
        assert_eq!(average_ranks(&[3.0, 1.0, 2.0]), vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_perfect_monotone_relation() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 4.0, 9.0, 16.0, 25.0];
        let corr = spearman(&x, &y).unwrap();
        assert!(close(corr.coefficient, 1.0, 1e-12));
        assert_eq!(corr.p_value, 0.0);
        assert!(corr.significant);

        let reversed: Vec<f64> = y.iter().rev().copied().collect();
        assert!(close(spearman(&x, &reversed).unwrap().coefficient, -1.0, 1e-12));
    }

    #[test]
    fn test_known_p_value() {
        let x: Vec<f64> = (1..=10).map(f64::from).collect();
        let y = [2.0, 1.0, 4.0, 3.0, 6.0, 5.0, 8.0, 7.0, 10.0, 9.0];
        let corr = spearman(&x, &y).unwrap();
        assert!(close(corr.coefficient, 0.939_393_9, 1e-6));
        assert!(close(corr.p_value, 5.484e-5, 1e-7));
    }

    #[test]
    fn test_p_value_for_moderate_rho() {
        assert!(close(t_test_p_value(0.5, 10), 0.141_113, 1e-5));
        assert!(close(t_test_p_value(0.0, 10), 1.0, 1e-12));
    }

    #[test]
    fn test_incomplete_beta_reference_values() {
        assert!(close(regularized_incomplete_beta(2.0, 3.0, 0.4), 0.5248, 1e-10));
        assert!(close(regularized_incomplete_beta(0.5, 0.5, 0.5), 0.5, 1e-10));
    }

    #[test]
    fn test_undefined_cases() {
        assert!(spearman(&[1.0, 2.0], &[1.0, 2.0]).is_none());
        assert!(spearman(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_none());
    }

    #[test]
    fn test_summarize() {
        let s = summarize(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(s.count, 4);
        assert_eq!(s.median, 2.5);
        assert_eq!(s.mean, 2.5);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 4.0);
        assert_eq!(summarize(&[7.0, 1.0, 3.0]).unwrap().median, 3.0);
        assert!(summarize(&[]).is_none());
    }
}
