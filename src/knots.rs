use std::fmt;
use thiserror::Error;

/// An error produced while constructing a [`KnotVector`].
#[derive(Error, Debug)]
pub enum KnotError {
    #[error("Knot range is degenerate: start ({0}) must be strictly less than end ({1}).")]
    DegenerateRange(f64, f64),

    #[error("Segment count must be at least 1 to generate uniform knots.")]
    NoSegments,

    #[error("Knot values must be finite, but {0} was supplied.")]
    NonFiniteValue(f64),

    #[error("At least two distinct breakpoints are required, but {0} were supplied.")]
    TooFewBreakpoints(usize),

    #[error(
        "Left padding point {point} must lie strictly below the first breakpoint {boundary}."
    )]
    LeftPaddingNotBelow { point: f64, boundary: f64 },

    #[error(
        "Right padding point {point} must lie strictly above the last breakpoint {boundary}."
    )]
    RightPaddingNotAbove { point: f64, boundary: f64 },
}

/// An immutable, sorted sequence of breakpoints with symmetric padding.
///
/// B-spline segments are defined on half-open intervals `[k_i, k_{i+1})`, so
/// evaluating a spline up to the end of the data range needs extra knots
/// beyond both boundaries. A `KnotVector` stores
///
/// ```text
/// k_{-p}, ..., k_{-1}, k_0, k_1, ..., k_{count-1}, k_{count}, ..., k_{count-1+p}
/// -------------------  ---------------------------  -----------------------------
///       padding                breakpoints                    padding
/// ```
///
/// and offsets every external index by the padding count `p`, so that index
/// `0` always refers to the first unpadded breakpoint. Out-of-range index
/// lookups clamp to the nearest stored value rather than failing.
#[derive(Debug, Clone, PartialEq)]
pub struct KnotVector {
    knots: Vec<f64>,
    padding: usize,
}

impl KnotVector {
    /// Generates uniformly spaced knots over `[start, end]` split into
    /// `segments` equal intervals, with `padding` extra knots continuing the
    /// grid beyond each boundary.
    ///
    /// The unpadded breakpoints are `start + (end - start) * i / segments`
    /// for `i` in `0..=segments`, so the vector has `segments + 1` unpadded
    /// entries and `segments + 1 + 2 * padding` entries in total.
    pub fn uniform(
        start: f64,
        end: f64,
        segments: usize,
        padding: usize,
    ) -> Result<Self, KnotError> {
        if !start.is_finite() {
            return Err(KnotError::NonFiniteValue(start));
        }
        if !end.is_finite() {
            return Err(KnotError::NonFiniteValue(end));
        }
        if segments == 0 {
            return Err(KnotError::NoSegments);
        }
        if start >= end {
            return Err(KnotError::DegenerateRange(start, end));
        }

        let p = padding as i64;
        let span = end - start;
        let mut knots = Vec::with_capacity(segments + 1 + 2 * padding);
        for i in -p..=segments as i64 + p {
            knots.push(start + span * i as f64 / segments as f64);
        }
        Ok(Self { knots, padding })
    }

    #[cfg(test)]
    pub(crate) fn from_raw(knots: Vec<f64>, padding: usize) -> Self {
        Self { knots, padding }
    }

    /// Total stored length, padding included.
    pub fn len(&self) -> usize {
        self.knots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.knots.is_empty()
    }

    /// Number of padding knots on each end.
    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Number of unpadded breakpoints.
    pub fn count(&self) -> usize {
        self.knots.len() - 2 * self.padding
    }

    /// Value at external index `idx`, where index `0` is the first unpadded
    /// breakpoint. Indices beyond either end clamp to the outermost stored
    /// value.
    pub fn at(&self, idx: i64) -> f64 {
        let shifted = idx + self.padding as i64;
        if shifted < 0 {
            return self.knots[0];
        }
        if shifted >= self.knots.len() as i64 {
            return self.knots[self.knots.len() - 1];
        }
        self.knots[shifted as usize]
    }

    /// Largest external index `i` with `at(i) <= x < at(i + 1)`, found by
    /// binary search over the stored sequence: the first stored position
    /// whose value is `>= x`, minus one, minus the padding. Values below the
    /// first stored knot map to `-padding`; values at or beyond the last map
    /// to the last valid interval index.
    pub fn index_of(&self, x: f64) -> i64 {
        let pos = self.knots.partition_point(|&k| k < x);
        if pos == 0 {
            return -(self.padding as i64);
        }
        pos as i64 - 1 - self.padding as i64
    }

    /// Whether the stored sequence is monotonically non-decreasing.
    pub fn is_sorted(&self) -> bool {
        self.knots.windows(2).all(|w| w[0] <= w[1])
    }

    /// Whether the stored sequence is strictly increasing (implies sorted).
    pub fn is_unique(&self) -> bool {
        !self.knots.is_empty() && self.knots.windows(2).all(|w| w[0] < w[1])
    }
}

impl fmt::Display for KnotVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KnotVector(count: {}, padding: {})[",
            self.count(),
            self.padding
        )?;
        for (i, v) in self.knots.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, "]")
    }
}

/// Append-style builder for a [`KnotVector`] over arbitrary breakpoints.
///
/// Breakpoints are deduplicated and sorted at build time. Padding points may
/// be supplied explicitly for either side; if the two sides end up with
/// different counts, the shorter side is extended by continuing its outermost
/// spacing outward until the padding is symmetric.
#[derive(Debug, Default)]
pub struct ArbitraryKnotBuilder {
    breakpoints: Vec<f64>,
    left_padding: Vec<f64>,
    right_padding: Vec<f64>,
}

impl ArbitraryKnotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one breakpoint.
    pub fn knot(mut self, x: f64) -> Self {
        self.breakpoints.push(x);
        self
    }

    /// Appends a batch of breakpoints.
    pub fn knots(mut self, xs: &[f64]) -> Self {
        self.breakpoints.extend_from_slice(xs);
        self
    }

    /// Appends an explicit padding point below the breakpoint range.
    pub fn left_padding(mut self, x: f64) -> Self {
        self.left_padding.push(x);
        self
    }

    /// Appends an explicit padding point above the breakpoint range.
    pub fn right_padding(mut self, x: f64) -> Self {
        self.right_padding.push(x);
        self
    }

    pub fn build(self) -> Result<KnotVector, KnotError> {
        let Self {
            mut breakpoints,
            mut left_padding,
            mut right_padding,
        } = self;

        for &v in breakpoints
            .iter()
            .chain(left_padding.iter())
            .chain(right_padding.iter())
        {
            if !v.is_finite() {
                return Err(KnotError::NonFiniteValue(v));
            }
        }

        sort_dedup(&mut breakpoints);
        if breakpoints.len() < 2 {
            return Err(KnotError::TooFewBreakpoints(breakpoints.len()));
        }
        let lo = breakpoints[0];
        let hi = breakpoints[breakpoints.len() - 1];

        sort_dedup(&mut left_padding);
        sort_dedup(&mut right_padding);
        for &v in &left_padding {
            if v >= lo {
                return Err(KnotError::LeftPaddingNotBelow {
                    point: v,
                    boundary: lo,
                });
            }
        }
        for &v in &right_padding {
            if v <= hi {
                return Err(KnotError::RightPaddingNotAbove {
                    point: v,
                    boundary: hi,
                });
            }
        }

        let padding = left_padding.len().max(right_padding.len());

        // Equalize the two sides by extending the shorter one outward with
        // its outermost spacing. The extension is strictly monotone: padding
        // values extrapolate past the boundary, they never repeat it.
        while left_padding.len() < padding {
            let step = match left_padding.len() {
                0 => breakpoints[1] - lo,
                1 => lo - left_padding[0],
                _ => left_padding[1] - left_padding[0],
            };
            let outermost = left_padding.first().copied().unwrap_or(lo);
            left_padding.insert(0, outermost - step);
        }
        while right_padding.len() < padding {
            let step = match right_padding.len() {
                0 => hi - breakpoints[breakpoints.len() - 2],
                1 => right_padding[0] - hi,
                _ => {
                    let n = right_padding.len();
                    right_padding[n - 1] - right_padding[n - 2]
                }
            };
            let outermost = right_padding.last().copied().unwrap_or(hi);
            right_padding.push(outermost + step);
        }

        let mut knots = Vec::with_capacity(breakpoints.len() + 2 * padding);
        knots.extend_from_slice(&left_padding);
        knots.extend_from_slice(&breakpoints);
        knots.extend_from_slice(&right_padding);
        Ok(KnotVector { knots, padding })
    }
}

fn sort_dedup(values: &mut Vec<f64>) {
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup();
}
