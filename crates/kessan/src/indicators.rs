//! Technical indicators over price series.

use kessan_core::{DataError, Result};
use polars::prelude::*;

/// Relative strength index over `period` bars.
///
/// Uses simple rolling means of gains and losses. The value at index `i`
/// covers the `period` price changes ending at `i`, so the first `period`
/// entries are `None`. `None` is also returned where the average loss is
/// zero or the window holds a missing close.
#[must_use]
pub fn rsi(closes: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 {
        return out;
    }

    let deltas: Vec<Option<f64>> = std::iter::once(None)
        .chain(closes.windows(2).map(|w| Some(w[1]? - w[0]?)))
        .collect();

    for end in period..closes.len() {
        let window = &deltas[end + 1 - period..=end];
        let Some(changes) = window.iter().copied().collect::<Option<Vec<f64>>>() else {
            continue;
        };
        let gain: f64 = changes.iter().map(|d| d.max(0.0)).sum::<f64>() / period as f64;
        let loss: f64 = changes.iter().map(|d| (-d).max(0.0)).sum::<f64>() / period as f64;
        if loss == 0.0 {
            continue;
        }
        let rs = gain / loss;
        out[end] = Some(100.0 - 100.0 / (1.0 + rs));
    }
    out
}

/// Simple moving average over `window` values; `None` until the window is
/// full or while it holds a missing value.
#[must_use]
pub fn sma(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|end| {
            if end + 1 < window {
                return None;
            }
            let slice = &values[end + 1 - window..=end];
            let sum = slice.iter().copied().sum::<Option<f64>>()?;
            Some(sum / window as f64)
        })
        .collect()
}

/// Appends an `rsi` column computed from `close` to an OHLCV frame.
///
/// Frames without a `close` column are returned unchanged.
pub fn with_rsi(df: &DataFrame, period: usize) -> Result<DataFrame> {
    let Ok(close) = df.column("close") else {
        return Ok(df.clone());
    };
    let close = close
        .cast(&DataType::Float64)
        .map_err(|e| DataError::Other(e.to_string()))?;
    let closes: Vec<Option<f64>> = close
        .f64()
        .map_err(|e| DataError::Other(e.to_string()))?
        .into_iter()
        .collect();

    let mut out = df.clone();
    out.with_column(Column::new("rsi".into(), rsi(&closes, period)))
        .map_err(|e| DataError::Other(e.to_string()))?;
    Ok(out)
}

/// Last non-missing value of `column`.
#[must_use]
pub fn latest_value(df: &DataFrame, column: &str) -> Option<f64> {
    let values = df.column(column).ok()?.cast(&DataType::Float64).ok()?;
    let values = values.f64().ok()?;
    values.into_iter().flatten().last()
}
