//! Unit normalization.
//!
//! Raw values are rescaled to canonical ones (`value = raw * 10^scale`) and
//! tagged with a [`CanonicalUnit`] so currency, per-share, share-count and
//! ratio figures never end up in the same series. The display scale comes
//! from an inline `scale`, or failing that from `decimals`.

use kessan_core::{
    CanonicalUnit, DisplayScale, NormalizedFact, PipelineError, ResolvedFact, UnitKind,
};

/// Maps a raw unit (measure or bare EDINET unit id) to a canonical unit.
#[must_use]
pub fn parse_unit(raw: &str) -> Option<CanonicalUnit> {
    let raw = raw.trim();
    if let Some((numerator, denominator)) = raw.split_once('/') {
        return match (parse_measure(numerator)?, parse_measure(denominator)?) {
            (CanonicalUnit::Currency(code), CanonicalUnit::Shares) => {
                Some(CanonicalUnit::PerShare(code))
            }
            _ => None,
        };
    }
    if let Some(code) = raw.strip_suffix("PerShares").or_else(|| raw.strip_suffix("PerShare")) {
        return currency_code(code).map(CanonicalUnit::PerShare);
    }
    parse_measure(raw)
}

fn parse_measure(measure: &str) -> Option<CanonicalUnit> {
    let measure = measure.trim();
    let local = measure.rsplit(':').next().unwrap_or(measure);
    match local {
        "shares" | "Shares" => Some(CanonicalUnit::Shares),
        "pure" | "Pure" => Some(CanonicalUnit::Pure),
        code => currency_code(code).map(CanonicalUnit::Currency),
    }
}

fn currency_code(code: &str) -> Option<String> {
    (code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())).then(|| code.to_string())
}

/// Rescales a resolved fact and checks its unit against the metric's class.
pub fn normalize(resolved: ResolvedFact, expected: UnitKind) -> Result<NormalizedFact, PipelineError> {
    let incompatible = |reason: String| PipelineError::IncompatibleUnit {
        metric: resolved.fact.metric.to_string(),
        unit: resolved.fact.unit.clone(),
        reason,
    };

    let unit = parse_unit(&resolved.fact.unit)
        .ok_or_else(|| incompatible("unrecognized unit".to_string()))?;
    if unit.kind() != expected {
        return Err(incompatible(format!(
            "expected {}, found {}",
            expected,
            unit.kind()
        )));
    }
    // Inline `scale` wins; otherwise `decimals` says how the figure was rounded.
    let scale = match (resolved.fact.scale, resolved.fact.decimals) {
        (0, Some(decimals)) => DisplayScale::from_decimals(decimals),
        (exponent, _) => DisplayScale::from_exponent(exponent)
            .ok_or_else(|| incompatible(format!("unsupported scale exponent {}", exponent)))?,
    };

    let value = scale.to_canonical(resolved.fact.value);
    Ok(NormalizedFact {
        resolved,
        value,
        unit,
        scale,
    })
}
