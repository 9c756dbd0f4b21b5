use serde::{Deserialize, Serialize};

use portledge_core::{DomainError, DomainResult};

/// A resolved carton dimension triplet, centimeters, all sides positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartonSpec {
    pub side1_cm: f64,
    pub side2_cm: f64,
    pub side3_cm: f64,
}

impl CartonSpec {
    pub fn new(side1_cm: f64, side2_cm: f64, side3_cm: f64) -> DomainResult<Self> {
        for side in [side1_cm, side2_cm, side3_cm] {
            if !side.is_finite() || side <= 0.0 {
                return Err(DomainError::validation(
                    "carton sides must be positive, finite centimeters",
                ));
            }
        }
        Ok(Self {
            side1_cm,
            side2_cm,
            side3_cm,
        })
    }

    /// Volume of one carton in cubic meters.
    pub fn cbm_per_carton(&self) -> f64 {
        (self.side1_cm * self.side2_cm * self.side3_cm) / 1_000_000.0
    }
}

/// Raw packaging attributes at one level of the fallback chain
/// (line override, batch default, or SKU default). All independently nullable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PackagingSnapshot {
    pub side1_cm: Option<f64>,
    pub side2_cm: Option<f64>,
    pub side3_cm: Option<f64>,
    /// Legacy combined form, e.g. "60x40x35".
    pub legacy_dims: Option<String>,
}

impl PackagingSnapshot {
    pub fn is_empty(&self) -> bool {
        self.side1_cm.is_none()
            && self.side2_cm.is_none()
            && self.side3_cm.is_none()
            && self.legacy_dims.is_none()
    }
}

/// Parse the legacy "LxWxH" string (numeric, centimeters).
///
/// Accepts `x` or `X` separators and surrounding whitespace. Anything that
/// does not yield exactly three positive numbers is unparseable.
pub fn parse_legacy_dims(raw: &str) -> Option<CartonSpec> {
    let mut sides = [0.0f64; 3];
    let mut count = 0;
    for part in raw.split(['x', 'X']) {
        if count == 3 {
            return None;
        }
        let value: f64 = part.trim().parse().ok()?;
        sides[count] = value;
        count += 1;
    }
    if count != 3 {
        return None;
    }
    CartonSpec::new(sides[0], sides[1], sides[2]).ok()
}

/// Resolve one snapshot level.
///
/// Explicit sides win when all three are present and positive; otherwise the
/// legacy string is attempted; otherwise the level resolves to nothing.
pub fn resolve(snapshot: &PackagingSnapshot) -> Option<CartonSpec> {
    if let (Some(s1), Some(s2), Some(s3)) =
        (snapshot.side1_cm, snapshot.side2_cm, snapshot.side3_cm)
    {
        if let Ok(spec) = CartonSpec::new(s1, s2, s3) {
            return Some(spec);
        }
    }
    snapshot
        .legacy_dims
        .as_deref()
        .and_then(parse_legacy_dims)
}

/// Resolve across the full fallback chain: line override → batch → SKU.
pub fn resolve_chain(
    line: &PackagingSnapshot,
    batch: Option<&PackagingSnapshot>,
    sku: Option<&PackagingSnapshot>,
) -> Option<CartonSpec> {
    resolve(line)
        .or_else(|| batch.and_then(resolve))
        .or_else(|| sku.and_then(resolve))
}
