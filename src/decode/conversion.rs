//! Numeric and display conversions resolved from CC blocks.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::{
    Error, Result, UnsupportedPolicy,
    blocks::{BlockPayload, ConversionBlock, ConversionType},
    parsing::BlockStore,
};

/// Raw-to-physical numeric transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueConversionSpec {
    Identity,
    /// `raw * scale + offset`
    Linear { scale: f64, offset: f64 },
    /// `(n0 + n1*t + n2*t^2) / (d0 + d1*t + d2*t^2)`
    Rational3 {
        n0: f64,
        n1: f64,
        n2: f64,
        d0: f64,
        d1: f64,
        d2: f64,
    },
}

impl ValueConversionSpec {
    /// Linear transform, folded to identity for scale 1 and offset 0.
    pub fn linear(scale: f64, offset: f64) -> Self {
        if scale == 1.0 && offset == 0.0 {
            ValueConversionSpec::Identity
        } else {
            ValueConversionSpec::Linear { scale, offset }
        }
    }

    pub fn rational3(n0: f64, n1: f64, n2: f64, d0: f64, d1: f64, d2: f64) -> Self {
        ValueConversionSpec::Rational3 {
            n0,
            n1,
            n2,
            d0,
            d1,
            d2,
        }
    }

    /// Builds the transform of an MDF rational conversion
    /// `(P1*x^2 + P2*x + P3) / (P4*x^2 + P5*x + P6)`.
    ///
    /// A constant denominator without quadratic numerator term folds to
    /// [`Self::linear`].
    pub fn from_mdf_rational(p: [f64; 6]) -> Self {
        if p[0] == 0.0 && p[3] == 0.0 && p[4] == 0.0 && p[5] != 0.0 {
            return Self::linear(p[1] / p[5], p[2] / p[5]);
        }
        Self::rational3(p[2], p[1], p[0], p[5], p[4], p[3])
    }

    #[inline]
    pub fn apply(&self, t: f64) -> f64 {
        match *self {
            ValueConversionSpec::Identity => t,
            ValueConversionSpec::Linear { scale, offset } => t * scale + offset,
            ValueConversionSpec::Rational3 {
                n0,
                n1,
                n2,
                d0,
                d1,
                d2,
            } => (n0 + n1 * t + n2 * t * t) / (d0 + d1 * t + d2 * t * t),
        }
    }
}

/// How a physical value is shown as text.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayConversionSpec {
    /// Plain number formatting.
    Identity,
    /// Exact-match lookup from physical value to label.
    LookupTable {
        entries: Vec<(f64, String)>,
        default: Option<String>,
    },
}

impl DisplayConversionSpec {
    pub fn display(&self, value: f64) -> String {
        match self {
            DisplayConversionSpec::Identity => value.to_string(),
            DisplayConversionSpec::LookupTable { entries, default } => entries
                .iter()
                .find(|(key, _)| *key == value)
                .map(|(_, text)| text.clone())
                .or_else(|| default.clone())
                .unwrap_or_else(|| value.to_string()),
        }
    }
}

/// A CC block turned into decoder terms.
#[derive(Debug, Clone)]
pub struct ResolvedConversion {
    pub value: Arc<ValueConversionSpec>,
    pub display: Arc<DisplayConversionSpec>,
    /// Set when an unsupported kind was replaced by identity.
    pub degraded: bool,
}

impl ResolvedConversion {
    fn numeric(value: ValueConversionSpec) -> Self {
        Self {
            value: Arc::new(value),
            display: Arc::new(DisplayConversionSpec::Identity),
            degraded: false,
        }
    }
}

/// Resolved conversions keyed by CC block offset.
///
/// Channels that link the same CC block share one resolved instance. CC
/// blocks never change once the file is open, so entries are never evicted.
#[derive(Debug)]
pub struct ConversionCache {
    identity: Arc<ResolvedConversion>,
    entries: RwLock<HashMap<u64, Arc<ResolvedConversion>>>,
}

impl Default for ConversionCache {
    fn default() -> Self {
        Self {
            identity: Arc::new(ResolvedConversion::numeric(ValueConversionSpec::Identity)),
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl ConversionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The conversion linked at `offset` (identity for the null link).
    pub fn resolve(
        &self,
        offset: u64,
        store: &BlockStore,
        policy: UnsupportedPolicy,
    ) -> Result<Arc<ResolvedConversion>> {
        if offset == 0 {
            return Ok(Arc::clone(&self.identity));
        }
        if let Some(hit) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&offset)
        {
            return Ok(Arc::clone(hit));
        }

        let block = store.require(offset, "conversion")?;
        let resolved = Arc::new(build(block.as_conversion()?, offset, store, policy)?);
        debug!(offset, conversion = ?resolved.value, degraded = resolved.degraded, "resolved conversion");

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(entries.entry(offset).or_insert(resolved)))
    }
}

fn build(
    cc: &ConversionBlock,
    offset: u64,
    store: &BlockStore,
    policy: UnsupportedPolicy,
) -> Result<ResolvedConversion> {
    let needs = |count: usize| -> Result<()> {
        if cc.values.len() < count {
            return Err(Error::corrupt(
                offset,
                format!(
                    "{:?} conversion needs {count} parameters, found {}",
                    cc.conversion_type,
                    cc.values.len()
                ),
            ));
        }
        Ok(())
    };

    match cc.conversion_type {
        ConversionType::Identity => Ok(ResolvedConversion::numeric(ValueConversionSpec::Identity)),
        ConversionType::Linear => {
            needs(2)?;
            Ok(ResolvedConversion::numeric(ValueConversionSpec::linear(
                cc.values[1],
                cc.values[0],
            )))
        }
        ConversionType::Rational => {
            needs(6)?;
            let mut p = [0.0; 6];
            p.copy_from_slice(&cc.values[..6]);
            Ok(ResolvedConversion::numeric(
                ValueConversionSpec::from_mdf_rational(p),
            ))
        }
        ConversionType::TableLookupInterp
            if cc.values.len() == 4
                && cc.values[0] == cc.values[1]
                && cc.values[2] == cc.values[3] =>
        {
            Ok(ResolvedConversion::numeric(ValueConversionSpec::Identity))
        }
        ConversionType::ValueToText => lookup(cc, &cc.values, offset, store, policy),
        // Ranges holding one value each read as a value table.
        ConversionType::RangeToText
            if cc.values.len() % 2 == 0
                && cc.values.chunks_exact(2).all(|pair| pair[0] == pair[1]) =>
        {
            let keys: Vec<f64> = cc.values.iter().step_by(2).copied().collect();
            lookup(cc, &keys, offset, store, policy)
        }
        _ => degrade(cc, offset, policy),
    }
}

/// Identity on the value path, `keys` paired with the text refs for display.
fn lookup(
    cc: &ConversionBlock,
    keys: &[f64],
    offset: u64,
    store: &BlockStore,
    policy: UnsupportedPolicy,
) -> Result<ResolvedConversion> {
    match text_table(cc, keys, store)? {
        Some(display) => Ok(ResolvedConversion {
            value: Arc::new(ValueConversionSpec::Identity),
            display: Arc::new(display),
            degraded: false,
        }),
        None => degrade(cc, offset, policy),
    }
}

/// Label table over `keys` when every reference is a text. The reference
/// after the last key is the default.
fn text_table(
    cc: &ConversionBlock,
    keys: &[f64],
    store: &BlockStore,
) -> Result<Option<DisplayConversionSpec>> {
    let mut texts = Vec::with_capacity(cc.refs.len());
    for &link in &cc.refs {
        if link == 0 {
            texts.push(None);
            continue;
        }
        let block = store.require(link, "conversion reference")?;
        match &block.payload {
            BlockPayload::Text(_) | BlockPayload::Metadata(_) => texts.push(store.text(link)?),
            // Nested scale conversions are not evaluated.
            _ => return Ok(None),
        }
    }
    let entries = keys
        .iter()
        .zip(&texts)
        .filter_map(|(&key, text)| text.clone().map(|text| (key, text)))
        .collect();
    let default = texts.get(keys.len()).cloned().flatten();
    Ok(Some(DisplayConversionSpec::LookupTable { entries, default }))
}

fn degrade(
    cc: &ConversionBlock,
    offset: u64,
    policy: UnsupportedPolicy,
) -> Result<ResolvedConversion> {
    policy.degrade(format!(
        "{:?} conversion (CC block at {offset:#x})",
        cc.conversion_type
    ))?;
    let mut resolved = ResolvedConversion::numeric(ValueConversionSpec::Identity);
    resolved.degraded = true;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_equivalents_agree() {
        let identity = ValueConversionSpec::Identity;
        let linear = ValueConversionSpec::Linear {
            scale: 1.0,
            offset: 0.0,
        };
        let rational = ValueConversionSpec::rational3(0.0, 1.0, 0.0, 1.0, 0.0, 0.0);
        for t in [-1e9, -3.5, -1.0, 0.0, 0.25, 7.0, 65535.0, 1e12] {
            assert_eq!(identity.apply(t), t);
            assert_eq!(linear.apply(t), t);
            assert_eq!(rational.apply(t), t);
        }
    }

    #[test]
    fn linear_folds_to_identity() {
        assert_eq!(ValueConversionSpec::linear(1.0, 0.0), ValueConversionSpec::Identity);
        assert_eq!(
            ValueConversionSpec::linear(0.1, -40.0),
            ValueConversionSpec::Linear {
                scale: 0.1,
                offset: -40.0
            }
        );
    }

    #[test]
    fn mdf_rational_mapping() {
        // (x + 2) / 4 folds to linear
        let folded = ValueConversionSpec::from_mdf_rational([0.0, 1.0, 2.0, 0.0, 0.0, 4.0]);
        assert_eq!(
            folded,
            ValueConversionSpec::Linear {
                scale: 0.25,
                offset: 0.5
            }
        );
        // (2x^2 + 1) / (x + 1)
        let full = ValueConversionSpec::from_mdf_rational([2.0, 0.0, 1.0, 0.0, 1.0, 1.0]);
        assert_eq!(full.apply(3.0), 19.0 / 4.0);
    }

    #[test]
    fn lookup_display() {
        let display = DisplayConversionSpec::LookupTable {
            entries: vec![(0.0, "OFF".into()), (1.0, "ON".into())],
            default: Some("ERROR".into()),
        };
        assert_eq!(display.display(1.0), "ON");
        assert_eq!(display.display(5.0), "ERROR");
        assert_eq!(DisplayConversionSpec::Identity.display(2.5), "2.5");
    }
}
