//! Lenient numeric deserializers.
//!
//! Recipes write large step counts with digit grouping (`max_steps: 250_000`).
//! YAML 1.2 resolves such scalars to strings, so integer fields accept both
//! native integers and grouped digit strings. Float fields likewise accept
//! strings such as `"1e-6"`. Emitted values are always plain numbers.

use serde::de::{self, Deserialize, Deserializer, Visitor};
use std::fmt;

/// Parse a non-negative integer that may use `_` as a digit separator.
///
/// Separators must sit between digits: `10_000` and `1_0` are accepted,
/// `_10`, `10_` and `1__0` are not.
pub fn parse_grouped_u64(text: &str) -> Option<u64> {
    let trimmed = text.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if digits.is_empty() || digits.starts_with('_') || digits.ends_with('_') || digits.contains("__") {
        return None;
    }
    if !digits.chars().all(|c| c.is_ascii_digit() || c == '_') {
        return None;
    }
    digits.replace('_', "").parse().ok()
}

fn parse_lenient_f64(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    match trimmed {
        ".inf" | "+.inf" | ".Inf" | "+.Inf" => return Some(f64::INFINITY),
        "-.inf" | "-.Inf" => return Some(f64::NEG_INFINITY),
        ".nan" | ".NaN" => return Some(f64::NAN),
        _ => {}
    }
    if trimmed.contains("__") || trimmed.starts_with('_') || trimmed.ends_with('_') {
        return None;
    }
    trimmed.replace('_', "").parse().ok()
}

struct GroupedU64Visitor;

impl<'de> Visitor<'de> for GroupedU64Visitor {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative integer, optionally digit-grouped like 10_000")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
        u64::try_from(v).map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
        parse_grouped_u64(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

struct LenientF64Visitor;

impl<'de> Visitor<'de> for LenientF64Visitor {
    type Value = f64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a floating point number")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
        Ok(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
        parse_lenient_f64(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

struct Grouped(u64);

impl<'de> Deserialize<'de> for Grouped {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(GroupedU64Visitor).map(Grouped)
    }
}

struct Lenient(f64);

impl<'de> Deserialize<'de> for Lenient {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(LenientF64Visitor).map(Lenient)
    }
}

/// `deserialize_with` target for unsigned integer fields.
pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
    T::Error: fmt::Display,
{
    let Grouped(raw) = Grouped::deserialize(deserializer)?;
    T::try_from(raw).map_err(de::Error::custom)
}

/// `deserialize_with` target for optional unsigned integer fields.
pub fn deserialize_option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
    T::Error: fmt::Display,
{
    Option::<Grouped>::deserialize(deserializer)?
        .map(|Grouped(raw)| T::try_from(raw).map_err(de::Error::custom))
        .transpose()
}

pub fn deserialize_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Lenient::deserialize(deserializer).map(|Lenient(v)| v)
}

pub fn deserialize_option_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(Option::<Lenient>::deserialize(deserializer)?.map(|Lenient(v)| v))
}

/// Ordered pair of floats, e.g. `adam_betas: [0.9, 0.95]`.
pub fn deserialize_f64_pair<'de, D: Deserializer<'de>>(deserializer: D) -> Result<(f64, f64), D::Error> {
    let (Lenient(first), Lenient(second)) = <(Lenient, Lenient)>::deserialize(deserializer)?;
    Ok((first, second))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Steps {
        #[serde(deserialize_with = "deserialize")]
        max_steps: u64,
        #[serde(default, deserialize_with = "deserialize_option")]
        nb_epochs: Option<u32>,
        #[serde(deserialize_with = "deserialize_f64")]
        eps: f64,
    }

    #[test]
    fn test_parse_grouped_u64() {
        assert_eq!(parse_grouped_u64("10_000"), Some(10_000));
        assert_eq!(parse_grouped_u64("250_000"), Some(250_000));
        assert_eq!(parse_grouped_u64("2000"), Some(2000));
        assert_eq!(parse_grouped_u64("+7"), Some(7));
        assert_eq!(parse_grouped_u64("_10"), None);
        assert_eq!(parse_grouped_u64("10_"), None);
        assert_eq!(parse_grouped_u64("1__0"), None);
        assert_eq!(parse_grouped_u64("-3"), None);
        assert_eq!(parse_grouped_u64("ten"), None);
    }

    #[test]
    fn test_grouped_fields_from_yaml() {
        let steps: Steps = serde_yaml::from_str("max_steps: 250_000\nnb_epochs: 1_00\neps: 1e-6\n").unwrap();
        assert_eq!(steps.max_steps, 250_000);
        assert_eq!(steps.nb_epochs, Some(100));
        assert!((steps.eps - 1e-6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_plain_integers_still_accepted() {
        let steps: Steps = serde_yaml::from_str("max_steps: 2000\neps: 0.5\n").unwrap();
        assert_eq!(steps.max_steps, 2000);
        assert_eq!(steps.nb_epochs, None);
    }

    #[test]
    fn test_negative_integer_rejected() {
        let result: Result<Steps, _> = serde_yaml::from_str("max_steps: -5\neps: 0.5\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_out_of_range_for_target_type() {
        let result: Result<Steps, _> = serde_yaml::from_str("max_steps: 1\nnb_epochs: 5_000_000_000\neps: 0.5\n");
        assert!(result.is_err());
    }
}
