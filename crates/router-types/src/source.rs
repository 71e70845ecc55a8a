//! Source identifiers and enablement masks.

use alloy_primitives::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Highest bit position a source may occupy.
pub const MAX_SOURCE_ID: u32 = 1023;

/// Stable bit position of one liquidity source in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub u32);

impl SourceId {
	pub fn index(&self) -> usize {
		self.0 as usize
	}

	/// Whether the id fits below [`MAX_SOURCE_ID`].
	pub fn is_valid(&self) -> bool {
		self.0 <= MAX_SOURCE_ID
	}
}

impl fmt::Display for SourceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

impl From<u32> for SourceId {
	fn from(id: u32) -> Self {
		SourceId(id)
	}
}

/// Protocol family of a source. Informational only; the router never
/// dispatches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
	ConstantProduct,
	StableSwap,
	OrderBook,
	Aggregator,
	Tabulated,
}

/// Renders the same kebab-case name serde uses.
impl fmt::Display for SourceKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match serde_json::to_value(self) {
			Ok(serde_json::Value::String(name)) => f.write_str(&name),
			_ => Err(fmt::Error),
		}
	}
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MaskParseError {
	/// A character outside `0-9a-fA-F_` in a `0x` mask.
	#[error("Invalid hex digit '{0}' in source mask")]
	InvalidHexDigit(char),
	/// Decimal text that is not a number below 2^256.
	#[error("Invalid decimal source mask: {0}")]
	InvalidDecimal(String),
}

const WORD_BITS: usize = 64;

/// Set of disabled sources, as an arbitrary-width bitmask.
///
/// With `inverted` unset a set bit disables its source. An inverted mask
/// flips that: only the sources whose bits are set stay enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMask {
	words: Vec<u64>,
	inverted: bool,
}

impl SourceMask {
	/// Mask that disables nothing.
	pub fn none() -> Self {
		Self::default()
	}

	/// Mask that disables every source.
	pub fn all() -> Self {
		Self {
			words: Vec::new(),
			inverted: true,
		}
	}

	/// Mask disabling exactly the given sources.
	pub fn disabling<I: IntoIterator<Item = SourceId>>(ids: I) -> Self {
		ids.into_iter().fold(Self::none(), |mask, id| mask.with_bit(id))
	}

	/// Mask enabling exactly the given sources.
	pub fn only<I: IntoIterator<Item = SourceId>>(ids: I) -> Self {
		ids.into_iter().fold(Self::all(), |mask, id| mask.with_bit(id))
	}

	/// Builds a plain (non-inverted) mask from a 256-bit flags word.
	pub fn from_bits(bits: U256) -> Self {
		let words = bits.as_limbs().to_vec();
		let mut mask = Self {
			words,
			inverted: false,
		};
		mask.trim();
		mask
	}

	/// Returns a copy with the bit for `id` set. Ids past
	/// [`MAX_SOURCE_ID`] can never be registered and are ignored.
	pub fn with_bit(mut self, id: SourceId) -> Self {
		if !id.is_valid() {
			return self;
		}
		let (word, bit) = (id.index() / WORD_BITS, id.index() % WORD_BITS);
		if self.words.len() <= word {
			self.words.resize(word + 1, 0);
		}
		self.words[word] |= 1u64 << bit;
		self
	}

	/// Raw bit for `id`, ignoring the inversion flag.
	pub fn bit(&self, id: SourceId) -> bool {
		let (word, bit) = (id.index() / WORD_BITS, id.index() % WORD_BITS);
		self.words
			.get(word)
			.map(|w| w & (1u64 << bit) != 0)
			.unwrap_or(false)
	}

	/// Whether the mask keeps `id` out of the active set.
	pub fn is_disabled(&self, id: SourceId) -> bool {
		self.bit(id) != self.inverted
	}

	pub fn is_inverted(&self) -> bool {
		self.inverted
	}

	/// Same bits with the opposite meaning.
	pub fn inverted(mut self) -> Self {
		self.inverted = !self.inverted;
		self
	}

	/// Hex rendering of the raw bits, without the inversion flag.
	pub fn to_hex(&self) -> String {
		let mut out = String::from("0x");
		let mut started = false;
		for word in self.words.iter().rev() {
			if started {
				out.push_str(&format!("{:016x}", word));
			} else if *word != 0 {
				out.push_str(&format!("{:x}", word));
				started = true;
			}
		}
		if !started {
			out.push('0');
		}
		out
	}

	fn trim(&mut self) {
		while self.words.last() == Some(&0) {
			self.words.pop();
		}
	}

	fn parse_hex(digits: &str) -> Result<Vec<u64>, MaskParseError> {
		let mut words = Vec::with_capacity(digits.len() / 16 + 1);
		let chars: Vec<char> = digits.chars().filter(|c| *c != '_').collect();
		for chunk in chars.rchunks(16) {
			let mut word = 0u64;
			for c in chunk {
				let digit = c.to_digit(16).ok_or(MaskParseError::InvalidHexDigit(*c))?;
				word = (word << 4) | digit as u64;
			}
			words.push(word);
		}
		Ok(words)
	}
}

impl FromStr for SourceMask {
	type Err = MaskParseError;

	/// Parses `0x`-prefixed hex of any width, or a decimal number up to
	/// 256 bits.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
			let mut mask = Self {
				words: Self::parse_hex(hex)?,
				inverted: false,
			};
			mask.trim();
			return Ok(mask);
		}

		let bits = U256::from_str_radix(s, 10)
			.map_err(|e| MaskParseError::InvalidDecimal(e.to_string()))?;
		Ok(Self::from_bits(bits))
	}
}

impl fmt::Display for SourceMask {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.inverted {
			write!(f, "only({})", self.to_hex())
		} else {
			write!(f, "disable({})", self.to_hex())
		}
	}
}

#[derive(Serialize, Deserialize)]
struct MaskTable {
	bits: String,
	#[serde(default)]
	invert: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MaskRepr {
	Text(String),
	Number(u64),
	Table(MaskTable),
}

impl Serialize for SourceMask {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		MaskTable {
			bits: self.to_hex(),
			invert: self.inverted,
		}
		.serialize(serializer)
	}
}

impl<'de> Deserialize<'de> for SourceMask {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		match MaskRepr::deserialize(deserializer)? {
			MaskRepr::Text(text) => text.parse().map_err(serde::de::Error::custom),
			MaskRepr::Number(n) => Ok(Self::from_bits(U256::from(n))),
			MaskRepr::Table(table) => {
				let mut mask: SourceMask = table.bits.parse().map_err(serde::de::Error::custom)?;
				mask.inverted = table.invert;
				Ok(mask)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_disabling_and_only() {
		let mask = SourceMask::disabling([SourceId(1), SourceId(70)]);
		assert!(!mask.is_disabled(SourceId(0)));
		assert!(mask.is_disabled(SourceId(1)));
		assert!(mask.is_disabled(SourceId(70)));
		assert!(!mask.is_disabled(SourceId(500)));

		let only = SourceMask::only([SourceId(0)]);
		assert!(!only.is_disabled(SourceId(0)));
		assert!(only.is_disabled(SourceId(1)));
		assert!(only.is_disabled(SourceId(500)));

		assert!(SourceMask::all().is_disabled(SourceId(3)));
		assert!(!SourceMask::none().is_disabled(SourceId(3)));
	}

	#[test]
	fn test_kind_names_match_serde() {
		assert_eq!(SourceKind::OrderBook.to_string(), "order-book");
		let kind: SourceKind = serde_json::from_str("\"stable-swap\"").unwrap();
		assert_eq!(kind, SourceKind::StableSwap);
	}

	#[test]
	fn test_out_of_range_ids_are_ignored() {
		let mask = SourceMask::disabling([SourceId(4_000_000_000)]);
		assert_eq!(mask, SourceMask::none());
		assert!(!mask.is_disabled(SourceId(4_000_000_000)));

		let only = SourceMask::only([SourceId(u32::MAX)]);
		assert!(only.is_disabled(SourceId(0)));
		assert!(SourceId(MAX_SOURCE_ID).is_valid());
		assert!(!SourceId(MAX_SOURCE_ID + 1).is_valid());
	}

	#[test]
	fn test_parse_wide_hex() {
		// Curve-style range 0xFF80 plus a bit far above 256.
		let wide = concat!(
			"0x1_0000000000000000_0000000000000000",
			"_0000000000000000_0000000000000000_000000000000ff80"
		);
		let mask: SourceMask = wide.parse().unwrap();
		assert!(!mask.is_disabled(SourceId(6)));
		for id in 7..16 {
			assert!(mask.is_disabled(SourceId(id)));
		}
		assert!(mask.is_disabled(SourceId(320)));
		assert_eq!(
			mask.to_hex(),
			"0x10000000000000000000000000000000000000000000000000000000000000000000000000000ff80"
		);
	}

	#[test]
	fn test_parse_decimal_and_errors() {
		let mask: SourceMask = "3".parse().unwrap();
		assert!(mask.is_disabled(SourceId(0)));
		assert!(mask.is_disabled(SourceId(1)));
		assert!(!mask.is_disabled(SourceId(2)));

		assert_eq!(
			"0x12g".parse::<SourceMask>(),
			Err(MaskParseError::InvalidHexDigit('g'))
		);
		assert!("twelve".parse::<SourceMask>().is_err());
	}

	#[test]
	fn test_serde_forms() {
		let from_text: SourceMask = serde_json::from_str("\"0x78\"").unwrap();
		assert_eq!(from_text, SourceMask::disabling((3..7).map(SourceId)));

		let from_number: SourceMask = serde_json::from_str("2").unwrap();
		assert_eq!(from_number, SourceMask::disabling([SourceId(1)]));

		let from_table: SourceMask =
			serde_json::from_str(r#"{"bits":"0x1","invert":true}"#).unwrap();
		assert_eq!(from_table, SourceMask::only([SourceId(0)]));

		let json = serde_json::to_string(&from_table).unwrap();
		let back: SourceMask = serde_json::from_str(&json).unwrap();
		assert_eq!(back, from_table);
	}
}
