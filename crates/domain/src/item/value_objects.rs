//! Identifiers and quantities used by the ledger and metadata store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ItemError;

/// A ledger account name such as `alice.near`.
///
/// Lowercase letters and digits, separated by single `-`, `_` or `.`,
/// between 2 and 64 characters long.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    pub const MIN_LEN: usize = 2;
    pub const MAX_LEN: usize = 64;

    pub fn parse(value: impl Into<String>) -> Result<Self, ItemError> {
        let value = value.into();
        if is_valid_account_id(&value) {
            Ok(Self(value))
        } else {
            Err(ItemError::InvalidAccountId { value })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_valid_account_id(value: &str) -> bool {
    if !(AccountId::MIN_LEN..=AccountId::MAX_LEN).contains(&value.len()) {
        return false;
    }

    let mut last_was_separator = true;
    for c in value.chars() {
        match c {
            'a'..='z' | '0'..='9' => last_was_separator = false,
            '-' | '_' | '.' if !last_was_separator => last_was_separator = true,
            _ => return false,
        }
    }
    !last_was_separator
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountId {
    type Err = ItemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AccountId {
    type Error = ItemError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

/// Identifier of a non-fungible item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemId(String);

impl ItemId {
    pub const MAX_LEN: usize = 128;

    pub fn parse(value: impl Into<String>) -> Result<Self, ItemError> {
        let value = value.into();
        // `:` separates the parts of a locked-balance key.
        if value.is_empty() || value.len() > Self::MAX_LEN || value.contains(':') {
            return Err(ItemError::InvalidItemId { value });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ItemId {
    type Err = ItemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ItemId {
    type Error = ItemError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ItemId> for String {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

/// Identifier of a fungible accessory unit: a decimal integer kept in its
/// textual form, since the ledger keys balances by that text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UnitId(String);

impl UnitId {
    pub fn parse(value: impl Into<String>) -> Result<Self, ItemError> {
        let value = value.into();
        let digits_only = !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit());
        if !digits_only || value.parse::<u128>().is_err() {
            return Err(ItemError::InvalidUnitId { value });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UnitId {
    type Err = ItemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UnitId {
    type Error = ItemError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<UnitId> for String {
    fn from(id: UnitId) -> Self {
        id.0
    }
}

/// A non-negative unit quantity. Serialized as a decimal string so the full
/// `u128` range survives JSON.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn new(value: u128) -> Self {
        Self(value)
    }

    pub fn parse(value: &str) -> Result<Self, ItemError> {
        let invalid = || ItemError::InvalidAmount {
            value: value.to_string(),
        };
        // `u128::from_str` accepts a leading `+`.
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        value.parse::<u128>().map(Self).map_err(|_| invalid())
    }

    pub fn value(&self) -> u128 {
        self.0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl TryFrom<String> for Amount {
    type Error = ItemError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.0.to_string()
    }
}

/// An amount as it arrives on the wire, either a decimal string or a JSON
/// number. Kept as text until [`Amount::parse`] validates it, so negative and
/// fractional numbers are reported like any other malformed amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawAmount", into = "String")]
pub struct WireAmount(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Text(String),
    Number(serde_json::Number),
}

impl From<RawAmount> for WireAmount {
    fn from(raw: RawAmount) -> Self {
        match raw {
            RawAmount::Text(text) => Self(text),
            RawAmount::Number(number) => Self(number.to_string()),
        }
    }
}

impl From<&str> for WireAmount {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl From<String> for WireAmount {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<WireAmount> for String {
    fn from(amount: WireAmount) -> Self {
        amount.0
    }
}

impl AsRef<str> for WireAmount {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One `(unit, amount)` entry of a balance set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitAmount {
    pub unit_id: UnitId,
    pub amount: Amount,
}

impl UnitAmount {
    pub fn new(unit_id: UnitId, amount: Amount) -> Self {
        Self { unit_id, amount }
    }
}

/// Ordered list of unit quantities to lock or unlock.
///
/// Entries are applied in order; repeated unit ids are allowed and each
/// occurrence is applied separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BalanceSet(Vec<UnitAmount>);

impl BalanceSet {
    pub fn new(entries: Vec<UnitAmount>) -> Self {
        Self(entries)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a set from the parallel-array wire form.
    ///
    /// `field` names the set in the length-mismatch error.
    pub fn from_parallel<I, A>(
        field: &'static str,
        unit_ids: &[I],
        amounts: &[A],
    ) -> Result<Self, ItemError>
    where
        I: AsRef<str>,
        A: AsRef<str>,
    {
        if unit_ids.len() != amounts.len() {
            return Err(ItemError::LengthMismatch {
                field,
                ids: unit_ids.len(),
                amounts: amounts.len(),
            });
        }

        unit_ids
            .iter()
            .zip(amounts)
            .map(|(id, amount)| {
                Ok(UnitAmount::new(
                    UnitId::parse(id.as_ref())?,
                    Amount::parse(amount.as_ref())?,
                ))
            })
            .collect::<Result<Vec<_>, ItemError>>()
            .map(Self)
    }

    pub fn entries(&self) -> &[UnitAmount] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnitAmount> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of every amount, or `None` on overflow.
    pub fn total(&self) -> Option<Amount> {
        self.0
            .iter()
            .try_fold(Amount::ZERO, |acc, e| acc.checked_add(e.amount))
    }
}

impl FromIterator<UnitAmount> for BalanceSet {
    fn from_iter<T: IntoIterator<Item = UnitAmount>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a BalanceSet {
    type Item = &'a UnitAmount;
    type IntoIter = std::slice::Iter<'a, UnitAmount>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_rules() {
        for ok in ["alice.near", "ab", "a-b_c.d", "composition.near", "0x1"] {
            assert!(AccountId::parse(ok).is_ok(), "{ok} should be valid");
        }
        for bad in [
            "a",
            "Alice.near",
            ".alice",
            "alice.",
            "al..ice",
            "al-.ice",
            "alice near",
            "",
            &"a".repeat(65),
        ] {
            assert_eq!(
                AccountId::parse(bad),
                Err(ItemError::InvalidAccountId {
                    value: bad.to_string()
                }),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn item_id_rejects_separator_and_empty() {
        assert!(ItemId::parse("77").is_ok());
        assert!(ItemId::parse("").is_err());
        assert!(ItemId::parse("nft:77").is_err());
        assert!(ItemId::parse("x".repeat(129)).is_err());
    }

    #[test]
    fn unit_id_must_be_decimal() {
        assert_eq!(UnitId::parse("1").unwrap().as_str(), "1");
        assert!(UnitId::parse("340282366920938463463374607431768211455").is_ok());
        assert!(UnitId::parse("340282366920938463463374607431768211456").is_err());
        assert!(UnitId::parse("-1").is_err());
        assert!(UnitId::parse("+1").is_err());
        assert!(UnitId::parse("1a").is_err());
        assert!(UnitId::parse("").is_err());
    }

    #[test]
    fn amount_parsing() {
        assert_eq!(Amount::parse("0").unwrap(), Amount::ZERO);
        assert_eq!(Amount::parse("10").unwrap().value(), 10);
        assert!(Amount::parse("-5").is_err());
        assert!(Amount::parse("+5").is_err());
        assert!(Amount::parse("1.5").is_err());
        assert!(Amount::parse("").is_err());
    }

    #[test]
    fn amount_serializes_as_string() {
        let json = serde_json::to_string(&Amount::new(u128::MAX)).unwrap();
        assert_eq!(json, format!("\"{}\"", u128::MAX));
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back.value(), u128::MAX);
        assert!(serde_json::from_str::<Amount>("\"-1\"").is_err());
    }

    #[test]
    fn from_parallel_keeps_order_and_duplicates() {
        let set = BalanceSet::from_parallel("lock", &["2", "1", "2"], &["5", "0", "3"]).unwrap();
        let ids: Vec<_> = set.iter().map(|e| e.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1", "2"]);
        assert_eq!(set.total(), Some(Amount::new(8)));
    }

    #[test]
    fn from_parallel_rejects_length_mismatch() {
        let err = BalanceSet::from_parallel("unlock", &["1", "2"], &["5"]).unwrap_err();
        assert_eq!(
            err,
            ItemError::LengthMismatch {
                field: "unlock",
                ids: 2,
                amounts: 1
            }
        );
    }

    #[test]
    fn from_parallel_reports_bad_entry() {
        let err = BalanceSet::from_parallel("lock", &["1", "x"], &["5", "1"]).unwrap_err();
        assert!(matches!(err, ItemError::InvalidUnitId { .. }));
        let err = BalanceSet::from_parallel("lock", &["1"], &["-5"]).unwrap_err();
        assert!(matches!(err, ItemError::InvalidAmount { .. }));
    }

    #[test]
    fn empty_sets_are_allowed() {
        let set = BalanceSet::from_parallel::<&str, &str>("lock", &[], &[]).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.total(), Some(Amount::ZERO));
    }
}
