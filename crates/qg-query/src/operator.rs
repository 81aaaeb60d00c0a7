use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The closed set of value/column-comparison operators (§3). Every
/// dialect generator and the validator share this single enum so a new
/// operator can only ever be added in one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    IsNull,
    IsNotNull,
    In,
    NotIn,
    Like,
    NotLike,
    Ilike,
    NotIlike,
    StartsWith,
    EndsWith,
    IstartsWith,
    IendsWith,
    Contains,
    NotContains,
    Icontains,
    NotIcontains,
    Between,
    NotBetween,
    LevenshteinLte,
    ArrayContains,
    ArrayContainsAll,
    ArrayContainsAny,
    ArrayIsEmpty,
    ArrayIsNotEmpty,
}

impl Operator {
    /// Operators that carry no `value` at all.
    pub fn is_nullary(&self) -> bool {
        matches!(
            self,
            Operator::IsNull | Operator::IsNotNull | Operator::ArrayIsEmpty | Operator::ArrayIsNotEmpty
        )
    }

    /// Operators requiring the target column to be an array type.
    pub fn requires_array_column(&self) -> bool {
        matches!(
            self,
            Operator::ArrayContains
                | Operator::ArrayContainsAll
                | Operator::ArrayContainsAny
                | Operator::ArrayIsEmpty
                | Operator::ArrayIsNotEmpty
        )
    }

    pub fn requires_array_value(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn | Operator::ArrayContainsAll | Operator::ArrayContainsAny)
    }

    pub fn requires_between_value(&self) -> bool {
        matches!(self, Operator::Between | Operator::NotBetween)
    }

    pub fn requires_levenshtein_value(&self) -> bool {
        matches!(self, Operator::LevenshteinLte)
    }

    pub fn is_pattern(&self) -> bool {
        matches!(
            self,
            Operator::Like
                | Operator::NotLike
                | Operator::Ilike
                | Operator::NotIlike
                | Operator::StartsWith
                | Operator::EndsWith
                | Operator::IstartsWith
                | Operator::IendsWith
                | Operator::Contains
                | Operator::NotContains
                | Operator::Icontains
                | Operator::NotIcontains
        )
    }
}
