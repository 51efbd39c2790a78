//! Typed label vocabularies for the evidence signals and decisions.
//!
//! Each enum mirrors the declared domain of a network node: variant order is
//! domain order, `as_str` is the declared label, and parsing accepts the
//! label or one of its declared aliases, case-insensitively.

use invest_common::util::normalize_token;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

macro_rules! label_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal $(| $alias:literal)* ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $label $(, alias = $alias)*)]
                $variant,
            )+
        }

        impl $name {
            /// Declared labels in domain order.
            pub const LABELS: &'static [&'static str] = &[$($label),+];
            /// Every variant in domain order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }

            /// Position in the node's domain.
            pub const fn index(self) -> usize {
                self as usize
            }

            pub fn from_index(index: usize) -> Option<Self> {
                Self::ALL.get(index).copied()
            }

            /// Declared alternate spellings.
            pub const fn aliases(self) -> &'static [&'static str] {
                match self {
                    $(Self::$variant => &[$($alias),*],)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let token = normalize_token(s);
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| {
                        normalize_token(v.as_str()) == token
                            || v.aliases().iter().any(|a| normalize_token(a) == token)
                    })
                    .ok_or_else(|| {
                        Error::evidence(format!(
                            "{s:?} is not a {} label (expected one of {:?})",
                            stringify!($name),
                            Self::LABELS
                        ))
                    })
            }
        }
    };
}

label_enum! {
    /// Future share performance.
    Performance {
        Positive => "Positive",
        Stagnant => "Stagnant",
        Negative => "Negative",
    }
}

label_enum! {
    /// Three-way price scale, used both for PE signals and the Value decision.
    PriceLevel {
        Cheap => "Cheap",
        FairValue => "FairValue",
        Expensive => "Expensive",
    }
}

label_enum! {
    /// Company metric compared with a benchmark (ROE vs COE, relative D/E).
    Comparison {
        Above => "Above",
        EqualTo => "EqualTo",
        Below => "Below",
    }
}

label_enum! {
    /// Revenue CAGR compared with inflation.
    InflationComparison {
        InflationPlus => "InflationPlus" | "Above",
        Inflation => "Inflation" | "EqualTo",
        InflationMinus => "InflationMinus" | "Below",
    }
}

label_enum! {
    /// Share beta compared with the market.
    SystematicRisk {
        Greater => "greater",
        EqualTo => "EqualTo",
        Lower => "lower",
    }
}

label_enum! {
    /// Quality decision.
    QualityLevel {
        High => "High",
        Medium => "Medium",
        Low => "Low",
    }
}

label_enum! {
    /// Whether the share is judged expensive before the value decision.
    ExpensiveFlag {
        No => "No",
        Yes => "Yes",
    }
}

label_enum! {
    /// Final recommendation.
    Investable {
        Yes => "Yes",
        No => "No",
    }
}

impl Investable {
    pub const fn from_bool(invest: bool) -> Self {
        if invest {
            Self::Yes
        } else {
            Self::No
        }
    }

    pub const fn is_yes(self) -> bool {
        matches!(self, Self::Yes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("cheap", PriceLevel::Cheap)]
    #[test_case(" FAIRVALUE ", PriceLevel::FairValue)]
    #[test_case("fair_value", PriceLevel::FairValue)]
    #[test_case("Expensive", PriceLevel::Expensive)]
    fn test_price_level_parse(input: &str, expected: PriceLevel) {
        assert_eq!(input.parse::<PriceLevel>().unwrap(), expected);
    }

    #[test]
    fn test_aliases() {
        assert_eq!(
            "below".parse::<InflationComparison>().unwrap(),
            InflationComparison::InflationMinus
        );
        assert_eq!(InflationComparison::Inflation.aliases(), &["EqualTo"]);
        assert!(Comparison::Above.aliases().is_empty());
    }

    #[test]
    fn test_unknown_label_is_evidence_error() {
        let err = "sideways".parse::<Performance>().unwrap_err();
        assert!(err.is_evidence());
    }

    #[test]
    fn test_index_round_trip_and_labels() {
        for level in QualityLevel::ALL {
            assert_eq!(QualityLevel::from_index(level.index()), Some(*level));
            assert_eq!(QualityLevel::LABELS[level.index()], level.as_str());
        }
        assert_eq!(SystematicRisk::Greater.to_string(), "greater");
        assert_eq!(QualityLevel::from_index(3), None);
    }

    #[test]
    fn test_serde_uses_declared_labels() {
        let json = serde_json::to_string(&SystematicRisk::Lower).unwrap();
        assert_eq!(json, "\"lower\"");
        let parsed: InflationComparison = serde_json::from_str("\"Above\"").unwrap();
        assert_eq!(parsed, InflationComparison::InflationPlus);
    }
}
