use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ParseOrderError;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Retreat,
    Attack,
}

impl Order {
    /// Winner of an even split. Every general must use the same value.
    pub const TIE_BREAK: Order = Order::Retreat;

    pub fn flip(self) -> Self {
        match self {
            Order::Retreat => Order::Attack,
            Order::Attack => Order::Retreat,
        }
    }

    /// Most frequent order, `TIE_BREAK` on an even split (including no votes).
    pub fn majority<I>(orders: I) -> Order
    where
        I: IntoIterator<Item = Order>,
    {
        let (attack, retreat) = orders
            .into_iter()
            .fold((0usize, 0usize), |(attack, retreat), order| match order {
                Order::Attack => (attack + 1, retreat),
                Order::Retreat => (attack, retreat + 1),
            });

        if attack > retreat {
            Order::Attack
        } else if retreat > attack {
            Order::Retreat
        } else {
            Order::TIE_BREAK
        }
    }
}

impl AsRef<[u8]> for Order {
    fn as_ref(&self) -> &[u8] {
        match self {
            Order::Retreat => &[0u8],
            Order::Attack => &[1u8],
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Retreat => f.write_str("retreat"),
            Order::Attack => f.write_str("attack"),
        }
    }
}

impl FromStr for Order {
    type Err = ParseOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "attack" => Ok(Order::Attack),
            "retreat" => Ok(Order::Retreat),
            _ => Err(ParseOrderError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_majority() {
        use Order::*;

        assert_eq!(Order::majority([Attack, Attack, Retreat]), Attack);
        assert_eq!(Order::majority([Retreat, Attack, Retreat]), Retreat);
        assert_eq!(Order::majority([Attack]), Attack);
    }

    #[test]
    fn test_majority_tie_breaks_to_retreat() {
        use Order::*;

        assert_eq!(Order::majority([Attack, Retreat]), Retreat);
        assert_eq!(Order::majority([Retreat, Attack, Attack, Retreat]), Retreat);
        assert_eq!(Order::majority(Vec::new()), Retreat);
    }

    #[test]
    fn test_parse() {
        assert_eq!("attack".parse::<Order>(), Ok(Order::Attack));
        assert_eq!("RETREAT".parse::<Order>(), Ok(Order::Retreat));
        assert_eq!(
            "charge".parse::<Order>(),
            Err(ParseOrderError("charge".to_string()))
        );
        assert_eq!(Order::Attack.to_string(), "attack");
    }

    #[test]
    fn test_flip() {
        assert_eq!(Order::Attack.flip(), Order::Retreat);
        assert_eq!(Order::Retreat.flip().flip(), Order::Retreat);
    }
}
