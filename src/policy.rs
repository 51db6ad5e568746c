//! Role model and the access decisions derived from it.
//!
//! Every function here is pure. An unrecognized role is denied everything,
//! including reads.

use serde::{Deserialize, Deserializer, Serialize};

/// Account role. Stored and transmitted as `EMPRESA` / `VENDEDOR`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
pub enum Role {
    #[serde(rename = "EMPRESA")]
    Company,
    #[serde(rename = "VENDEDOR")]
    Seller,
    #[serde(rename = "DESCONOCIDO")]
    Unrecognized,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Company => "EMPRESA",
            Role::Seller => "VENDEDOR",
            Role::Unrecognized => "DESCONOCIDO",
        }
    }

    /// Case-sensitive; anything unknown becomes `Unrecognized`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "EMPRESA" | "COMPANY" => Role::Company,
            "VENDEDOR" | "SELLER" => Role::Seller,
            _ => Role::Unrecognized,
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(de)?;
        Ok(Role::parse(&raw))
    }
}

/// Which product fields a role may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Full,
    HideCost,
}

pub fn can_read(role: Role) -> bool {
    matches!(role, Role::Company | Role::Seller)
}

pub fn can_create(role: Role) -> bool {
    role == Role::Company
}

pub fn can_update(role: Role) -> bool {
    role == Role::Company
}

pub fn can_delete(role: Role) -> bool {
    role == Role::Company
}

pub fn projection(role: Role) -> Projection {
    match role {
        Role::Company => Projection::Full,
        Role::Seller | Role::Unrecognized => Projection::HideCost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Role; 3] = [Role::Company, Role::Seller, Role::Unrecognized];

    #[test]
    fn only_company_mutates() {
        for role in ALL {
            let expected = role == Role::Company;
            assert_eq!(can_create(role), expected, "{role:?}");
            assert_eq!(can_update(role), expected, "{role:?}");
            assert_eq!(can_delete(role), expected, "{role:?}");
        }
    }

    #[test]
    fn unrecognized_role_cannot_read() {
        assert!(can_read(Role::Company));
        assert!(can_read(Role::Seller));
        assert!(!can_read(Role::Unrecognized));
    }

    #[test]
    fn seller_projection_hides_cost() {
        assert_eq!(projection(Role::Company), Projection::Full);
        assert_eq!(projection(Role::Seller), Projection::HideCost);
    }

    #[test]
    fn role_wire_values() {
        assert_eq!(serde_json::to_string(&Role::Company).unwrap(), "\"EMPRESA\"");
        let r: Role = serde_json::from_str("\"VENDEDOR\"").unwrap();
        assert_eq!(r, Role::Seller);
        let r: Role = serde_json::from_str("\"ADMIN\"").unwrap();
        assert_eq!(r, Role::Unrecognized);
        assert_eq!(Role::parse("empresa"), Role::Unrecognized);
    }
}
