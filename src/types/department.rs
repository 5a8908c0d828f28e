use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Municipal department responsible for a class of issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Department {
    Garbage,
    Streetlight,
    RoadDamage,
    Water,
    Drainage,
    Other(String),
}

impl Department {
    pub const KNOWN: [Department; 5] = [
        Department::Garbage,
        Department::Streetlight,
        Department::RoadDamage,
        Department::Water,
        Department::Drainage,
    ];

    /// Lower-case and strip all whitespace. Used for every department and
    /// category comparison.
    pub fn normalize(value: &str) -> String {
        value
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect()
    }

    /// Accepts a department key (`roaddamage`), a display name
    /// (`Road Damage`) or an issue category label (`StreetLight`).
    pub fn parse(value: &str) -> Self {
        match Self::normalize(value).as_str() {
            "garbage" => Department::Garbage,
            "streetlight" => Department::Streetlight,
            "roaddamage" => Department::RoadDamage,
            "water" => Department::Water,
            "drainage" | "drainage&sewerage" | "drainage&sewage" => Department::Drainage,
            _ => Department::Other(value.trim().to_string()),
        }
    }

    /// Look up the department owning an identifier prefix such as `GBG`.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::KNOWN
            .into_iter()
            .find(|d| d.code().eq_ignore_ascii_case(code))
    }

    /// Storage key used in `department_pincode`.
    pub fn key(&self) -> &str {
        match self {
            Department::Garbage => "garbage",
            Department::Streetlight => "streetlight",
            Department::RoadDamage => "roaddamage",
            Department::Water => "water",
            Department::Drainage => "drainage",
            Department::Other(s) => s,
        }
    }

    /// Three-letter prefix for worker and issue identifiers.
    pub fn code(&self) -> String {
        match self {
            Department::Garbage => "GBG".to_string(),
            Department::Streetlight => "SLT".to_string(),
            Department::RoadDamage => "RDG".to_string(),
            Department::Water => "WTR".to_string(),
            Department::Drainage => "DRN".to_string(),
            Department::Other(s) if s.is_empty() => "GEN".to_string(),
            Department::Other(s) => s.chars().take(3).collect::<String>().to_uppercase(),
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Department::Garbage => "Garbage",
            Department::Streetlight => "Streetlight",
            Department::RoadDamage => "Road Damage",
            Department::Water => "Water",
            Department::Drainage => "Drainage & Sewerage",
            Department::Other(s) => s,
        }
    }

}

/// Issue type derived from the identifier prefix (`GBG-17` is Garbage).
pub fn issue_type_from_id(id: &str) -> &'static str {
    let prefix = id.split('-').next().unwrap_or_default();
    match Department::from_code(prefix) {
        Some(Department::Garbage) => "Garbage",
        Some(Department::Streetlight) => "StreetLight",
        Some(Department::RoadDamage) => "Road Damage",
        Some(Department::Water) => "Water",
        Some(Department::Drainage) => "Drainage & Sewage",
        _ => "Unknown",
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for Department {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Department::parse(s))
    }
}

impl Serialize for Department {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.display_name())
    }
}

impl<'de> Deserialize<'de> for Department {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Department::parse(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keys_and_display_names() {
        assert_eq!(Department::parse("roaddamage"), Department::RoadDamage);
        assert_eq!(Department::parse("Road Damage"), Department::RoadDamage);
        assert_eq!(Department::parse("StreetLight"), Department::Streetlight);
        assert_eq!(Department::parse("Drainage & Sewage"), Department::Drainage);
        assert_eq!(
            Department::parse("Drainage & Sewerage"),
            Department::Drainage
        );
    }

    #[test]
    fn test_codes() {
        assert_eq!(Department::Garbage.code(), "GBG");
        assert_eq!(Department::Streetlight.code(), "SLT");
        assert_eq!(Department::RoadDamage.code(), "RDG");
        assert_eq!(Department::Water.code(), "WTR");
        assert_eq!(Department::Drainage.code(), "DRN");
        assert_eq!(Department::parse("parks").code(), "PAR");
        assert_eq!(Department::parse("").code(), "GEN");
        assert_eq!(Department::parse("it").code(), "IT");
    }

    #[test]
    fn test_normalize_strips_whitespace() {
        assert_eq!(Department::normalize(" Road  Damage "), "roaddamage");
        assert!(Department::RoadDamage.matches("road damage"));
    }

    #[test]
    fn test_issue_type_from_id() {
        assert_eq!(issue_type_from_id("GBG-42"), "Garbage");
        assert_eq!(issue_type_from_id("slt-7"), "StreetLight");
        assert_eq!(issue_type_from_id("XYZ-1"), "Unknown");
        assert_eq!(issue_type_from_id(""), "Unknown");
    }
}
