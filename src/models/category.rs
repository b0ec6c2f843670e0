// src/models/category.rs

use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// The fixed licence categories every user can practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardCategory {
    A2,
    B1,
    C1,
}

impl StandardCategory {
    pub const ALL: [StandardCategory; 3] = [Self::A2, Self::B1, Self::C1];

    pub fn code(self) -> &'static str {
        match self {
            Self::A2 => "A2",
            Self::B1 => "B1",
            Self::C1 => "C1",
        }
    }
}

/// What an exam draws its questions from.
///
/// Stored as a plain string: either a standard code or the numeric id of a
/// custom evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Standard(StandardCategory),
    Evaluation(i64),
}

impl Category {
    pub fn is_standard(&self) -> bool {
        matches!(self, Category::Standard(_))
    }

    pub fn evaluation_id(&self) -> Option<i64> {
        match self {
            Category::Evaluation(id) => Some(*id),
            Category::Standard(_) => None,
        }
    }

    /// Whether a stored category string names a standard category.
    pub fn is_standard_key(key: &str) -> bool {
        matches!(key.parse::<Category>(), Ok(Category::Standard(_)))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Standard(c) => f.write_str(c.code()),
            Category::Evaluation(id) => write!(f, "{}", id),
        }
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(std) = StandardCategory::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(s))
        {
            return Ok(Category::Standard(std));
        }
        s.parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .map(Category::Evaluation)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown category '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_codes_case_insensitively() {
        assert_eq!(
            "b1".parse::<Category>().unwrap(),
            Category::Standard(StandardCategory::B1)
        );
        assert_eq!("C1".parse::<Category>().unwrap().to_string(), "C1");
    }

    #[test]
    fn parses_evaluation_ids() {
        let cat: Category = "42".parse().unwrap();
        assert_eq!(cat, Category::Evaluation(42));
        assert_eq!(cat.to_string(), "42");
        assert!(!cat.is_standard());
    }

    #[test]
    fn rejects_garbage() {
        assert!("Z9".parse::<Category>().is_err());
        assert!("-3".parse::<Category>().is_err());
        assert!("".parse::<Category>().is_err());
    }
}
