//! Containment matrix between catalog levels
//!
//! | Parent      | Allowed children     |
//! |-------------|----------------------|
//! | Equipamento | Conjunto, Parte, Kit |
//! | Conjunto    | Parte, Peça, Kit     |
//! | Parte       | Peça, Kit            |
//! | Kit         | Peça, Parte          |
//! | Peça        | (leaf)               |

use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::Level;

/// Levels a parent of `level` may hold directly
pub fn allowed_children(level: Level) -> &'static [Level] {
    match level {
        Level::Equipamento => &[Level::Conjunto, Level::Parte, Level::Kit],
        Level::Conjunto => &[Level::Parte, Level::Peca, Level::Kit],
        Level::Parte => &[Level::Peca, Level::Kit],
        Level::Kit => &[Level::Peca, Level::Parte],
        Level::Peca => &[],
    }
}

/// Same lookup keyed by a raw level name; unknown names yield no children
pub fn allowed_children_of(level: &str) -> &'static [Level] {
    level.parse::<Level>().map(allowed_children).unwrap_or(&[])
}

/// Whether a `parent` item may directly contain a `child` item
pub fn can_contain(parent: Level, child: Level) -> bool {
    allowed_children(parent).contains(&child)
}

/// `can_contain` as a `Result`, for call sites that issue writes
pub fn check_containment(parent: Level, child: Level) -> Result<()> {
    if can_contain(parent, child) {
        Ok(())
    } else {
        Err(Error::Containment { parent, child })
    }
}

/// One row of the matrix, as served to clients
#[derive(Debug, Clone, Serialize)]
pub struct ContainmentRule {
    pub parent: Level,
    pub children: Vec<Level>,
}

/// Full matrix in `Level::ALL` order
pub fn matrix() -> Vec<ContainmentRule> {
    Level::ALL
        .iter()
        .map(|&parent| ContainmentRule {
            parent,
            children: allowed_children(parent).to_vec(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn set(levels: &[Level]) -> HashSet<Level> {
        levels.iter().copied().collect()
    }

    #[test]
    fn test_matrix_matches_table() {
        assert_eq!(
            set(allowed_children(Level::Equipamento)),
            set(&[Level::Conjunto, Level::Parte, Level::Kit])
        );
        assert_eq!(
            set(allowed_children(Level::Conjunto)),
            set(&[Level::Parte, Level::Peca, Level::Kit])
        );
        assert_eq!(set(allowed_children(Level::Parte)), set(&[Level::Peca, Level::Kit]));
        assert_eq!(set(allowed_children(Level::Kit)), set(&[Level::Peca, Level::Parte]));
    }

    #[test]
    fn test_peca_is_leaf() {
        assert!(allowed_children(Level::Peca).is_empty());
        for child in Level::ALL {
            assert!(!can_contain(Level::Peca, child));
        }
    }

    #[test]
    fn test_no_level_contains_itself() {
        for level in Level::ALL {
            assert!(!can_contain(level, level), "{} contains itself", level);
        }
    }

    #[test]
    fn test_unknown_level_name_yields_empty_set() {
        assert!(allowed_children_of("Widget").is_empty());
        assert_eq!(allowed_children_of("parte"), allowed_children(Level::Parte));
    }

    #[test]
    fn test_check_containment_error() {
        assert!(check_containment(Level::Equipamento, Level::Kit).is_ok());
        match check_containment(Level::Parte, Level::Equipamento) {
            Err(Error::Containment { parent, child }) => {
                assert_eq!(parent, Level::Parte);
                assert_eq!(child, Level::Equipamento);
            }
            other => panic!("expected containment error, got {:?}", other),
        }
    }

    #[test]
    fn test_matrix_lists_every_level() {
        let rows = matrix();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[3].parent, Level::Peca);
        assert!(rows[3].children.is_empty());
    }
}
