//! Alloy sub-type classification from matched species labels.

use std::collections::BTreeSet;

use crate::templates::{StructureKind, Template};

/// FCC alloy Strukturbericht sub-type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlloyType {
    /// No alloy classification applies (non-FCC template, or mixed
    /// species that fit none of the recognised patterns).
    None,
    /// All 13 matched atoms share one species.
    Pure,
    /// Central atom species differs from all 12 neighbours (Cu₃Au
    /// structure, one "large" and twelve "small").
    L12Au,
    /// 4 neighbours of one species occupy a single `{100}` face,
    /// remaining 8 neighbours and the centre share the other species.
    L12Cu,
    /// 8 neighbours of one species, the centre and the complementary
    /// 4-vertex face share the other (AuCu structure).
    L10,
}

/// Classifies the alloy sub-type of an FCC match. `species` must be in
/// template order (index 0 = centre, `1..=12` follow `template.points`).
/// Returns `AlloyType::None` for any non-FCC template, any missing
/// species label, or a species pattern the classifier doesn't recognise.
pub fn classify(template: &Template, species: &[Option<i32>]) -> AlloyType {
    if template.kind != StructureKind::Fcc {
        return AlloyType::None;
    }
    let Some(subsets) = template.alloy_face_subsets else { return AlloyType::None };
    if species.len() != 13 {
        return AlloyType::None;
    }
    let Some(central) = species[0] else { return AlloyType::None };
    let Some(others) = species[1..].iter().copied().collect::<Option<Vec<i32>>>() else {
        return AlloyType::None;
    };

    if others.iter().all(|&s| s == central) {
        return AlloyType::Pure;
    }

    let distinct_b: BTreeSet<i32> = others.iter().copied().filter(|&s| s != central).collect();
    if distinct_b.len() != 1 {
        return AlloyType::None;
    }
    let b = *distinct_b.iter().next().unwrap();
    let b_count = others.iter().filter(|&&s| s == b).count();

    match b_count {
        12 => AlloyType::L12Au,
        4 if subsets.iter().any(|subset| subset.iter().all(|&idx| others[idx] == b)) => AlloyType::L12Cu,
        8 if subsets.iter().any(|subset| subset.iter().all(|&idx| others[idx] == central)) => AlloyType::L10,
        _ => AlloyType::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::template_for;

    fn fcc_species(pattern: &[i32]) -> Vec<Option<i32>> {
        pattern.iter().map(|&s| Some(s)).collect()
    }

    #[test]
    fn test_pure_fcc() {
        let t = template_for(StructureKind::Fcc);
        let species = fcc_species(&[0; 13]);
        assert_eq!(classify(t, &species), AlloyType::Pure);
    }

    #[test]
    fn test_l12_au() {
        let t = template_for(StructureKind::Fcc);
        let mut pattern = vec![0];
        pattern.extend(std::iter::repeat_n(1, 12));
        let species = fcc_species(&pattern);
        assert_eq!(classify(t, &species), AlloyType::L12Au);
    }

    #[test]
    fn test_l12_cu() {
        let t = template_for(StructureKind::Fcc);
        let subset = t.alloy_face_subsets.unwrap()[0];
        let mut pattern = vec![0i32; 13];
        for &idx in &subset {
            pattern[idx + 1] = 1;
        }
        let species = fcc_species(&pattern);
        assert_eq!(classify(t, &species), AlloyType::L12Cu);
    }

    #[test]
    fn test_l10() {
        let t = template_for(StructureKind::Fcc);
        let subset = t.alloy_face_subsets.unwrap()[0];
        let mut pattern = vec![1i32; 13];
        pattern[0] = 0;
        for &idx in &subset {
            pattern[idx + 1] = 0;
        }
        let species = fcc_species(&pattern);
        assert_eq!(classify(t, &species), AlloyType::L10);
    }

    #[test]
    fn test_non_fcc_template_is_always_none() {
        let t = template_for(StructureKind::Bcc);
        let species: Vec<Option<i32>> = std::iter::repeat_n(Some(0), 15).collect();
        assert_eq!(classify(t, &species), AlloyType::None);
    }

    #[test]
    fn test_missing_species_is_none() {
        let t = template_for(StructureKind::Fcc);
        let mut species = fcc_species(&[0; 13]);
        species[5] = None;
        assert_eq!(classify(t, &species), AlloyType::None);
    }
}
