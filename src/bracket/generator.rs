//! Bracket draw
//!
//! Randomly partitions the entrants into first-round pairs and leaves every
//! later slot empty. With categories, each category becomes a region filled
//! only with saints carrying that tag.

use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use super::Bracket;
use crate::error::{Result, SaintfestError};
use crate::model::{Saint, SaintCategory};

pub const DEFAULT_BRACKET_SIZE: usize = 32;
pub const MAX_BRACKET_SIZE: usize = 128;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketPlan {
    pub year: i32,
    pub title: String,
    pub size: usize,
    /// One region per category, in draw order. Empty for an open draw.
    pub categories: Vec<SaintCategory>,
}

impl BracketPlan {
    pub fn new(year: i32) -> Self {
        Self {
            year,
            title: format!("Saintfest {}", year),
            size: DEFAULT_BRACKET_SIZE,
            categories: Vec::new(),
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_categories(mut self, categories: Vec<SaintCategory>) -> Self {
        self.categories = categories;
        self
    }
}

/// Number of rounds for a bracket of `size` entrants.
pub fn rounds_for_size(size: usize) -> Result<usize> {
    if size < 2 || size > MAX_BRACKET_SIZE || !size.is_power_of_two() {
        return Err(SaintfestError::Invalid(format!(
            "bracket size must be a power of two between 2 and {}, got {}",
            MAX_BRACKET_SIZE, size
        )));
    }
    Ok(size.trailing_zeros() as usize)
}

/// Round title by distance from the final.
pub fn round_name(round_index: usize, total_rounds: usize) -> String {
    let distance = total_rounds.saturating_sub(round_index + 1);
    match distance {
        0 => "Final".to_string(),
        1 => "Consecrated Quaternary".to_string(),
        2 => "Elite Eight".to_string(),
        3 => "Sweet Sixteen".to_string(),
        d => format!("Round of {}", 1usize << (d + 1)),
    }
}

pub fn generate_bracket_structure<R: Rng + ?Sized>(
    candidates: &[Saint],
    plan: &BracketPlan,
    rng: &mut R,
) -> Result<Bracket> {
    rounds_for_size(plan.size)?;

    let mut seen = FxHashSet::default();
    for saint in candidates {
        if !seen.insert(saint.id) {
            return Err(SaintfestError::Invalid(format!(
                "saint {} ({}) listed twice",
                saint.id, saint.name
            )));
        }
    }

    let (regions, draw) = if plan.categories.is_empty() {
        (Vec::new(), open_draw(candidates, plan.size, rng)?)
    } else {
        let draw = regional_draw(candidates, plan, rng)?;
        let regions = plan.categories.iter().map(|c| c.label().to_string()).collect();
        (regions, draw)
    };

    let mut bracket = Bracket::empty(plan.year, &plan.title, plan.size, regions)?;
    for (position, pair) in draw.chunks(2).enumerate() {
        if let Some(matchup) = bracket.matchup_mut(0, position) {
            matchup.saint_a = pair.first().copied();
            matchup.saint_b = pair.get(1).copied();
        }
    }

    tracing::debug!(
        "Drew {} saints into {} rounds for {}",
        draw.len(),
        bracket.round_count(),
        plan.year
    );
    Ok(bracket)
}

fn open_draw<R: Rng + ?Sized>(candidates: &[Saint], size: usize, rng: &mut R) -> Result<Vec<i64>> {
    if candidates.len() < size {
        return Err(SaintfestError::Invalid(format!(
            "a bracket of {} needs {} saints, only {} available",
            size,
            size,
            candidates.len()
        )));
    }

    let mut ids: Vec<i64> = candidates
        .choose_multiple(rng, size)
        .map(|s| s.id)
        .collect();
    ids.shuffle(rng);
    Ok(ids)
}

/// Fill one region per category. Scarcer categories pick first so that a
/// saint carrying several tags is not used up by a category with plenty of
/// alternatives.
fn regional_draw<R: Rng + ?Sized>(
    candidates: &[Saint],
    plan: &BracketPlan,
    rng: &mut R,
) -> Result<Vec<i64>> {
    let region_count = plan.categories.len();
    if plan.size % region_count != 0 || plan.size / region_count < 2 {
        return Err(SaintfestError::Invalid(format!(
            "{} categories cannot split a bracket of {} evenly",
            region_count, plan.size
        )));
    }
    let unique: FxHashSet<SaintCategory> = plan.categories.iter().copied().collect();
    if unique.len() != region_count {
        return Err(SaintfestError::Invalid("bracket categories must be distinct".to_string()));
    }
    let per_region = plan.size / region_count;

    let mut fill_order: Vec<SaintCategory> = plan.categories.clone();
    fill_order.sort_by_key(|c| candidates.iter().filter(|s| s.has_category(*c)).count());

    let mut taken: FxHashSet<i64> = FxHashSet::default();
    let mut picked: FxHashMap<SaintCategory, Vec<i64>> = FxHashMap::default();

    for category in fill_order {
        let eligible: Vec<&Saint> = candidates
            .iter()
            .filter(|s| s.has_category(category) && !taken.contains(&s.id))
            .collect();

        if eligible.len() < per_region {
            return Err(SaintfestError::Invalid(format!(
                "only {} untaken saints tagged '{}', region needs {}",
                eligible.len(),
                category,
                per_region
            )));
        }

        let mut ids: Vec<i64> = eligible
            .choose_multiple(rng, per_region)
            .map(|s| s.id)
            .collect();
        ids.shuffle(rng);
        taken.extend(ids.iter().copied());
        picked.insert(category, ids);
    }

    let draw = plan
        .categories
        .iter()
        .flat_map(|c| picked.remove(c).unwrap_or_default())
        .collect();
    Ok(draw)
}
