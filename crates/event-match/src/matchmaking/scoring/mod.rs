//! Quiz answers to category weights, and category weights to a reference color.
//!
//! Everything here is pure: the write path calls these functions before a record is
//! persisted so derived fields always track the stored answers.

mod reference;

pub use reference::{reference_category, ReferenceCategory, CATEGORY_AXES, REFERENCE_CATEGORIES};

use super::domain::CategoryWeights;

const THIRD: f64 = 1.0 / 3.0;

/// Validation error for answer vectors that cannot feed the weighting table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoringError {
    #[error("answer vector needs at least {required} values, found {found}")]
    TooFewAnswers { required: usize, found: usize },
}

/// One output category: three source answers and their coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryFormula {
    pub indices: [usize; 3],
    pub coefficients: [f64; 3],
}

/// Coefficient table mapping an answer vector onto the three category axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightingScheme {
    pub categories: [CategoryFormula; 3],
}

impl WeightingScheme {
    /// The nine-question personality scheme.
    pub const PERSONALITY: WeightingScheme = WeightingScheme {
        categories: [
            CategoryFormula {
                indices: [0, 3, 6],
                coefficients: [0.3, 0.2, 0.5],
            },
            CategoryFormula {
                indices: [1, 4, 7],
                coefficients: [THIRD, THIRD, THIRD],
            },
            CategoryFormula {
                indices: [2, 5, 8],
                coefficients: [0.6, 0.2, 0.2],
            },
        ],
    };

    pub fn required_answers(&self) -> usize {
        self.categories
            .iter()
            .flat_map(|formula| formula.indices)
            .max()
            .map_or(0, |index| index + 1)
    }

    pub fn apply(&self, answers: &[u8]) -> Result<CategoryWeights, ScoringError> {
        let required = self.required_answers();
        if answers.len() < required {
            return Err(ScoringError::TooFewAnswers {
                required,
                found: answers.len(),
            });
        }

        let mut weights = [0.0; 3];
        for (slot, formula) in weights.iter_mut().zip(&self.categories) {
            let weighted_sum: f64 = formula
                .indices
                .iter()
                .zip(formula.coefficients)
                .map(|(index, coefficient)| f64::from(answers[*index]) * coefficient)
                .sum();
            *slot = round_to_hundredths(weighted_sum);
        }

        Ok(CategoryWeights(weights))
    }
}

/// Personality answers to weighted category scores, rounded to two decimals.
pub fn calculate_weighted_averages(answers: &[u8]) -> Result<CategoryWeights, ScoringError> {
    WeightingScheme::PERSONALITY.apply(answers)
}

/// Attraction answers are already expressed on the category axes.
pub fn attraction_preferences(answers: &[u8]) -> Result<CategoryWeights, ScoringError> {
    let required = CATEGORY_AXES.len();
    if answers.len() < required {
        return Err(ScoringError::TooFewAnswers {
            required,
            found: answers.len(),
        });
    }

    Ok(CategoryWeights([
        f64::from(answers[0]),
        f64::from(answers[1]),
        f64::from(answers[2]),
    ]))
}

/// Nearest reference category by Euclidean distance; the earlier table entry wins ties.
pub fn classify_category(weights: &CategoryWeights) -> &'static ReferenceCategory {
    let mut best = &REFERENCE_CATEGORIES[0];
    let mut best_distance = f64::INFINITY;

    for category in &REFERENCE_CATEGORIES {
        let distance = euclidean_distance(weights.values(), &category.weights);
        if distance < best_distance {
            best_distance = distance;
            best = category;
        }
    }

    best
}

pub fn euclidean_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(left, right)| (left - right).powi(2))
        .sum::<f64>()
        .sqrt()
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
