use serde::Serialize;

/// Named point in the three-axis personality space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferenceCategory {
    pub label: &'static str,
    pub weights: [f64; 3],
    pub description: &'static str,
}

/// Axis meaning, low end to high end.
pub const CATEGORY_AXES: [&str; 3] = [
    "AntiSocial (1) -> Social (5)",
    "Books (1) -> Movies (5)",
    "Less Romantic (1) -> More Romantic (5)",
];

/// Shared by the personality and attraction quizzes. Order decides distance ties.
pub const REFERENCE_CATEGORIES: [ReferenceCategory; 8] = [
    ReferenceCategory {
        label: "Purple",
        weights: [5.0, 5.0, 5.0],
        description: "Social, Movies, More Romantic",
    },
    ReferenceCategory {
        label: "red",
        weights: [3.0, 3.0, 3.0],
        description: "Balanced",
    },
    ReferenceCategory {
        label: "gray",
        weights: [1.0, 1.0, 1.0],
        description: "AntiSocial, Books, Less Romantic",
    },
    ReferenceCategory {
        label: "green",
        weights: [4.0, 2.0, 5.0],
        description: "Social, Books, More Romantic",
    },
    ReferenceCategory {
        label: "blue",
        weights: [5.0, 5.0, 1.0],
        description: "Social, Movies, Less Romantic",
    },
    ReferenceCategory {
        label: "pink",
        weights: [2.0, 1.0, 5.0],
        description: "Moderate Social, Books, More Romantic",
    },
    ReferenceCategory {
        label: "orange",
        weights: [1.0, 5.0, 1.0],
        description: "AntiSocial, Movies, Less Romantic",
    },
    ReferenceCategory {
        label: "beige",
        weights: [3.0, 4.0, 2.0],
        description: "Moderate Social, Movies, Less Romantic",
    },
];

pub fn reference_category(label: &str) -> Option<&'static ReferenceCategory> {
    REFERENCE_CATEGORIES
        .iter()
        .find(|category| category.label == label)
}
