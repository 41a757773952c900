// 🗺️ Geography Validator - permitted states and union territories
//
// Exact match after trimming. Unknown names are rejected, never corrected:
// "Orissa" is not "Odisha", "delhi" is not "Delhi".

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// States, union territories, and the national capital region
pub const VALID_STATES: [&str; 37] = [
    "Andhra Pradesh",
    "Arunachal Pradesh",
    "Assam",
    "Bihar",
    "Chhattisgarh",
    "Goa",
    "Gujarat",
    "Haryana",
    "Himachal Pradesh",
    "Jharkhand",
    "Karnataka",
    "Kerala",
    "Madhya Pradesh",
    "Maharashtra",
    "Manipur",
    "Meghalaya",
    "Mizoram",
    "Nagaland",
    "Odisha",
    "Punjab",
    "Rajasthan",
    "Sikkim",
    "Tamil Nadu",
    "Telangana",
    "Tripura",
    "Uttar Pradesh",
    "Uttarakhand",
    "West Bengal",
    "Andaman and Nicobar Islands",
    "Chandigarh",
    "Dadra and Nagar Haveli",
    "Daman and Diu",
    "Delhi",
    "Jammu and Kashmir",
    "Ladakh",
    "Lakshadweep",
    "Puducherry",
];

static SHARED: Lazy<GeographyValidator> = Lazy::new(GeographyValidator::new);

#[derive(Debug, Clone)]
pub struct GeographyValidator {
    states: HashSet<&'static str>,
}

impl GeographyValidator {
    pub fn new() -> Self {
        GeographyValidator {
            states: VALID_STATES.iter().copied().collect(),
        }
    }

    /// Process-wide instance; the reference set never changes
    pub fn shared() -> &'static GeographyValidator {
        &SHARED
    }

    pub fn is_valid(&self, state: &str) -> bool {
        self.states.contains(state.trim())
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Sorted list of permitted names
    pub fn states(&self) -> Vec<&'static str> {
        let mut states: Vec<&'static str> = self.states.iter().copied().collect();
        states.sort_unstable();
        states
    }
}

impl Default for GeographyValidator {
    fn default() -> Self {
        Self::new()
    }
}
