//! Static region table (US states, DC and inhabited territories).
//!
//! Bidirectional: full name → short code and code → full name, both
//! case-insensitive on input. Periods are ignored so "D.C." matches "DC".

/// A region with its short code and canonical full name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub code: &'static str,
    pub name: &'static str,
}

const REGIONS: &[Region] = &[
    Region { code: "AL", name: "Alabama" },
    Region { code: "AK", name: "Alaska" },
    Region { code: "AZ", name: "Arizona" },
    Region { code: "AR", name: "Arkansas" },
    Region { code: "CA", name: "California" },
    Region { code: "CO", name: "Colorado" },
    Region { code: "CT", name: "Connecticut" },
    Region { code: "DE", name: "Delaware" },
    Region { code: "DC", name: "District of Columbia" },
    Region { code: "FL", name: "Florida" },
    Region { code: "GA", name: "Georgia" },
    Region { code: "HI", name: "Hawaii" },
    Region { code: "ID", name: "Idaho" },
    Region { code: "IL", name: "Illinois" },
    Region { code: "IN", name: "Indiana" },
    Region { code: "IA", name: "Iowa" },
    Region { code: "KS", name: "Kansas" },
    Region { code: "KY", name: "Kentucky" },
    Region { code: "LA", name: "Louisiana" },
    Region { code: "ME", name: "Maine" },
    Region { code: "MD", name: "Maryland" },
    Region { code: "MA", name: "Massachusetts" },
    Region { code: "MI", name: "Michigan" },
    Region { code: "MN", name: "Minnesota" },
    Region { code: "MS", name: "Mississippi" },
    Region { code: "MO", name: "Missouri" },
    Region { code: "MT", name: "Montana" },
    Region { code: "NE", name: "Nebraska" },
    Region { code: "NV", name: "Nevada" },
    Region { code: "NH", name: "New Hampshire" },
    Region { code: "NJ", name: "New Jersey" },
    Region { code: "NM", name: "New Mexico" },
    Region { code: "NY", name: "New York" },
    Region { code: "NC", name: "North Carolina" },
    Region { code: "ND", name: "North Dakota" },
    Region { code: "OH", name: "Ohio" },
    Region { code: "OK", name: "Oklahoma" },
    Region { code: "OR", name: "Oregon" },
    Region { code: "PA", name: "Pennsylvania" },
    Region { code: "RI", name: "Rhode Island" },
    Region { code: "SC", name: "South Carolina" },
    Region { code: "SD", name: "South Dakota" },
    Region { code: "TN", name: "Tennessee" },
    Region { code: "TX", name: "Texas" },
    Region { code: "UT", name: "Utah" },
    Region { code: "VT", name: "Vermont" },
    Region { code: "VA", name: "Virginia" },
    Region { code: "WA", name: "Washington" },
    Region { code: "WV", name: "West Virginia" },
    Region { code: "WI", name: "Wisconsin" },
    Region { code: "WY", name: "Wyoming" },
    Region { code: "PR", name: "Puerto Rico" },
    Region { code: "GU", name: "Guam" },
    Region { code: "VI", name: "Virgin Islands" },
];

/// Extra spellings that map onto a canonical region.
const NAME_ALIASES: &[(&str, &str)] = &[
    ("washington dc", "DC"),
    ("washington d c", "DC"),
    ("us virgin islands", "VI"),
];

/// Longest region name in tokens ("district of columbia").
pub const MAX_NAME_TOKENS: usize = 3;

/// Lookup facade over the static table.
pub struct RegionTable;

impl RegionTable {
    pub fn all() -> &'static [Region] {
        REGIONS
    }

    /// Region for a short code ("co", "CO", "C.O.").
    pub fn by_code(code: &str) -> Option<&'static Region> {
        let key: String = code
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '.')
            .collect::<String>()
            .to_uppercase();
        REGIONS.iter().find(|r| r.code == key)
    }

    /// Region for a full name ("colorado", "District Of Columbia").
    pub fn by_name(name: &str) -> Option<&'static Region> {
        let key = strip_periods(name)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        REGIONS
            .iter()
            .find(|r| r.name.to_lowercase() == key)
            .or_else(|| {
                NAME_ALIASES
                    .iter()
                    .find(|(alias, _)| *alias == key)
                    .and_then(|(_, code)| Self::by_code(code))
            })
    }

    /// Region for either a code or a full name.
    pub fn lookup(text: &str) -> Option<&'static Region> {
        Self::by_code(text).or_else(|| Self::by_name(text))
    }

    /// Short code for a full name or code.
    pub fn code_for(text: &str) -> Option<&'static str> {
        Self::lookup(text).map(|r| r.code)
    }

    /// Full name for a short code.
    pub fn name_for(code: &str) -> Option<&'static str> {
        Self::by_code(code).map(|r| r.name)
    }
}

fn strip_periods(s: &str) -> String {
    s.replace('.', " ").split_whitespace().collect::<Vec<_>>().join(" ")
}
