// 📚 Reference tables
// Fixed in-process mappings used while normalizing the travel log:
// country metadata, spelling corrections, companion expansions, month names.

use serde::{Deserialize, Serialize};

// ============================================================================
// COUNTRY METADATA
// ============================================================================

/// Country reference data as persisted in the `countries` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub name: String,
    pub iso_code: Option<String>,
    pub continent: Option<String>,
}

impl Country {
    /// Look up ISO code and continent; unknown names keep nulls
    pub fn from_name(name: &str) -> Self {
        let info = lookup_country(name);
        Country {
            name: name.to_string(),
            iso_code: info.map(|(iso, _)| iso.to_string()),
            continent: info.map(|(_, continent)| continent.to_string()),
        }
    }
}

/// (name, ISO 3166-1 alpha-2, continent)
const COUNTRY_ISO: &[(&str, &str, &str)] = &[
    ("Singapore", "SG", "Asia"),
    ("Vietnam", "VN", "Asia"),
    ("New Zealand", "NZ", "Oceania"),
    ("Australia", "AU", "Oceania"),
    ("Indonesia", "ID", "Asia"),
    ("Timor-Leste", "TL", "Asia"),
    ("Malaysia", "MY", "Asia"),
    ("Brunei", "BN", "Asia"),
    ("Thailand", "TH", "Asia"),
    ("Cambodia", "KH", "Asia"),
    ("Philippines", "PH", "Asia"),
    ("Nepal", "NP", "Asia"),
    ("India", "IN", "Asia"),
    ("Chile", "CL", "South America"),
    ("Peru", "PE", "South America"),
    ("Ecuador", "EC", "South America"),
    ("Colombia", "CO", "South America"),
    ("Spain", "ES", "Europe"),
    ("Israel", "IL", "Asia"),
    ("Portugal", "PT", "Europe"),
    ("France", "FR", "Europe"),
    ("Egypt", "EG", "Africa"),
    ("Croatia", "HR", "Europe"),
    ("Panama", "PA", "North America"),
    ("Costa Rica", "CR", "North America"),
    ("Nicaragua", "NI", "North America"),
    ("Honduras", "HN", "North America"),
    ("Guatemala", "GT", "North America"),
    ("Mexico", "MX", "North America"),
    ("Austria", "AT", "Europe"),
    ("Hungary", "HU", "Europe"),
    ("Montenegro", "ME", "Europe"),
    ("Madagascar", "MG", "Africa"),
    ("South Africa", "ZA", "Africa"),
    ("Mozambique", "MZ", "Africa"),
    ("Malawi", "MW", "Africa"),
    ("Sri Lanka", "LK", "Asia"),
    ("Tunisia", "TN", "Africa"),
    ("Bosnia and Herzegovina", "BA", "Europe"),
    ("Serbia", "RS", "Europe"),
    ("North Macedonia", "MK", "Europe"),
    ("Greece", "GR", "Europe"),
];

/// ISO code and continent for a (corrected) country name
pub fn lookup_country(name: &str) -> Option<(&'static str, &'static str)> {
    COUNTRY_ISO
        .iter()
        .find(|(n, _, _)| *n == name)
        .map(|(_, iso, continent)| (*iso, *continent))
}

// ============================================================================
// SPELLING CORRECTIONS
// ============================================================================

const COUNTRY_CORRECTIONS: &[(&str, &str)] = &[
    ("Autstria", "Austria"),
    ("Madasgascar", "Madagascar"),
    ("Tunesia", "Tunisia"),
    ("Srilanka", "Sri Lanka"),
    ("Macedonia", "North Macedonia"),
];

// Keys are matched before trimming, so trailing-space variants live here.
const TRIP_CORRECTIONS: &[(&str, &str)] = &[("Climbing ", "Climbing")];

// A single cell that really names several people
const COMPANION_EXPANSIONS: &[(&str, &[&str])] = &[
    ("Andi Danny", &["Andi", "Danny"]),
    ("Micheal", &["Michael"]),
];

/// Exact-match country correction; unmapped names pass through
pub fn correct_country(name: &str) -> String {
    COUNTRY_CORRECTIONS
        .iter()
        .find(|(typo, _)| *typo == name)
        .map(|(_, fixed)| fixed.to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Exact-match trip correction; unmapped names pass through
pub fn correct_trip(name: &str) -> String {
    TRIP_CORRECTIONS
        .iter()
        .find(|(typo, _)| *typo == name)
        .map(|(_, fixed)| fixed.to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Expand one companion token into person names
pub fn expand_companion(token: &str) -> Vec<String> {
    match COMPANION_EXPANSIONS.iter().find(|(raw, _)| *raw == token) {
        Some((_, names)) => names.iter().map(|n| n.to_string()).collect(),
        None => vec![token.to_string()],
    }
}

// ============================================================================
// MONTH NAMES (English + German)
// ============================================================================

const MONTH_NAMES: &[(&str, u32)] = &[
    ("january", 1),
    ("januar", 1),
    ("jänner", 1),
    ("jan", 1),
    ("february", 2),
    ("februar", 2),
    ("feb", 2),
    ("march", 3),
    ("märz", 3),
    ("maerz", 3),
    ("mar", 3),
    ("april", 4),
    ("apr", 4),
    ("may", 5),
    ("mai", 5),
    ("june", 6),
    ("juni", 6),
    ("jun", 6),
    ("july", 7),
    ("juli", 7),
    ("jul", 7),
    ("august", 8),
    ("aug", 8),
    ("september", 9),
    ("sept", 9),
    ("sep", 9),
    ("october", 10),
    ("oktober", 10),
    ("oct", 10),
    ("okt", 10),
    ("november", 11),
    ("nov", 11),
    ("december", 12),
    ("dezember", 12),
    ("dec", 12),
    ("dez", 12),
];

/// Month number for an English or German month name, case-insensitive
pub fn month_number(name: &str) -> Option<u32> {
    // to_lowercase folds Ä/Ö/Ü to ä/ö/ü as well
    let lower = name.to_lowercase();
    MONTH_NAMES
        .iter()
        .find(|(m, _)| *m == lower)
        .map(|(_, n)| *n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_lookup_known() {
        let country = Country::from_name("Cambodia");
        assert_eq!(country.iso_code.as_deref(), Some("KH"));
        assert_eq!(country.continent.as_deref(), Some("Asia"));
    }

    #[test]
    fn test_country_lookup_unknown_keeps_nulls() {
        let country = Country::from_name("Atlantis");
        assert_eq!(country.name, "Atlantis");
        assert!(country.iso_code.is_none());
        assert!(country.continent.is_none());
    }

    #[test]
    fn test_country_corrections() {
        assert_eq!(correct_country("Autstria"), "Austria");
        assert_eq!(correct_country("Srilanka"), "Sri Lanka");
        assert_eq!(correct_country("Macedonia"), "North Macedonia");
        assert_eq!(correct_country("Peru"), "Peru");
    }

    #[test]
    fn test_trip_corrections_match_exactly() {
        assert_eq!(correct_trip("Climbing "), "Climbing");
        assert_eq!(correct_trip("Climbing"), "Climbing");
        assert_eq!(correct_trip("climbing "), "climbing ");
    }

    #[test]
    fn test_companion_expansion() {
        assert_eq!(expand_companion("Andi Danny"), vec!["Andi", "Danny"]);
        assert_eq!(expand_companion("Micheal"), vec!["Michael"]);
        assert_eq!(expand_companion("Lena"), vec!["Lena"]);
    }

    #[test]
    fn test_month_names_bilingual() {
        assert_eq!(month_number("Juli"), Some(7));
        assert_eq!(month_number("july"), Some(7));
        assert_eq!(month_number("März"), Some(3));
        assert_eq!(month_number("MÄRZ"), Some(3));
        assert_eq!(month_number("Maerz"), Some(3));
        assert_eq!(month_number("Dezember"), Some(12));
        assert_eq!(month_number("Smarch"), None);
    }
}
