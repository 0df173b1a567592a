//! French department code utilities.
//!
//! Provides the 101 departments of the 2023 geography (metropolitan France,
//! Corsica's `2A`/`2B` and the five overseas departments) with display names
//! and centroid coordinates, plus helpers that bring raw commune and
//! department codes to their canonical string form.

/// A department of the 2023 geography.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Department {
    /// Canonical department code (`"01"`, `"2A"`, `"971"`).
    pub code: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Centroid latitude.
    pub lat: f64,
    /// Centroid longitude.
    pub lon: f64,
}

impl Department {
    const fn new(code: &'static str, name: &'static str, lat: f64, lon: f64) -> Self {
        Self {
            code,
            name,
            lat,
            lon,
        }
    }
}

/// All departments, ordered by code as published.
#[allow(clippy::unreadable_literal, clippy::excessive_precision)]
pub const DEPARTMENTS: &[Department] = &[
    Department::new("01", "Ain", 46.153425, 4.926114),
    Department::new("02", "Aisne", 49.573157, 3.295646),
    Department::new("03", "Allier", 46.386281, 3.072794),
    Department::new("04", "Alpes-de-Haute-Provence", 44.091493, 6.235997),
    Department::new("05", "Hautes-Alpes", 44.671234, 6.079957),
    Department::new("06", "Alpes-Maritimes", 43.937999, 7.005844),
    Department::new("07", "Ardèche", 44.670126, 4.385752),
    Department::new("08", "Ardennes", 49.509086, 4.721674),
    Department::new("09", "Ariège", 42.937241, 1.443596),
    Department::new("10", "Aube", 48.213008, 4.376782),
    Department::new("11", "Aude", 43.116573, 2.534962),
    Department::new("12", "Aveyron", 44.175496, 2.576660),
    Department::new("13", "Bouches-du-Rhône", 43.296174, 5.369952),
    Department::new("14", "Calvados", 49.062617, -0.301173),
    Department::new("15", "Cantal", 45.069722, 2.649001),
    Department::new("16", "Charente", 45.708008, 0.161069),
    Department::new("17", "Charente-Maritime", 45.806978, -0.641816),
    Department::new("18", "Cher", 47.082680, 2.395383),
    Department::new("19", "Corrèze", 45.431350, 1.771625),
    Department::new("21", "Côte-d'Or", 47.327529, 4.905620),
    Department::new("22", "Côtes-d'Armor", 48.390394, -2.826694),
    Department::new("23", "Creuse", 46.076141, 2.160872),
    Department::new("24", "Dordogne", 44.901986, 0.582307),
    Department::new("25", "Doubs", 47.141788, 6.020063),
    Department::new("26", "Drôme", 44.755128, 5.116361),
    Department::new("27", "Eure", 49.081667, 1.150000),
    Department::new("28", "Eure-et-Loir", 48.443001, 1.500000),
    Department::new("29", "Finistère", 48.202047, -4.098617),
    Department::new("2A", "Corse-du-Sud", 41.918632, 8.738635),
    Department::new("2B", "Haute-Corse", 42.363660, 9.163171),
    Department::new("30", "Gard", 43.981125, 4.389374),
    Department::new("31", "Haute-Garonne", 43.604652, 1.444209),
    Department::new("32", "Gers", 43.702633, 0.583333),
    Department::new("33", "Gironde", 44.840440, -0.580500),
    Department::new("34", "Hérault", 43.598763, 3.896140),
    Department::new("35", "Ille-et-Vilaine", 48.114719, -1.680024),
    Department::new("36", "Indre", 46.819332, 1.728136),
    Department::new("37", "Indre-et-Loire", 47.253741, 0.689508),
    Department::new("38", "Isère", 45.187560, 5.735781),
    Department::new("39", "Jura", 46.712128, 5.659919),
    Department::new("40", "Landes", 43.988427, -1.232432),
    Department::new("41", "Loir-et-Cher", 47.587471, 1.330511),
    Department::new("42", "Loire", 45.438384, 4.387146),
    Department::new("43", "Haute-Loire", 45.128444, 3.892138),
    Department::new("44", "Loire-Atlantique", 47.217250, -1.553360),
    Department::new("45", "Loiret", 47.898071, 2.257423),
    Department::new("46", "Lot", 44.778301, 1.705572),
    Department::new("47", "Lot-et-Garonne", 44.202148, 0.626953),
    Department::new("48", "Lozère", 44.518333, 3.500000),
    Department::new("49", "Maine-et-Loire", 47.473434, -0.551188),
    Department::new("50", "Manche", 49.121060, -1.087197),
    Department::new("51", "Marne", 49.129484, 4.267068),
    Department::new("52", "Haute-Marne", 48.166667, 5.416667),
    Department::new("53", "Mayenne", 48.200001, -0.500000),
    Department::new("54", "Meurthe-et-Moselle", 48.666668, 6.166667),
    Department::new("55", "Meuse", 48.983334, 5.366667),
    Department::new("56", "Morbihan", 47.750000, -3.000000),
    Department::new("57", "Moselle", 49.000000, 6.833333),
    Department::new("58", "Nièvre", 47.000000, 3.500000),
    Department::new("59", "Nord", 50.500000, 3.000000),
    Department::new("60", "Oise", 49.416668, 2.500000),
    Department::new("61", "Orne", 48.583332, 0.500000),
    Department::new("62", "Pas-de-Calais", 50.500000, 2.500000),
    Department::new("63", "Puy-de-Dôme", 45.750000, 3.000000),
    Department::new("64", "Pyrénées-Atlantiques", 43.250000, -0.750000),
    Department::new("65", "Hautes-Pyrénées", 43.000000, 0.000000),
    Department::new("66", "Pyrénées-Orientales", 42.500000, 2.750000),
    Department::new("67", "Bas-Rhin", 48.583332, 7.500000),
    Department::new("68", "Haut-Rhin", 47.916668, 7.166667),
    Department::new("69", "Rhône", 45.750000, 4.833333),
    Department::new("70", "Haute-Saône", 47.666668, 6.166667),
    Department::new("71", "Saône-et-Loire", 46.833332, 4.500000),
    Department::new("72", "Sarthe", 48.000000, 0.166667),
    Department::new("73", "Savoie", 45.500000, 6.000000),
    Department::new("74", "Haute-Savoie", 46.000000, 6.500000),
    Department::new("75", "Paris", 48.856614, 2.3522219),
    Department::new("76", "Seine-Maritime", 49.500000, 1.000000),
    Department::new("77", "Seine-et-Marne", 48.833332, 2.666667),
    Department::new("78", "Yvelines", 48.750000, 1.916667),
    Department::new("79", "Deux-Sèvres", 46.333332, -0.666667),
    Department::new("80", "Somme", 49.900002, 2.333333),
    Department::new("81", "Tarn", 43.933334, 2.166667),
    Department::new("82", "Tarn-et-Garonne", 44.000000, 1.500000),
    Department::new("83", "Var", 43.416668, 6.000000),
    Department::new("84", "Vaucluse", 44.166668, 5.166667),
    Department::new("85", "Vendée", 46.666668, -1.166667),
    Department::new("86", "Vienne", 46.583332, 0.333333),
    Department::new("87", "Haute-Vienne", 45.833332, 1.250000),
    Department::new("88", "Vosges", 48.166668, 6.500000),
    Department::new("89", "Yonne", 47.800003, 3.566667),
    Department::new("90", "Territoire de Belfort", 47.633331, 6.866667),
    Department::new("91", "Essonne", 48.583332, 2.333333),
    Department::new("92", "Hauts-de-Seine", 48.900002, 2.233333),
    Department::new("93", "Seine-Saint-Denis", 48.916668, 2.416667),
    Department::new("94", "Val-de-Marne", 48.800003, 2.483333),
    Department::new("95", "Val-d'Oise", 49.000000, 2.166667),
    Department::new("971", "Guadeloupe", 16.250000, -61.583332),
    Department::new("972", "Martinique", 14.666667, -61.000000),
    Department::new("973", "Guyane", 4.000000, -53.000000),
    Department::new("974", "La Réunion", -21.166668, 55.500000),
    Department::new("976", "Mayotte", -12.833332, 45.166668),
];

/// Looks up a department by its canonical code.
#[must_use]
pub fn department(code: &str) -> Option<&'static Department> {
    DEPARTMENTS.iter().find(|d| d.code == code)
}

/// Maps a canonical department code to its display name.
///
/// Returns `"Unknown"` for unrecognized codes.
#[must_use]
pub fn department_name(code: &str) -> &'static str {
    department(code).map_or("Unknown", |d| d.name)
}

/// Maps a canonical department code to its centroid `(lat, lon)`.
#[must_use]
pub fn department_centroid(code: &str) -> Option<(f64, f64)> {
    department(code).map(|d| (d.lat, d.lon))
}

/// Brings a raw department code to canonical form.
///
/// Single-digit codes are zero-padded (`"1"` becomes `"01"`), Corsican
/// codes are upper-cased (`"2a"` becomes `"2A"`). Returns `None` when the
/// result is not a department of the 2023 geography (including the
/// pre-1976 Corsican code `"20"`).
#[must_use]
pub fn canonical_department_code(raw: &str) -> Option<String> {
    let code = strip_float_suffix(raw.trim()).to_uppercase();
    let code = if code.len() == 1 && code.bytes().all(|b| b.is_ascii_digit()) {
        format!("0{code}")
    } else {
        code
    };
    department(&code).map(|d| d.code.to_string())
}

/// Brings a raw commune code to its canonical five-character form.
///
/// Numeric codes that lost their leading zero (`"1001"`, or `"1001.0"` when
/// read from a spreadsheet cell) are zero-padded to five digits. Corsican
/// codes keep their `2A`/`2B` prefix upper-cased. Returns `None` when the
/// code cannot be a commune code at all or its department prefix is not a
/// known department.
#[must_use]
pub fn canonical_commune_code(raw: &str) -> Option<String> {
    let code = strip_float_suffix(raw.trim()).to_uppercase();
    if code.is_empty() || code.len() > 5 {
        return None;
    }

    let canonical = if code.bytes().all(|b| b.is_ascii_digit()) {
        format!("{code:0>5}")
    } else if code.len() == 5
        && (code.starts_with("2A") || code.starts_with("2B"))
        && code[2..].bytes().all(|b| b.is_ascii_digit())
    {
        code
    } else {
        return None;
    };

    commune_department_code(&canonical).map(|_| canonical)
}

/// Returns the canonical department code a canonical commune code belongs
/// to.
///
/// Overseas communes (`971xx` to `976xx`) use a three-character department
/// prefix; every other commune uses the first two characters.
#[must_use]
pub fn commune_department_code(commune: &str) -> Option<&'static str> {
    let prefix = if commune.starts_with("97") {
        commune.get(..3)?
    } else {
        commune.get(..2)?
    };
    department(prefix).map(|d| d.code)
}

fn strip_float_suffix(code: &str) -> &str {
    code.strip_suffix(".0").unwrap_or(code)
}
