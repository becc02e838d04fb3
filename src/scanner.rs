//! Detection of personal and tax-identifying data in extracted document text.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

pub const DEFAULT_MAX_CHARACTERS: usize = 25_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SensitiveCategory {
    Cnpj,
    Cpf,
    Email,
    StateRegistration,
    MunicipalRegistration,
    PostalCode,
    Street,
    StreetNumber,
    District,
    City,
    StateAbbreviation,
}

impl SensitiveCategory {
    pub fn label(self) -> &'static str {
        match self {
            SensitiveCategory::Cnpj => "CNPJ",
            SensitiveCategory::Cpf => "CPF",
            SensitiveCategory::Email => "Email",
            SensitiveCategory::StateRegistration => "Inscrição Estadual",
            SensitiveCategory::MunicipalRegistration => "Inscrição Municipal",
            SensitiveCategory::PostalCode => "CEP",
            SensitiveCategory::Street => "Logradouro",
            SensitiveCategory::StreetNumber => "Número",
            SensitiveCategory::District => "Bairro",
            SensitiveCategory::City => "Cidade",
            SensitiveCategory::StateAbbreviation => "UF",
        }
    }
}

impl fmt::Display for SensitiveCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Category to matched substrings. Only non-empty categories are present.
pub type Findings = BTreeMap<SensitiveCategory, Vec<String>>;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static CNPJ: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{2}\.?\d{3}\.?\d{3}/?\d{4}-?\d{2}\b").unwrap());
static CPF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{3}\.?\d{3}\.?\d{3}-?\d{2}\b").unwrap());
static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}").unwrap());
static STATE_REGISTRATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\binscri[çc][ãa]o estadual\b|\bie ?(?::|n[º°o]\.?) ?\d[\d./-]*").unwrap()
});
static MUNICIPAL_REGISTRATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\binscri[çc][ãa]o municipal\b|\bim ?(?::|n[º°o]\.?) ?\d[\d./-]*").unwrap()
});
static POSTAL_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{5}-\d{3}\b").unwrap());
static STREET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:rua|avenida|logradouro|estrada|travessa|alameda|rodovia|praça) \w+").unwrap()
});
static STREET_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bnúmero: ?\d+|\bn[°º]: ?\d+").unwrap());
static DISTRICT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bbairro: ?\w+").unwrap());
static CITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bcidade: ?\w+").unwrap());

const UF_CODES: &str = "AC|AL|AP|AM|BA|CE|DF|ES|GO|MA|MT|MS|MG|PA|PB|PR|PE|PI|RJ|RN|RS|RO|RR|SC|SP|SE|TO";

// Two-letter codes collide with ordinary Portuguese words ("se", "to", "pa"),
// so a code only counts when uppercase and introduced as an address part.
static STATE_ABBREVIATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:\b(?i:uf|estado) ?[:-]? ?|\w ?[/-] ?)\b(?:{UF_CODES})\b"
    ))
    .unwrap()
});

fn normalize(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Scans `text` for sensitive data. An empty result means the text is clean.
pub fn scan(text: &str) -> Findings {
    let collapsed = normalize(text);
    let folded = collapsed.to_lowercase();
    let mut findings = Findings::new();

    record(
        &mut findings,
        SensitiveCategory::Cnpj,
        matches(&CNPJ, &folded).filter(|candidate| is_valid_cnpj(candidate)),
    );
    record(
        &mut findings,
        SensitiveCategory::Cpf,
        matches(&CPF, &folded).filter(|candidate| is_valid_cpf(candidate)),
    );

    let plain: [(SensitiveCategory, &Lazy<Regex>); 8] = [
        (SensitiveCategory::Email, &EMAIL),
        (SensitiveCategory::StateRegistration, &STATE_REGISTRATION),
        (SensitiveCategory::MunicipalRegistration, &MUNICIPAL_REGISTRATION),
        (SensitiveCategory::PostalCode, &POSTAL_CODE),
        (SensitiveCategory::Street, &STREET),
        (SensitiveCategory::StreetNumber, &STREET_NUMBER),
        (SensitiveCategory::District, &DISTRICT),
        (SensitiveCategory::City, &CITY),
    ];
    for (category, pattern) in plain {
        record(&mut findings, category, matches(pattern, &folded));
    }

    record(
        &mut findings,
        SensitiveCategory::StateAbbreviation,
        matches(&STATE_ABBREVIATION, &collapsed),
    );

    findings
}

/// True when `text` has at most `max_characters` characters.
pub fn within_limit(text: &str, max_characters: usize) -> bool {
    text.chars().count() <= max_characters
}

fn matches<'t>(pattern: &'t Regex, text: &'t str) -> impl Iterator<Item = String> + 't {
    pattern.find_iter(text).map(|m| m.as_str().to_string())
}

fn record(findings: &mut Findings, category: SensitiveCategory, found: impl Iterator<Item = String>) {
    let found: Vec<String> = found.collect();
    if !found.is_empty() {
        findings.insert(category, found);
    }
}

fn digits(candidate: &str) -> Vec<u32> {
    candidate.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn all_same(digits: &[u32]) -> bool {
    digits.windows(2).all(|pair| pair[0] == pair[1])
}

fn check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    match sum % 11 {
        r if r < 2 => 0,
        r => 11 - r,
    }
}

pub fn is_valid_cpf(candidate: &str) -> bool {
    let digits = digits(candidate);
    if digits.len() != 11 || all_same(&digits) {
        return false;
    }

    let first = check_digit(&digits[..9], &[10, 9, 8, 7, 6, 5, 4, 3, 2]);
    let second = check_digit(&digits[..10], &[11, 10, 9, 8, 7, 6, 5, 4, 3, 2]);
    digits[9] == first && digits[10] == second
}

pub fn is_valid_cnpj(candidate: &str) -> bool {
    const FIRST: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
    const SECOND: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

    let digits = digits(candidate);
    if digits.len() != 14 || all_same(&digits) {
        return false;
    }

    digits[12] == check_digit(&digits[..12], &FIRST)
        && digits[13] == check_digit(&digits[..13], &SECOND)
}
