//! Convention catalog.
//!
//! Ordered list of collective agreements (IDCC) with the keywords used to
//! recognise their sector in a query. Order is significant: when evidence
//! points to several conventions, the first entry wins.
//!
//! The catalog is built once at startup and shared read-only behind an `Arc`.

use droit_core::config::ConventionConfig;
use droit_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Words that mark a query as naming a convention explicitly.
const CONVENTION_MARKERS: &[&str] = &["convention", "conventions", "ccn", "idcc", "accord", "kali"];

/// Extra characters tolerated after a keyword stem (plural and feminine forms).
const KEYWORD_SUFFIX_SLACK: usize = 2;

/// One collective agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Convention {
    /// Sector identifier (IDCC number as text)
    pub idcc: String,

    /// Canonical short name
    pub name: String,

    /// Job-role or industry keywords
    pub keywords: Vec<String>,

    /// Other names the convention is referred to by
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Convention {
    fn new(idcc: &str, name: &str, keywords: &[&str], aliases: &[&str]) -> Self {
        Self {
            idcc: idcc.to_string(),
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Name and aliases, normalized and split into words.
    fn name_forms(&self) -> Vec<Vec<String>> {
        std::iter::once(&self.name)
            .chain(self.aliases.iter())
            .map(|form| tokenize(form))
            .filter(|tokens| !tokens.is_empty())
            .collect()
    }
}

/// Keyword matches found in a query for one convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectorEvidence {
    pub idcc: String,
    pub name: String,

    /// Catalog keywords present in the query, in catalog order
    pub matched: Vec<String>,
}

/// Ordered, immutable convention catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConventionCatalog {
    conventions: Vec<Convention>,
}

impl ConventionCatalog {
    /// Catalog of the conventions indexed in the sector collection.
    pub fn builtin() -> Self {
        Self {
            conventions: vec![
                Convention::new(
                    "1486",
                    "Syntec",
                    &[
                        "informatique",
                        "ingénieur",
                        "développeur",
                        "IT",
                        "consulting",
                        "conseil",
                        "ESN",
                        "SSII",
                    ],
                    &["bureaux d'études techniques", "BETIC"],
                ),
                Convention::new(
                    "3248",
                    "Métallurgie",
                    &["métallurgie", "métal", "industrie", "usine", "production"],
                    &["UIMM"],
                ),
                Convention::new(
                    "1979",
                    "HCR",
                    &[
                        "hôtel",
                        "restaurant",
                        "café",
                        "serveur",
                        "cuisinier",
                        "réception",
                        "CHR",
                    ],
                    &["hôtels cafés restaurants"],
                ),
                Convention::new(
                    "1597",
                    "Bâtiment",
                    &["construction", "bâtiment", "BTP", "chantier", "ouvrier", "maçon"],
                    &[],
                ),
                Convention::new(
                    "1090",
                    "Automobile",
                    &[
                        "automobile",
                        "garage",
                        "mécanicien",
                        "concessionnaire",
                        "réparation",
                    ],
                    &["services de l'automobile"],
                ),
                Convention::new(
                    "2216",
                    "Commerce alimentaire",
                    &[
                        "supermarché",
                        "hypermarché",
                        "commerce",
                        "alimentaire",
                        "caissier",
                    ],
                    &["commerce de détail et de gros à prédominance alimentaire"],
                ),
                Convention::new(
                    "2120",
                    "Banque",
                    &["banque", "bancaire", "conseiller", "guichet", "finance"],
                    &[],
                ),
            ],
        }
    }

    /// Build a catalog from configuration entries, keeping their order.
    pub fn from_config(entries: &[ConventionConfig]) -> AppResult<Self> {
        if entries.is_empty() {
            return Err(AppError::Config(
                "Convention catalog cannot be empty".to_string(),
            ));
        }

        let mut conventions: Vec<Convention> = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.idcc.trim().is_empty() || entry.name.trim().is_empty() {
                return Err(AppError::Config(
                    "Convention entries need both an idcc and a name".to_string(),
                ));
            }
            if conventions.iter().any(|c| c.idcc == entry.idcc.trim()) {
                return Err(AppError::Config(format!(
                    "Duplicate convention IDCC {} in catalog",
                    entry.idcc
                )));
            }
            conventions.push(Convention {
                idcc: entry.idcc.trim().to_string(),
                name: entry.name.trim().to_string(),
                keywords: entry.keywords.clone(),
                aliases: entry.aliases.clone(),
            });
        }

        Ok(Self { conventions })
    }

    /// Configured override if present, otherwise the built-in catalog.
    pub fn from_settings(entries: Option<&[ConventionConfig]>) -> AppResult<Self> {
        match entries {
            Some(entries) => Self::from_config(entries),
            None => Ok(Self::builtin()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Convention> {
        self.conventions.iter()
    }

    pub fn len(&self) -> usize {
        self.conventions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conventions.is_empty()
    }

    /// Look up a convention by IDCC.
    pub fn get(&self, idcc: &str) -> Option<&Convention> {
        self.conventions.iter().find(|c| c.idcc == idcc)
    }

    pub fn contains(&self, idcc: &str) -> bool {
        self.get(idcc).is_some()
    }

    /// Conventions the query names explicitly, in catalog order.
    ///
    /// A mention is `idcc <number>`, a distinctive name or alias ("Syntec",
    /// "UIMM"), or a generic name ("Banque") next to a convention marker word
    /// ("convention", "CCN", ...). A name form is generic when it contains a
    /// catalog keyword.
    pub fn explicit_mentions(&self, query: &str) -> Vec<&Convention> {
        let tokens = tokenize(query);
        let has_marker = tokens
            .iter()
            .any(|t| CONVENTION_MARKERS.contains(&t.as_str()));

        let cited_numbers: Vec<&str> = tokens
            .windows(2)
            .filter(|w| w[0] == "idcc")
            .map(|w| w[1].as_str())
            .collect();

        self.conventions
            .iter()
            .filter(|c| {
                cited_numbers.contains(&c.idcc.as_str())
                    || c.name_forms().iter().any(|form| {
                        contains_sequence(&tokens, form)
                            && (has_marker || !self.is_generic_form(form))
                    })
            })
            .collect()
    }

    fn is_generic_form(&self, form: &[String]) -> bool {
        self.conventions
            .iter()
            .flat_map(|c| c.keywords.iter())
            .any(|kw| keyword_matches(form, kw))
    }

    /// Keyword evidence for every convention with at least one match, in
    /// catalog order.
    pub fn keyword_evidence(&self, query: &str) -> Vec<SectorEvidence> {
        let tokens = tokenize(query);

        self.conventions
            .iter()
            .filter_map(|c| {
                let matched: Vec<String> = c
                    .keywords
                    .iter()
                    .filter(|kw| keyword_matches(&tokens, kw))
                    .cloned()
                    .collect();
                (!matched.is_empty()).then(|| SectorEvidence {
                    idcc: c.idcc.clone(),
                    name: c.name.clone(),
                    matched,
                })
            })
            .collect()
    }
}

impl Default for ConventionCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Lowercase, strip French diacritics, split on anything non-alphanumeric.
pub fn tokenize(text: &str) -> Vec<String> {
    let folded: String = text.chars().flat_map(fold_char).collect();
    folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn fold_char(c: char) -> impl Iterator<Item = char> {
    let folded: &[char] = match c {
        'à' | 'â' | 'ä' | 'À' | 'Â' | 'Ä' => &['a'],
        'ç' | 'Ç' => &['c'],
        'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => &['e'],
        'î' | 'ï' | 'Î' | 'Ï' => &['i'],
        'ô' | 'ö' | 'Ô' | 'Ö' => &['o'],
        'ù' | 'û' | 'ü' | 'Ù' | 'Û' | 'Ü' => &['u'],
        'ÿ' | 'Ÿ' => &['y'],
        'œ' | 'Œ' => &['o', 'e'],
        'æ' | 'Æ' => &['a', 'e'],
        _ => &[],
    };
    let passthrough = if folded.is_empty() {
        Some(c.to_lowercase())
    } else {
        None
    };
    folded
        .iter()
        .copied()
        .chain(passthrough.into_iter().flatten())
}

/// A multi-word keyword matches when its words appear consecutively; each word
/// may carry up to two extra trailing characters.
fn keyword_matches(tokens: &[String], keyword: &str) -> bool {
    let kw_tokens = tokenize(keyword);
    if kw_tokens.is_empty() || kw_tokens.len() > tokens.len() {
        return false;
    }
    tokens.windows(kw_tokens.len()).any(|window| {
        window.iter().zip(&kw_tokens).all(|(token, kw)| {
            token.starts_with(kw.as_str())
                && token.chars().count() <= kw.chars().count() + KEYWORD_SUFFIX_SLACK
        })
    })
}

fn contains_sequence(tokens: &[String], needle: &[String]) -> bool {
    !needle.is_empty()
        && needle.len() <= tokens.len()
        && tokens.windows(needle.len()).any(|w| w == needle)
}
