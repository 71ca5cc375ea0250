//! Rule-based catalog admission gate
//!
//! Scores a candidate against its site category's vocabulary and decides
//! whether it enters the catalog, waits for manual review, or is dropped.
//! Three checks are hard gates: a defined allowlist the candidate's external
//! category id misses, any negative-term match, and an ambiguous trigger
//! term without a qualifying co-occurrence. A hard-gate failure rejects the
//! candidate regardless of its raw score.
//!
//! Matching runs over a normalized blob (lower-cased, diacritics folded)
//! built from title, brand, structured attributes and free context, so
//! "Proteína" and "proteina" land on the same term.

use serde::Serialize;

use super::CandidateItem;

/// Final admission verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Publish straight into the catalog
    Allow,
    /// Park for manual review
    Standby,
    Reject,
}

/// Ambiguous-context rule: the trigger term is only acceptable when at
/// least one qualifier co-occurs in the candidate text
#[derive(Debug, Clone)]
pub struct AmbiguousRule {
    pub trigger: &'static str,
    pub qualifiers: &'static [&'static str],
}

/// Per-category admission vocabulary
#[derive(Debug, Clone)]
pub struct SiteCategory {
    /// Site category slug (e.g. "suplementos")
    pub slug: &'static str,
    /// Acceptable external category ids. Empty disables the allowlist check.
    pub allowed_category_ids: &'static [&'static str],
    pub positive_terms: &'static [&'static str],
    pub negative_terms: &'static [&'static str],
    pub ambiguous_rules: &'static [AmbiguousRule],
}

/// One scored admission decision
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionDecision {
    /// Clamped to 0..=100
    pub score: u32,
    pub matched_positive: Vec<String>,
    pub matched_negative: Vec<String>,
    pub allowlist_pass: bool,
    pub ambiguous_pass: bool,
    pub blocked_by_negative: bool,
    pub verdict: Verdict,
}

/// Neutral starting score before any rule applies
const BASELINE_SCORE: i32 = 40;
/// Bonus per distinct positive-term match
const POSITIVE_BONUS: i32 = 10;
/// Ceiling on the total positive-term bonus
const POSITIVE_BONUS_CAP: i32 = 30;
/// Penalty per negative-term match
const NEGATIVE_PENALTY: i32 = 25;
/// Penalty when a defined allowlist misses the candidate's category id
const ALLOWLIST_PENALTY: i32 = 30;
/// Bonus when the candidate's external category id is on the allowlist
const ALLOWLIST_BONUS: i32 = 10;
/// Penalty for an unqualified ambiguous trigger
const AMBIGUOUS_PENALTY: i32 = 20;
/// Bonus for a recognized fitness brand
const BRAND_BONUS: i32 = 10;

const ALLOW_THRESHOLD: u32 = 70;
const STANDBY_THRESHOLD: u32 = 50;

/// Brands whose presence nudges a candidate toward admission
const KNOWN_FITNESS_BRANDS: &[&str] = &[
    "growth",
    "max titanium",
    "integralmedica",
    "integral medica",
    "black skull",
    "probiotica",
    "dux nutrition",
    "atlhetica",
    "darkness",
    "nutrata",
    "ftw",
    "optimum nutrition",
];

/// Built-in vocabulary for the storefront's site categories
const BUILTIN_CATEGORIES: &[SiteCategory] = &[
    SiteCategory {
        slug: "suplementos",
        // Mercado Livre supplement subtree
        allowed_category_ids: &["MLB264586", "MLB455459", "MLB178393"],
        positive_terms: &[
            "whey",
            "protein",
            "proteina",
            "creatina",
            "bcaa",
            "glutamina",
            "albumina",
            "caseina",
            "hipercalorico",
            "pre treino",
            "termogenico",
            "cafeina",
        ],
        negative_terms: &["racao", "pet", "veterinario"],
        ambiguous_rules: &[
            // "barra" alone could be a door bar or a chocolate bar
            AmbiguousRule {
                trigger: "barra",
                qualifiers: &["proteina", "protein", "cereal"],
            },
        ],
    },
    SiteCategory {
        slug: "acessorios",
        allowed_category_ids: &[],
        positive_terms: &[
            "luva",
            "strap",
            "munhequeira",
            "coqueteleira",
            "squeeze",
            "corda",
            "joelheira",
            "cinto",
            "faixa",
            "halter",
            "anilha",
            "academia",
        ],
        negative_terms: &["cafe", "cafeteira", "chaleira", "cozinha", "panela"],
        ambiguous_rules: &[
            // A bottle is only gym gear in a gym context
            AmbiguousRule {
                trigger: "garrafa",
                qualifiers: &["academia", "squeeze", "treino"],
            },
        ],
    },
    SiteCategory {
        slug: "vestuario",
        allowed_category_ids: &[],
        positive_terms: &[
            "legging",
            "regata",
            "dry fit",
            "shorts",
            "top",
            "bermuda",
            "compressao",
            "fitness",
        ],
        negative_terms: &["social", "festa", "fantasia"],
        ambiguous_rules: &[AmbiguousRule {
            trigger: "calca",
            qualifiers: &["legging", "treino", "academia"],
        }],
    },
];

/// The admission scorer
pub struct CatalogAdmissionGate {
    categories: Vec<SiteCategory>,
}

impl CatalogAdmissionGate {
    /// Gate loaded with the storefront's built-in category vocabulary
    pub fn with_builtin_rules() -> Self {
        Self {
            categories: BUILTIN_CATEGORIES.to_vec(),
        }
    }

    pub fn with_categories(categories: Vec<SiteCategory>) -> Self {
        Self { categories }
    }

    /// Look up a category by its site slug
    pub fn category(&self, slug: &str) -> Option<&SiteCategory> {
        self.categories.iter().find(|c| c.slug == slug)
    }

    /// Score one candidate against one site category
    pub fn evaluate(&self, category: &SiteCategory, candidate: &CandidateItem) -> AdmissionDecision {
        let blob = candidate_blob(candidate);
        let mut score = BASELINE_SCORE;

        // Allowlist: a defined list the candidate misses is a hard gate
        let allowlist_pass = if category.allowed_category_ids.is_empty() {
            true
        } else {
            match candidate.category_id.as_deref() {
                Some(id) if category.allowed_category_ids.contains(&id) => {
                    score += ALLOWLIST_BONUS;
                    true
                }
                _ => {
                    score -= ALLOWLIST_PENALTY;
                    false
                }
            }
        };

        let matched_positive: Vec<String> = category
            .positive_terms
            .iter()
            .filter(|term| blob.contains(*term))
            .map(|term| term.to_string())
            .collect();
        score += (POSITIVE_BONUS * matched_positive.len() as i32).min(POSITIVE_BONUS_CAP);

        let matched_negative: Vec<String> = category
            .negative_terms
            .iter()
            .filter(|term| blob.contains(*term))
            .map(|term| term.to_string())
            .collect();
        let blocked_by_negative = !matched_negative.is_empty();
        score -= NEGATIVE_PENALTY * matched_negative.len() as i32;

        let ambiguous_pass = category.ambiguous_rules.iter().all(|rule| {
            !blob.contains(rule.trigger) || rule.qualifiers.iter().any(|q| blob.contains(q))
        });
        if !ambiguous_pass {
            score -= AMBIGUOUS_PENALTY;
        }

        if let Some(brand) = candidate.brand_key() {
            let brand = normalize(&brand);
            if KNOWN_FITNESS_BRANDS.contains(&brand.as_str()) {
                score += BRAND_BONUS;
            }
        }

        let score = score.clamp(0, 100) as u32;

        let gates_pass = allowlist_pass && ambiguous_pass && !blocked_by_negative;
        let verdict = if gates_pass && score >= ALLOW_THRESHOLD {
            Verdict::Allow
        } else if gates_pass && score >= STANDBY_THRESHOLD {
            Verdict::Standby
        } else {
            Verdict::Reject
        };

        tracing::debug!(
            external_id = %candidate.external_id,
            category = category.slug,
            score,
            verdict = ?verdict,
            positives = matched_positive.len(),
            negatives = matched_negative.len(),
            "Candidate scored"
        );

        AdmissionDecision {
            score,
            matched_positive,
            matched_negative,
            allowlist_pass,
            ambiguous_pass,
            blocked_by_negative,
            verdict,
        }
    }
}

/// Normalized text blob over every text field of the candidate
fn candidate_blob(candidate: &CandidateItem) -> String {
    let mut parts: Vec<&str> = vec![&candidate.title];
    if let Some(brand) = candidate.brand.as_deref() {
        parts.push(brand);
    }
    for (name, value) in &candidate.attributes {
        parts.push(name);
        parts.push(value);
    }
    if let Some(context) = candidate.context.as_deref() {
        parts.push(context);
    }
    normalize(&parts.join(" "))
}

/// Lower-case and fold Portuguese diacritics
fn normalize(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(fold_accent)
        .collect()
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        _ => c,
    }
}
