//! Source labels and Légifrance links for retrieved passages.

use crate::types::{CollectionKind, RetrievedPassage};
use chrono::NaiveDate;

const LEGIFRANCE_ARTICLE_URL: &str = "https://www.legifrance.gouv.fr/codes/article_lc";

/// Human-readable citation for a passage.
///
/// - general: `Article L1221-19 (Code du travail)`
/// - sector with name and IDCC: `Convention Syntec (IDCC 1486) - Article 2.3`
/// - sector otherwise: `KALI - Article 2.3`
pub fn format_citation(passage: &RetrievedPassage) -> String {
    let article = passage
        .metadata
        .article_num
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .unwrap_or(&passage.passage_id);

    match passage.source_collection {
        CollectionKind::General => format!("Article {} (Code du travail)", article),
        CollectionKind::Sector => {
            let name = passage
                .metadata
                .convention_name
                .as_deref()
                .or(passage.sector_name.as_deref());
            let idcc = passage
                .metadata
                .idcc
                .as_deref()
                .or(passage.sector_id.as_deref());

            match (name, idcc) {
                (Some(name), Some(idcc)) => {
                    format!("Convention {} (IDCC {}) - Article {}", name, idcc, article)
                }
                _ => format!("KALI - Article {}", article),
            }
        }
    }
}

/// Légifrance link for general passages that carry an article identifier.
pub fn source_url(passage: &RetrievedPassage) -> Option<String> {
    if passage.source_collection != CollectionKind::General {
        return None;
    }
    passage
        .metadata
        .article_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .map(|id| format!("{}/{}", LEGIFRANCE_ARTICLE_URL, id))
}

/// Label used in the synthesis context block.
///
/// The citation, followed by the hierarchy path and chunk position when known.
/// Articles outside their validity dates today are flagged.
pub fn context_label(passage: &RetrievedPassage) -> String {
    context_label_on(passage, chrono::Local::now().date_naive())
}

fn context_label_on(passage: &RetrievedPassage, today: NaiveDate) -> String {
    let mut label = format_citation(passage);
    if let Some(path) = passage.metadata.hierarchy_path() {
        label.push_str(&format!(" [{}]", path));
    }
    if let Some(chunk) = passage.metadata.chunk_label() {
        label.push_str(&format!(" (partie {})", chunk));
    }
    if !passage.metadata.is_in_force(today) {
        label.push_str(" (non en vigueur)");
    }
    label
}
