//! Multilingual "total" vocabulary.

/// Label fragments with a rank; lower ranks are stronger evidence of the
/// amount actually due. Checked in order, so compound labels come first.
const TOTAL_LABELS: &[(&str, u8)] = &[
    ("total ttc", 0),
    ("total à payer", 0),
    ("total a payer", 0),
    ("montant total", 0),
    ("montant dû", 0),
    ("amount due", 0),
    ("total due", 0),
    ("grand total", 0),
    ("net à payer", 0),
    ("sous-total", 3),
    ("sous total", 3),
    ("sub-total", 3),
    ("subtotal", 3),
    ("total", 1),
    ("à payer", 1),
    ("gesamtbetrag", 1),
    ("montant", 2),
    ("amount", 2),
    ("betrag", 2),
    ("balance", 2),
    ("solde", 2),
    ("due", 2),
    ("price", 4),
    ("prix", 4),
    ("tarif", 4),
];

/// Longest text still treated as a label cell.
pub const MAX_LABEL_LEN: usize = 40;

/// Rank of a label cell, `None` when it is not a total-like label.
pub fn label_rank(label: &str) -> Option<u8> {
    let label = label.trim().to_lowercase();
    if label.is_empty() || label.chars().count() > MAX_LABEL_LEN {
        return None;
    }
    TOTAL_LABELS
        .iter()
        .find(|(fragment, _)| label.contains(fragment))
        .map(|(_, rank)| *rank)
}

/// Byte ranges of every vocabulary occurrence in an already-lowercased text.
pub fn label_positions(lowered: &str) -> Vec<(usize, usize)> {
    let mut positions: Vec<(usize, usize)> = TOTAL_LABELS
        .iter()
        .flat_map(|(fragment, _)| {
            lowered
                .match_indices(fragment)
                .map(|(start, matched)| (start, start + matched.len()))
        })
        .collect();
    positions.sort_unstable();
    positions.dedup();
    positions
}
