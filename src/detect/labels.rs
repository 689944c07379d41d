// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Class index to sign name table for the pretrained detector

use crate::db::Category;
use crate::db::Category::{Larangan, Perintah, Peringatan, Petunjuk};

/// One class the detector was trained on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignLabel {
    pub class_id: u32,
    pub name: &'static str,
    pub kategori: Category,
    /// Words used for the fallback catalogue search
    pub keywords: &'static [&'static str],
}

const fn label(
    class_id: u32,
    name: &'static str,
    kategori: Category,
    keywords: &'static [&'static str],
) -> SignLabel {
    SignLabel { class_id, name, kategori, keywords }
}

static LABELS: &[SignLabel] = &[
    label(0, "Dilarang Parkir", Larangan, &["parkir"]),
    label(1, "Dilarang Berhenti", Larangan, &["berhenti"]),
    label(2, "Dilarang Masuk", Larangan, &["masuk"]),
    label(3, "Dilarang Belok Kiri", Larangan, &["belok kiri"]),
    label(4, "Dilarang Belok Kanan", Larangan, &["belok kanan"]),
    label(5, "Dilarang Putar Balik", Larangan, &["putar balik", "putar"]),
    label(6, "Dilarang Mendahului", Larangan, &["mendahului"]),
    label(7, "Batas Kecepatan Maksimum", Larangan, &["kecepatan", "batas"]),
    label(8, "Berhenti", Perintah, &["stop", "berhenti"]),
    label(9, "Wajib Belok Kiri", Perintah, &["wajib belok kiri", "belok kiri"]),
    label(10, "Wajib Belok Kanan", Perintah, &["wajib belok kanan", "belok kanan"]),
    label(11, "Wajib Lurus", Perintah, &["lurus"]),
    label(12, "Jalur Sepeda", Perintah, &["sepeda"]),
    label(13, "Beri Kesempatan", Perintah, &["kesempatan", "prioritas"]),
    label(14, "Tikungan Ke Kiri", Peringatan, &["tikungan kiri", "tikungan"]),
    label(15, "Tikungan Ke Kanan", Peringatan, &["tikungan kanan", "tikungan"]),
    label(16, "Tikungan Ganda Pertama Ke Kanan", Peringatan, &["tikungan ganda", "zigzag"]),
    label(17, "Tikungan Ganda Pertama Ke Kiri", Peringatan, &["tikungan ganda", "zigzag"]),
    label(18, "Banyak Tikungan Pertama Kanan", Peringatan, &["banyak tikungan", "meliuk"]),
    label(19, "Banyak Tikungan Pertama Kiri", Peringatan, &["banyak tikungan", "meliuk"]),
    label(20, "Persimpangan 4", Peringatan, &["persimpangan empat", "perempatan", "persimpangan"]),
    label(21, "Persimpangan 3", Peringatan, &["persimpangan tiga", "pertigaan", "persimpangan"]),
    label(22, "Penyeberangan Pejalan Kaki", Peringatan, &["penyeberangan", "pejalan kaki"]),
    label(23, "Lampu Lalu Lintas", Peringatan, &["lampu", "lalu lintas"]),
    label(24, "Jalan Licin", Peringatan, &["licin"]),
    label(25, "Tempat Parkir", Petunjuk, &["tempat parkir", "parkir"]),
    label(26, "Rumah Sakit", Petunjuk, &["rumah sakit"]),
    label(27, "SPBU", Petunjuk, &["spbu", "bahan bakar"]),
    label(28, "Tempat Ibadah", Petunjuk, &["ibadah", "masjid"]),
    label(29, "Halte Bus", Petunjuk, &["halte", "bus"]),
];

/// Read-only view over the hardcoded label dictionary
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelTable;

impl LabelTable {
    pub fn get(&self, class_id: u32) -> Option<&'static SignLabel> {
        LABELS.iter().find(|l| l.class_id == class_id)
    }

    pub fn all(&self) -> &'static [SignLabel] {
        LABELS
    }

    pub fn len(&self) -> usize {
        LABELS.len()
    }

    pub fn is_empty(&self) -> bool {
        LABELS.is_empty()
    }

    /// Match free text (a vision model's answer) back to a label.
    ///
    /// Returns the label and how strong the match was: a name equal to or
    /// contained in the text scores 0.85, the best keyword overlap 0.5.
    pub fn match_text(&self, text: &str) -> Option<(&'static SignLabel, f32)> {
        let text = normalize(text);
        if text.is_empty() {
            return None;
        }

        if let Some(l) = LABELS.iter().find(|l| normalize(l.name) == text) {
            return Some((l, 0.85));
        }

        // longest contained name wins so "Tikungan Ganda Pertama Ke Kiri"
        // beats "Tikungan Ke Kiri"
        if let Some(l) = LABELS
            .iter()
            .filter(|l| text.contains(&normalize(l.name)))
            .max_by_key(|l| l.name.len())
        {
            return Some((l, 0.85));
        }

        LABELS
            .iter()
            .filter_map(|l| {
                let hits = l.keywords.iter().filter(|k| text.contains(*k)).count();
                (hits > 0).then_some((l, hits))
            })
            .max_by_key(|(l, hits)| (*hits, std::cmp::Reverse(l.class_id)))
            .map(|(l, _)| (l, 0.5))
    }

    /// Names listed one per line, for model prompts
    pub fn prompt_list(&self) -> String {
        LABELS.iter().map(|l| format!("- {}", l.name)).collect::<Vec<_>>().join("\n")
    }
}

fn normalize(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_ids_are_unique_and_dense() {
        let table = LabelTable;
        for (i, l) in table.all().iter().enumerate() {
            assert_eq!(l.class_id as usize, i, "class ids must follow table order");
            assert!(!l.keywords.is_empty(), "{} has no keywords", l.name);
        }
        assert!(table.get(table.len() as u32).is_none());
    }

    #[test]
    fn lookup_by_class() {
        let l = LabelTable.get(0).unwrap();
        assert_eq!(l.name, "Dilarang Parkir");
        assert_eq!(l.kategori, Category::Larangan);
    }

    #[test]
    fn text_matching_prefers_exact_then_longest_name() {
        let table = LabelTable;
        let (l, score) = table.match_text("  dilarang PARKIR.").unwrap();
        assert_eq!(l.class_id, 0);
        assert_eq!(score, 0.85);

        let (l, _) = table
            .match_text("This is a Tikungan Ganda Pertama Ke Kiri sign")
            .unwrap();
        assert_eq!(l.name, "Tikungan Ganda Pertama Ke Kiri");

        let (l, score) = table.match_text("a zigzag road warning").unwrap();
        assert_eq!(l.class_id, 16);
        assert_eq!(score, 0.5);

        assert!(table.match_text("a cat on a sofa").is_none());
        assert!(table.match_text("").is_none());
    }
}
