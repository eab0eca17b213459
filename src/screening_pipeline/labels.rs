use std::borrow::Cow;

/// Condition names of the reference classifier build, in output order.
pub const REFERENCE_LABELS: [&str; 10] = [
    "Eczema",
    "Warts Molluscum and other Viral Infections",
    "Melanoma",
    "Atopic Dermatitis",
    "Basal Cell Carcinoma (BCC)",
    "Melanocytic Nevi (NV)",
    "Benign Keratosis-like Lesions (BKL)",
    "Psoriasis pictures Lichen Planus and related diseases",
    "Seborrheic Keratoses and other Benign Tumors",
    "Tinea Ringworm Candidiasis and other Fungal Infections",
];

pub const REFERENCE_LABELS_VERSION: &str = "skin-10-v1";

/// Index → condition name mapping shipped with one classifier build.
///
/// The version string must change whenever the classifier's class order does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabelTable {
    version: String,
    labels: Vec<String>,
}

impl ClassLabelTable {
    pub fn new(version: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            version: version.into(),
            labels,
        }
    }

    pub fn reference() -> Self {
        Self::new(
            REFERENCE_LABELS_VERSION,
            REFERENCE_LABELS.iter().map(|s| s.to_string()).collect(),
        )
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Name for `index`, or a synthesized "Unknown Class N" past the table's end.
    pub fn label_for(&self, index: usize) -> Cow<'_, str> {
        match self.get(index) {
            Some(label) => Cow::Borrowed(label),
            None => Cow::Owned(format!("Unknown Class {}", index)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

impl Default for ClassLabelTable {
    fn default() -> Self {
        Self::reference()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_table() {
        let table = ClassLabelTable::reference();
        assert_eq!(table.len(), 10);
        assert_eq!(table.version(), "skin-10-v1");
        assert_eq!(table.get(0), Some("Eczema"));
        assert_eq!(table.get(4), Some("Basal Cell Carcinoma (BCC)"));
        assert_eq!(table.get(10), None);
    }

    #[test]
    fn out_of_range_index_gets_synthesized_label() {
        let table = ClassLabelTable::reference();
        assert_eq!(table.label_for(2), "Melanoma");
        assert_eq!(table.label_for(12), "Unknown Class 12");
    }
}
