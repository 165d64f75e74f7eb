use crate::types::Phase;
use regex::Regex;
use std::sync::LazyLock;

// `CT`, optional `_`, the phase marker, then `_` or the end of the label.
static REFERENCE_SERIES: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^CT_?0(_|$)").expect("valid series pattern"));
static BREATHING_SERIES: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^CT_?50(_|$)").expect("valid series pattern"));

// `UNET`, one variant digit, `_`, the phase marker and nothing else.
static REFERENCE_STRUCTURE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^UNET\d_0$").expect("valid structure pattern"));
static BREATHING_STRUCTURE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^UNET\d_50$").expect("valid structure pattern"));

/// Classifies an image label of a series. Returns `None` for unmatched labels.
pub fn classify_series(label: &str) -> Option<Phase> {
	if REFERENCE_SERIES.is_match(label) {
		Some(Phase::Reference)
	} else if BREATHING_SERIES.is_match(label) {
		Some(Phase::Breathing)
	} else {
		None
	}
}

/// Classifies a structure label. The whole label must match.
pub fn classify_structure(label: &str) -> Option<Phase> {
	if REFERENCE_STRUCTURE.is_match(label) {
		Some(Phase::Reference)
	} else if BREATHING_STRUCTURE.is_match(label) {
		Some(Phase::Breathing)
	} else {
		None
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn series_labels() {
		for label in ["CT_0", "CT0", "CT_0_1", "CT0_AVG"] {
			assert_eq!(classify_series(label), Some(Phase::Reference), "{label}");
		}
		for label in ["CT_50", "CT50", "CT_50_1", "CT50_x"] {
			assert_eq!(classify_series(label), Some(Phase::Breathing), "{label}");
		}
	}

	#[test]
	fn unmatched_series_labels() {
		for label in ["", "CT", "CT_", "CT_05", "CT_500", "ct_0", "CT__0", "CBCT_0", " CT_0", "CT_0-1"] {
			assert_eq!(classify_series(label), None, "{label}");
		}
	}

	#[test]
	fn structure_labels_require_full_match() {
		assert_eq!(classify_structure("UNET1_0"), Some(Phase::Reference));
		assert_eq!(classify_structure("UNET9_50"), Some(Phase::Breathing));
		assert_eq!(classify_structure("UNET1_0extra"), None);
		assert_eq!(classify_structure("UNET_0"), None);
		assert_eq!(classify_structure("UNET12_0"), None);
		assert_eq!(classify_structure("xUNET1_0"), None);
		assert_eq!(classify_structure("unet1_0"), None);
		assert_eq!(classify_structure("UNET1_5"), None);
	}

	#[test]
	fn series_and_structure_rules_are_independent() {
		assert_eq!(classify_structure("CT_0"), None);
		assert_eq!(classify_series("UNET1_0"), None);
	}
}
