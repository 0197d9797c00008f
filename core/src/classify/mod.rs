//! Package classification
//!
//! Two independent classifiers look at a package: [`PathClassifier`] reads the
//! asset file layout, [`ChangedItemClassifier`] reads the host's changed-item
//! list. [`merge`] combines them with a fixed precedence.

mod changed_items;
mod merge;
mod path;
mod record;

use std::collections::BTreeMap;

pub use changed_items::{ChangedItemClassifier, ChangedItemReport};
pub use merge::merge;
pub use path::{PathClassifier, PathReport, pose_evidence_for_path};
pub use record::{AnimationCategory, Classification, ClassificationRecord};

use crate::host::ChangedItemMeta;

/// Run both classifiers over one package and merge the results
pub fn classify_package<S: AsRef<str>>(
    classifier: &PathClassifier,
    paths: &[S],
    changed_items: &BTreeMap<String, ChangedItemMeta>,
) -> Classification {
    let from_paths = classifier.classify(paths).classification;
    let from_items = ChangedItemClassifier::classify(changed_items).classification;
    merge(&from_paths, &from_items)
}
