/// Ordered literal replacements applied to every finished line.
///
/// Order matters: the rarity rules (`Epic` -> `EPIC`, `None` -> `DEFAULT`) run before the
/// `(kEPIC) (DEFAULT)` style rules so the composite rules see the upper-cased forms.
pub const NORMALIZATION_TABLE: &[(&str, &str)] = &[
    (" (Permanent):", ""),
    ("(Shard)", ""),
    ("None", "DEFAULT"),
    ("Epic", "EPIC"),
    ("Legendary", "LEGENDARY"),
    ("Ultimate", "ULTIMATE"),
    ("Mythic", "MYTHIC"),
    ("PROJECT:", "PROJECT-"),
    ("Pentakill III:", "Pentakill III-"),
    ("(kEPIC) (DEFAULT)", "(EPIC)"),
    ("(kLEGENDARY) (DEFAULT)", "(LEGENDARY)"),
    ("(kULTIMATE) (DEFAULT)", "(ULTIMATE)"),
    ("(kMYTHIC) (DEFAULT)", "(MYTHIC)"),
    ("(kDEFAULT) (DEFAULT)", "(DEFAULT)"),
];

/// Trait for the final string rewrite step of the pipeline
pub trait Normalizer: Send + Sync {
    fn normalize(&self, line: &str) -> String;
}

/// Applies [`NORMALIZATION_TABLE`] in order, each entry replacing all occurrences.
///
/// The table pass is repeated until the line is stable. For ordinary lines that is one
/// pass; a second pass only happens when a deletion glues together a match for an earlier
/// rule (e.g. `"No(Shard)ne"` is handled within one pass, but
/// `"(kEPIC) (kDEFAULT) (DEFAULT)"` needs two). Every rule either shortens the line or
/// consumes characters no replacement produces, so the loop terminates.
#[derive(Debug, Default, Clone, Copy)]
pub struct TableNormalizer;

impl TableNormalizer {
    pub fn new() -> Self {
        Self
    }

    fn single_pass(line: &str) -> String {
        NORMALIZATION_TABLE
            .iter()
            .fold(line.to_string(), |acc, (from, to)| {
                if acc.contains(from) {
                    acc.replace(from, to)
                } else {
                    acc
                }
            })
    }
}

impl Normalizer for TableNormalizer {
    fn normalize(&self, line: &str) -> String {
        let mut current = Self::single_pass(line);
        loop {
            let next = Self::single_pass(&current);
            if next == current {
                return current;
            }
            current = next;
        }
    }
}

/// Convenience wrapper around [`TableNormalizer`]
pub fn normalize(line: &str) -> String {
    TableNormalizer.normalize(line)
}
