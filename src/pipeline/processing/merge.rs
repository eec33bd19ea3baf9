use std::fmt;

use crate::constants::{
    FALLBACK_COUNTRY_SUFFIX, FIELD_DELIMITER, PRIMARY_MIN_FIELDS, PRIMARY_TRAILING_FIELDS,
    SECONDARY_FIELDS,
};
use crate::error::{MergeError, Result};

/// A primary file line split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryRecord {
    pub user: String,
    /// Middle tokens joined back with the delimiter; may be empty
    pub skins: String,
    pub ea: String,
    pub el: String,
    pub tag: String,
}

impl PrimaryRecord {
    pub fn parse(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split(FIELD_DELIMITER).collect();
        let user = user_of(line);
        if parts.len() < PRIMARY_MIN_FIELDS {
            return Err(MergeError::malformed(
                user,
                format!(
                    "primary line has {} fields, expected at least {}",
                    parts.len(),
                    PRIMARY_MIN_FIELDS
                ),
            ));
        }

        let trailing = parts.len() - PRIMARY_TRAILING_FIELDS;
        let delimiter = FIELD_DELIMITER.to_string();
        Ok(Self {
            user: user.to_string(),
            skins: parts[1..trailing].join(&delimiter),
            ea: parts[trailing].trim().to_string(),
            el: parts[trailing + 1].trim().to_string(),
            tag: parts[trailing + 2].trim().to_string(),
        })
    }
}

/// A secondary file line holding account attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryRecord {
    pub user: String,
    pub password: String,
    pub server: String,
    pub email: String,
    pub birth_date: String,
    pub creation_date: String,
    pub country: String,
}

impl SecondaryRecord {
    /// `user` names the primary record the line was matched for, used in the error only.
    pub fn parse(line: &str, user: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split(FIELD_DELIMITER).map(str::trim).collect();
        if parts.len() < SECONDARY_FIELDS {
            return Err(MergeError::malformed(
                user,
                format!(
                    "matched secondary line has {} fields, expected {}",
                    parts.len(),
                    SECONDARY_FIELDS
                ),
            ));
        }

        Ok(Self {
            user: parts[0].to_string(),
            password: parts[1].to_string(),
            server: parts[2].to_string(),
            email: parts[3].to_string(),
            birth_date: parts[4].to_string(),
            creation_date: parts[5].to_string(),
            country: parts[6].to_string(),
        })
    }
}

/// The output unit of the merge step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CombinedRecord {
    /// Primary record joined with its account data
    Merged {
        primary: PrimaryRecord,
        secondary: SecondaryRecord,
    },
    /// Primary line kept verbatim, no account data was found
    Fallback { line: String },
}

impl fmt::Display for CombinedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombinedRecord::Merged { primary, secondary } => write!(
                f,
                "{}:{}:{}:{}:{}:{}:{}:{}:{}:{}:{}",
                primary.user,
                secondary.password,
                secondary.server,
                secondary.email,
                secondary.birth_date,
                secondary.creation_date,
                secondary.country,
                primary.skins,
                primary.ea,
                primary.el,
                primary.tag
            ),
            CombinedRecord::Fallback { line } => write!(f, "{}{}", line, FALLBACK_COUNTRY_SUFFIX),
        }
    }
}

/// Outcome of merging one primary line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged(String),
    Fallback(String),
    Skip,
}

impl MergeOutcome {
    pub fn line(&self) -> Option<&str> {
        match self {
            MergeOutcome::Merged(line) | MergeOutcome::Fallback(line) => Some(line),
            MergeOutcome::Skip => None,
        }
    }
}

/// The user key of a primary line: everything before the first delimiter, trimmed
pub fn user_of(line: &str) -> &str {
    line.split(FIELD_DELIMITER).next().unwrap_or("").trim()
}

/// First secondary line whose raw text contains `user`.
///
/// This is substring containment, not key equality: a short user such as `al` also matches
/// a line for `alice` if that line comes first.
pub fn find_secondary<'a>(user: &str, secondary_lines: &'a [String]) -> Option<&'a str> {
    secondary_lines
        .iter()
        .find(|line| line.contains(user))
        .map(String::as_str)
}

/// Combine a primary line with the first secondary line that mentions its user.
pub fn combine(primary: &str, secondary_lines: &[String]) -> Result<CombinedRecord> {
    let user = user_of(primary);
    if user.is_empty() {
        return Err(MergeError::malformed(user, "primary line has an empty user"));
    }
    match find_secondary(user, secondary_lines) {
        Some(secondary_line) => {
            let primary_record = PrimaryRecord::parse(primary)?;
            let secondary_record = SecondaryRecord::parse(secondary_line, user)?;
            Ok(CombinedRecord::Merged {
                primary: primary_record,
                secondary: secondary_record,
            })
        }
        None => Ok(CombinedRecord::Fallback {
            line: primary.to_string(),
        }),
    }
}

/// Merge a primary line into its output text, or signal that it produces nothing.
pub fn merge(primary: &str, secondary_lines: &[String]) -> Result<MergeOutcome> {
    let combined = combine(primary, secondary_lines)?;
    let line = combined.to_string();
    if line.trim().is_empty() {
        return Ok(MergeOutcome::Skip);
    }
    Ok(match combined {
        CombinedRecord::Merged { .. } => MergeOutcome::Merged(line),
        CombinedRecord::Fallback { .. } => MergeOutcome::Fallback(line),
    })
}
