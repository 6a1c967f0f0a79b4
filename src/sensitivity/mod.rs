pub mod policy;

pub use policy::{ComplianceNotes, ComplianceRecord, PolicyScope, PolicyTable, SensitivityEntry};

/// A label, or pair of labels, to resolve against the policy table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelQuery<'a> {
    Domain(&'a str),
    Owner(&'a str),
    /// Both signals; resolves to the higher of the two
    Pair { domain: &'a str, owner: &'a str },
}
