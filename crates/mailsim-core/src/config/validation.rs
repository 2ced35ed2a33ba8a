//! Structural validation of configuration documents.

/// A structural problem found while converting a configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// An operation has no `OperationName`.
    EmptyOperationName {
        /// Element name of the operation.
        kind: &'static str,
    },
    /// A numeric attribute does not hold a non-negative integer.
    InvalidNumber {
        /// Operation, group or task the attribute belongs to.
        owner: String,
        /// Attribute name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// A boolean attribute is neither `true`/`false` nor `1`/`0`.
    InvalidBool {
        /// Operation or document the attribute belongs to.
        owner: String,
        /// Attribute name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// Both explicit and random recipients are configured.
    ConflictingRecipients {
        /// Operation name.
        operation: String,
    },
    /// Both explicit and random attachments are configured.
    ConflictingAttachments {
        /// Operation name.
        operation: String,
    },
    /// A required folder or name reference is empty.
    EmptyReference {
        /// Operation, group or task the attribute belongs to.
        owner: String,
        /// Attribute name.
        field: &'static str,
    },
    /// A group repeats zero times.
    ZeroIterations {
        /// Group name.
        group: String,
    },
    /// The `Provider` attribute names no known backend.
    UnknownProvider(String),
}

impl ValidationError {
    /// Get the attribute or element this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyOperationName { .. } => "OperationName",
            Self::InvalidNumber { field, .. }
            | Self::InvalidBool { field, .. }
            | Self::EmptyReference { field, .. } => *field,
            Self::ConflictingRecipients { .. } => "Recipients",
            Self::ConflictingAttachments { .. } => "Attachments",
            Self::ZeroIterations { .. } => "Iterations",
            Self::UnknownProvider(_) => "Provider",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyOperationName { kind } => write!(f, "{kind} has no OperationName"),
            Self::InvalidNumber {
                owner,
                field,
                value,
            } => write!(
                f,
                "{owner}: {field} must be a non-negative integer, got {value:?}"
            ),
            Self::InvalidBool {
                owner,
                field,
                value,
            } => write!(f, "{owner}: {field} must be true or false, got {value:?}"),
            Self::ConflictingRecipients { operation } => write!(
                f,
                "{operation}: Recipients and RandomRecipients are mutually exclusive"
            ),
            Self::ConflictingAttachments { operation } => write!(
                f,
                "{operation}: Attachments and RandomAttachments are mutually exclusive"
            ),
            Self::EmptyReference { owner, field } => write!(f, "{owner}: {field} is required"),
            Self::ZeroIterations { group } => {
                write!(f, "{group}: Iterations must be at least 1")
            }
            Self::UnknownProvider(value) => write!(f, "unknown provider {value:?}"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Accumulates validation errors while a document is converted.
#[derive(Debug, Default)]
pub(crate) struct Validator {
    errors: Vec<ValidationError>,
}

impl Validator {
    pub(crate) fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Parse an optional non-negative integer attribute.
    pub(crate) fn number<T: std::str::FromStr>(
        &mut self,
        owner: &str,
        field: &'static str,
        raw: Option<&str>,
    ) -> Option<T> {
        let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
        raw.parse().map_or_else(
            |_| {
                self.push(ValidationError::InvalidNumber {
                    owner: owner.to_string(),
                    field,
                    value: raw.to_string(),
                });
                None
            },
            Some,
        )
    }

    /// Parse an optional boolean attribute, defaulting to `false`.
    pub(crate) fn flag(&mut self, owner: &str, field: &'static str, raw: Option<&str>) -> bool {
        match raw.map(str::trim) {
            None | Some("") => false,
            Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => true,
            Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => false,
            Some(v) => {
                self.push(ValidationError::InvalidBool {
                    owner: owner.to_string(),
                    field,
                    value: v.to_string(),
                });
                false
            }
        }
    }

    /// Require a non-blank reference, returning it trimmed.
    pub(crate) fn required(
        &mut self,
        owner: &str,
        field: &'static str,
        raw: Option<&str>,
    ) -> String {
        let value = raw.map(str::trim).unwrap_or_default();
        if value.is_empty() {
            self.push(ValidationError::EmptyReference {
                owner: owner.to_string(),
                field,
            });
        }
        value.to_string()
    }

    /// Finish validation.
    pub(crate) fn finish<T>(self, value: T) -> crate::Result<T> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(crate::Error::Validation(self.errors))
        }
    }
}
