//! Error types for registration, conversion and host operations.
//!
//! ## Error Hierarchy
//!
//! ```text
//! HostError (host error channel)
//! ├── RegistrationError - type/enum registration usage errors
//! ├── ConversionError   - value marshalling failures
//! └── runtime variants  - stale handles, missing capabilities, attribute errors, ...
//! ```
//!
//! Build-time contract violations (oversized payloads, a second base, a
//! disallowed enum trait) never reach these types: they are rejected by the
//! compiler.

use thiserror::Error;

// ============================================================================
// Registration Errors
// ============================================================================

/// Usage errors raised while registering types and enum entries.
///
/// A registration that fails with one of these leaves no partially
/// installed type behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// The native type has already been bound.
    #[error("type '{name}' is already registered (native type {native})")]
    AlreadyRegistered {
        /// Name of the existing binding.
        name: String,
        /// Rust name of the native type.
        native: &'static str,
    },

    /// The target scope already has an attribute with this name.
    #[error("scope '{scope}' already defines '{name}'")]
    NameCollision {
        /// The scope's name.
        scope: String,
        /// The colliding attribute name.
        name: String,
    },

    /// The requested base type has never been bound.
    #[error("base type {base} of '{name}' has not been registered")]
    UnknownBase {
        /// The type being registered.
        name: String,
        /// Rust name of the missing base.
        base: &'static str,
    },

    /// The requested base type is final.
    #[error("cannot derive '{name}' from final type '{base}'")]
    FinalBase {
        /// The type being registered.
        name: String,
        /// The final base type.
        base: String,
    },

    /// The scope handle does not refer to a scope or a type.
    #[error("'{name}' cannot be registered into a {found} object")]
    InvalidScope {
        /// The type being registered.
        name: String,
        /// Kind of object found instead.
        found: &'static str,
    },

    /// A duplicate enum entry name.
    #[error("duplicate enum value: '{value_name}' in enum '{enum_name}'")]
    DuplicateEnumEntry {
        /// The enum name.
        enum_name: String,
        /// The duplicate entry name.
        value_name: String,
    },

    /// Exporting enum entries would overwrite an attribute of the scope.
    #[error("cannot export '{name}' of enum '{enum_name}': the enclosing scope already defines it")]
    ExportCollision {
        /// The enum name.
        enum_name: String,
        /// The colliding entry name.
        name: String,
    },

    /// The type is not an enum.
    #[error("'{0}' is not an enum type")]
    NotAnEnum(String),
}

// ============================================================================
// Conversion Errors
// ============================================================================

/// Failures while converting host values to native values.
///
/// Overload dispatch treats these as "this overload does not apply" and
/// moves on to the next candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// The host value has the wrong type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type name.
        expected: String,
        /// Actual value kind.
        actual: String,
    },

    /// An integer does not fit the target type.
    #[error("integer overflow: {value} does not fit in {target_type}")]
    IntegerOverflow {
        /// The value that overflowed.
        value: i64,
        /// The target type name.
        target_type: &'static str,
    },

    /// Wrong number of arguments.
    #[error("expected {expected} arguments, got {actual}")]
    ArgumentCount {
        /// Expected count.
        expected: usize,
        /// Actual count.
        actual: usize,
    },

    /// The instance has no constructed payload.
    #[error("instance of '{type_name}' is not ready")]
    NotReady {
        /// Name of the instance's type.
        type_name: String,
    },
}

// ============================================================================
// Host Errors
// ============================================================================

/// The host error channel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    /// A registration usage error.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// A conversion failure.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// The handle refers to an object that no longer exists.
    #[error("stale object handle")]
    StaleHandle,

    /// The handle does not refer to a bound type.
    #[error("expected a bound type, found a {found} object")]
    NotAType {
        /// Kind of object found instead.
        found: &'static str,
    },

    /// The handle does not refer to an instance of a bound type.
    #[error("expected an instance of a bound type, found a {found} object")]
    NotAnInstance {
        /// Kind of object found instead.
        found: &'static str,
    },

    /// No supplement of the requested kind was reserved for the type.
    #[error("type '{type_name}' has no supplement of the requested kind")]
    NoSupplement {
        /// The type's name.
        type_name: String,
    },

    /// The type does not support the requested operation.
    #[error("type '{type_name}' is not {capability}")]
    MissingCapability {
        /// The type's name.
        type_name: String,
        /// Description of the missing capability.
        capability: &'static str,
    },

    /// A copy or move between instances of different native types.
    #[error("cannot {op} '{src}' into '{dst}'")]
    TypeMismatch {
        /// The attempted operation.
        op: &'static str,
        /// Destination type name.
        dst: String,
        /// Source type name.
        src: String,
    },

    /// The attribute does not exist.
    #[error("'{owner}' has no attribute '{name}'")]
    AttributeError {
        /// Name of the object looked up.
        owner: String,
        /// The attribute name.
        name: String,
    },

    /// The attribute exists but cannot be assigned.
    #[error("attribute '{name}' of '{owner}' is read-only")]
    ReadOnlyAttribute {
        /// Name of the object.
        owner: String,
        /// The attribute name.
        name: String,
    },

    /// The object cannot be called.
    #[error("'{found}' object is not callable")]
    NotCallable {
        /// Kind of object called.
        found: &'static str,
    },

    /// The type defines no initializer.
    #[error("cannot create '{type_name}' instances")]
    NoInitializer {
        /// The type's name.
        type_name: String,
    },

    /// Every overload rejected the arguments.
    #[error("no overload of '{name}' accepts the given arguments{}", last_error_suffix(.last_error))]
    NoMatchingOverload {
        /// Function name.
        name: String,
        /// Conversion failure of the last overload tried.
        last_error: Option<ConversionError>,
    },

    /// A value outside the domain of the operation (e.g. an unknown enum value).
    #[error("{0}")]
    Value(String),

    /// Failure reported by native code.
    #[error("{0}")]
    Native(String),
}

fn last_error_suffix(last: &Option<ConversionError>) -> String {
    match last {
        Some(err) => format!(" ({err})"),
        None => String::new(),
    }
}

/// Result alias for host operations.
pub type HostResult<T> = Result<T, HostError>;

impl HostError {
    /// Whether this error means "the arguments did not match", so overload
    /// dispatch should try the next candidate.
    pub fn is_conversion(&self) -> bool {
        matches!(self, HostError::Conversion(_))
    }
}
