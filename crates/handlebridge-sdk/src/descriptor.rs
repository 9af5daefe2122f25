//! Type descriptors and member signatures
//!
//! The remote runtime resolves overloads from compact descriptor strings.
//! Primitive kinds use single letters (`Z B C S I J F D V`), reference types
//! are written `L<path>;` with `/` separators, and arrays prefix their
//! element type with `[`.
//!
//! Member signatures wrap descriptors:
//!
//! ```text
//! C/<class>(<params>)          constructor
//! M/<name>(<params>)<return>   instance method
//! F/<name>-<type>              instance field
//! S-M/... S-F/...              static method / field
//! ```

use crate::error::{AbiResult, NativeError};
use std::fmt;

/// Deepest array nesting accepted in descriptors and marshalled values
pub const MAX_NESTING_DEPTH: usize = 64;

// ============================================================================
// TypeDescriptor
// ============================================================================

/// Descriptor for a single parameter, return or field type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    /// `Z`
    Boolean,
    /// `B`
    Byte,
    /// `C`
    Char,
    /// `S`
    Short,
    /// `I`
    Int,
    /// `J`
    Long,
    /// `F`
    Float,
    /// `D`
    Double,
    /// `V`, only valid as a return type
    Void,
    /// `L<path>;` where path uses `/` separators
    Object(String),
    /// `[<element>`
    Array(Box<TypeDescriptor>),
}

impl TypeDescriptor {
    /// Path of the root reference type
    pub const OBJECT_PATH: &'static str = "java/lang/Object";

    /// Path of the string type
    pub const STRING_PATH: &'static str = "java/lang/String";

    /// Reference type for a dotted or slashed class name
    pub fn object(class_name: &str) -> Self {
        TypeDescriptor::Object(class_name.replace('.', "/"))
    }

    /// The root reference type, used when nothing more specific is known
    pub fn any() -> Self {
        TypeDescriptor::Object(Self::OBJECT_PATH.to_string())
    }

    /// The string reference type
    pub fn string() -> Self {
        TypeDescriptor::Object(Self::STRING_PATH.to_string())
    }

    /// Array of `element`
    pub fn array_of(element: TypeDescriptor) -> Self {
        TypeDescriptor::Array(Box::new(element))
    }

    /// Whether this is a primitive (single-letter) descriptor
    pub fn is_primitive(&self) -> bool {
        !matches!(self, TypeDescriptor::Object(_) | TypeDescriptor::Array(_))
    }

    /// Parse a complete descriptor string
    pub fn parse(s: &str) -> AbiResult<Self> {
        let (descriptor, rest) = Self::parse_prefix(s)?;
        if !rest.is_empty() {
            return Err(NativeError::ArgumentError(format!(
                "trailing input '{}' after type descriptor",
                rest
            )));
        }
        Ok(descriptor)
    }

    /// Parse one descriptor from the front of `s`, returning the remainder
    pub fn parse_prefix(s: &str) -> AbiResult<(Self, &str)> {
        Self::parse_prefix_at(s, 0)
    }

    fn parse_prefix_at(s: &str, depth: usize) -> AbiResult<(Self, &str)> {
        if depth > MAX_NESTING_DEPTH {
            return Err(NativeError::ArgumentError(format!(
                "array descriptor nested deeper than {} levels",
                MAX_NESTING_DEPTH
            )));
        }
        let first = s
            .chars()
            .next()
            .ok_or_else(|| NativeError::ArgumentError("empty type descriptor".to_string()))?;
        let rest = &s[first.len_utf8()..];
        let descriptor = match first {
            'Z' => TypeDescriptor::Boolean,
            'B' => TypeDescriptor::Byte,
            'C' => TypeDescriptor::Char,
            'S' => TypeDescriptor::Short,
            'I' => TypeDescriptor::Int,
            'J' => TypeDescriptor::Long,
            'F' => TypeDescriptor::Float,
            'D' => TypeDescriptor::Double,
            'V' => TypeDescriptor::Void,
            'L' => {
                let end = rest.find(';').ok_or_else(|| {
                    NativeError::ArgumentError(format!("unterminated reference type in '{}'", s))
                })?;
                if end == 0 {
                    return Err(NativeError::ArgumentError(
                        "reference type with empty class path".to_string(),
                    ));
                }
                return Ok((TypeDescriptor::Object(rest[..end].to_string()), &rest[end + 1..]));
            }
            '[' => {
                let (element, rest) = Self::parse_prefix_at(rest, depth + 1)?;
                if element == TypeDescriptor::Void {
                    return Err(NativeError::ArgumentError("array of void".to_string()));
                }
                return Ok((TypeDescriptor::array_of(element), rest));
            }
            other => {
                return Err(NativeError::ArgumentError(format!(
                    "unknown type descriptor '{}'",
                    other
                )))
            }
        };
        Ok((descriptor, rest))
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Boolean => write!(f, "Z"),
            TypeDescriptor::Byte => write!(f, "B"),
            TypeDescriptor::Char => write!(f, "C"),
            TypeDescriptor::Short => write!(f, "S"),
            TypeDescriptor::Int => write!(f, "I"),
            TypeDescriptor::Long => write!(f, "J"),
            TypeDescriptor::Float => write!(f, "F"),
            TypeDescriptor::Double => write!(f, "D"),
            TypeDescriptor::Void => write!(f, "V"),
            TypeDescriptor::Object(path) => write!(f, "L{};", path),
            TypeDescriptor::Array(element) => write!(f, "[{}", element),
        }
    }
}

// ============================================================================
// Signature
// ============================================================================

/// A member signature as exchanged with the remote runtime
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Signature {
    /// Constructor of `class_name`
    Constructor {
        /// Class being constructed
        class_name: String,
        /// Parameter types
        params: Vec<TypeDescriptor>,
    },
    /// Method
    Method {
        /// Method name
        name: String,
        /// Static (class-level) method
        is_static: bool,
        /// Parameter types
        params: Vec<TypeDescriptor>,
        /// Return type
        returns: TypeDescriptor,
    },
    /// Field
    Field {
        /// Field name
        name: String,
        /// Static (class-level) field
        is_static: bool,
        /// Field type
        ty: TypeDescriptor,
    },
}

impl Signature {
    /// Member name (the class name for constructors)
    pub fn name(&self) -> &str {
        match self {
            Signature::Constructor { class_name, .. } => class_name,
            Signature::Method { name, .. } | Signature::Field { name, .. } => name,
        }
    }

    /// Whether the member is static
    pub fn is_static(&self) -> bool {
        match self {
            Signature::Constructor { .. } => false,
            Signature::Method { is_static, .. } | Signature::Field { is_static, .. } => *is_static,
        }
    }

    /// Parse an encoded signature
    pub fn parse(s: &str) -> AbiResult<Self> {
        let (is_static, body) = match s.strip_prefix("S-") {
            Some(body) => (true, body),
            None => (false, s),
        };

        if let Some(body) = body.strip_prefix("C/") {
            if is_static {
                return Err(NativeError::ArgumentError(format!(
                    "constructor cannot be static: '{}'",
                    s
                )));
            }
            let (class_name, params, rest) = split_call(body)?;
            if !rest.is_empty() {
                return Err(NativeError::ArgumentError(format!(
                    "constructor has a return type: '{}'",
                    s
                )));
            }
            return Ok(Signature::Constructor {
                class_name: class_name.to_string(),
                params,
            });
        }

        if let Some(body) = body.strip_prefix("M/") {
            let (name, params, rest) = split_call(body)?;
            return Ok(Signature::Method {
                name: name.to_string(),
                is_static,
                params,
                returns: TypeDescriptor::parse(rest)?,
            });
        }

        if let Some(body) = body.strip_prefix("F/") {
            let (name, ty) = body.split_once('-').ok_or_else(|| {
                NativeError::ArgumentError(format!("field signature missing type: '{}'", s))
            })?;
            if name.is_empty() {
                return Err(NativeError::ArgumentError(format!("field without name: '{}'", s)));
            }
            let ty = TypeDescriptor::parse(ty)?;
            if ty == TypeDescriptor::Void {
                return Err(NativeError::ArgumentError(format!("void field: '{}'", s)));
            }
            return Ok(Signature::Field {
                name: name.to_string(),
                is_static,
                ty,
            });
        }

        Err(NativeError::ArgumentError(format!(
            "unknown signature kind: '{}'",
            s
        )))
    }
}

/// Split `name(params)rest` into its parts
fn split_call(body: &str) -> AbiResult<(&str, Vec<TypeDescriptor>, &str)> {
    let open = body
        .find('(')
        .ok_or_else(|| NativeError::ArgumentError(format!("missing parameter list: '{}'", body)))?;
    let name = &body[..open];
    if name.is_empty() {
        return Err(NativeError::ArgumentError(format!("member without name: '{}'", body)));
    }

    let mut rest = &body[open + 1..];
    let mut params = Vec::new();
    loop {
        if let Some(after) = rest.strip_prefix(')') {
            return Ok((name, params, after));
        }
        let (param, next) = TypeDescriptor::parse_prefix(rest)?;
        if param == TypeDescriptor::Void {
            return Err(NativeError::ArgumentError(format!("void parameter in '{}'", body)));
        }
        params.push(param);
        rest = next;
    }
}

fn write_params(f: &mut fmt::Formatter<'_>, params: &[TypeDescriptor]) -> fmt::Result {
    write!(f, "(")?;
    for param in params {
        write!(f, "{}", param)?;
    }
    write!(f, ")")
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_static() {
            write!(f, "S-")?;
        }
        match self {
            Signature::Constructor { class_name, params } => {
                write!(f, "C/{}", class_name)?;
                write_params(f, params)
            }
            Signature::Method {
                name,
                params,
                returns,
                ..
            } => {
                write!(f, "M/{}", name)?;
                write_params(f, params)?;
                write!(f, "{}", returns)
            }
            Signature::Field { name, ty, .. } => write!(f, "F/{}-{}", name, ty),
        }
    }
}

// ============================================================================
// InterfaceSchema
// ============================================================================

/// The member list an exported local object advertises to the remote side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSchema {
    class_name: String,
    signatures: Vec<Signature>,
}

impl InterfaceSchema {
    /// Empty schema for `class_name`
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            signatures: Vec::new(),
        }
    }

    /// Rebuild a schema from its encoded signature strings
    pub fn decode<S: AsRef<str>>(class_name: impl Into<String>, encoded: &[S]) -> AbiResult<Self> {
        let signatures = encoded
            .iter()
            .map(|s| Signature::parse(s.as_ref()))
            .collect::<AbiResult<Vec<_>>>()?;
        Ok(Self {
            class_name: class_name.into(),
            signatures,
        })
    }

    /// Add a constructor
    pub fn constructor(mut self, params: Vec<TypeDescriptor>) -> Self {
        self.signatures.push(Signature::Constructor {
            class_name: self.class_name.clone(),
            params,
        });
        self
    }

    /// Add an instance method
    pub fn method(mut self, name: &str, params: Vec<TypeDescriptor>, returns: TypeDescriptor) -> Self {
        self.signatures.push(Signature::Method {
            name: name.to_string(),
            is_static: false,
            params,
            returns,
        });
        self
    }

    /// Add a static method
    pub fn static_method(
        mut self,
        name: &str,
        params: Vec<TypeDescriptor>,
        returns: TypeDescriptor,
    ) -> Self {
        self.signatures.push(Signature::Method {
            name: name.to_string(),
            is_static: true,
            params,
            returns,
        });
        self
    }

    /// Add an instance field
    pub fn field(mut self, name: &str, ty: TypeDescriptor) -> Self {
        self.signatures.push(Signature::Field {
            name: name.to_string(),
            is_static: false,
            ty,
        });
        self
    }

    /// Add a static field
    pub fn static_field(mut self, name: &str, ty: TypeDescriptor) -> Self {
        self.signatures.push(Signature::Field {
            name: name.to_string(),
            is_static: true,
            ty,
        });
        self
    }

    /// Class name advertised to the remote side
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// All member signatures in declaration order
    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Overloads of the method `name`
    pub fn methods<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Signature> + 'a {
        self.signatures
            .iter()
            .filter(move |sig| matches!(sig, Signature::Method { name: n, .. } if n == name))
    }

    /// The field `name`, if declared
    pub fn field_named(&self, name: &str) -> Option<&Signature> {
        self.signatures
            .iter()
            .find(|sig| matches!(sig, Signature::Field { name: n, .. } if n == name))
    }

    /// Encoded signature strings, in declaration order
    pub fn encode(&self) -> Vec<String> {
        self.signatures.iter().map(ToString::to_string).collect()
    }
}
